use foundation::ids::FeatureRef;

/// Ordered multi-feature selection.
///
/// Ordering contract:
/// - Iteration yields members in insertion order.
/// - The first member is the primary, used as the comparison baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    members: Vec<FeatureRef>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, feature: &FeatureRef) -> bool {
        self.members.iter().any(|m| m == feature)
    }

    pub fn primary(&self) -> Option<&FeatureRef> {
        self.members.first()
    }

    /// Returns `true` if the selection changed.
    pub fn insert(&mut self, feature: FeatureRef) -> bool {
        if self.contains(&feature) {
            return false;
        }
        self.members.push(feature);
        true
    }

    /// Returns `true` if the selection changed.
    pub fn remove(&mut self, feature: &FeatureRef) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != feature);
        self.members.len() != before
    }

    /// Makes `feature` the only member.
    pub fn replace_with(&mut self, feature: FeatureRef) {
        self.members.clear();
        self.members.push(feature);
    }

    pub fn is_only(&self, feature: &FeatureRef) -> bool {
        self.members.len() == 1 && self.members[0] == *feature
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureRef> + '_ {
        self.members.iter()
    }

    pub fn as_slice(&self) -> &[FeatureRef] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::Selection;
    use foundation::ids::{FeatureRef, GeoLevel};

    fn f(id: &str) -> FeatureRef {
        FeatureRef::new(GeoLevel::Tract, id)
    }

    #[test]
    fn insert_remove_contains_and_len() {
        let mut s = Selection::new();
        assert!(s.is_empty());
        assert!(s.insert(f("a")));
        assert!(!s.insert(f("a")));
        assert_eq!(s.len(), 1);
        assert!(s.is_only(&f("a")));
        assert!(s.remove(&f("a")));
        assert!(!s.remove(&f("a")));
        assert!(s.is_empty());
    }

    #[test]
    fn primary_is_first_inserted() {
        let mut s = Selection::new();
        s.insert(f("b"));
        s.insert(f("a"));
        s.insert(f("c"));
        assert_eq!(s.primary(), Some(&f("b")));
        s.remove(&f("b"));
        assert_eq!(s.primary(), Some(&f("a")));
        let ids: Vec<&str> = s.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
