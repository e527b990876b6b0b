use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete spatial aggregation resolution, coarsest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoLevel {
    District,
    Tract,
    BlockGroup,
    Parcel,
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 4] = [
        GeoLevel::District,
        GeoLevel::Tract,
        GeoLevel::BlockGroup,
        GeoLevel::Parcel,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            GeoLevel::District => "district",
            GeoLevel::Tract => "tract",
            GeoLevel::BlockGroup => "block_group",
            GeoLevel::Parcel => "parcel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }

    pub const fn is_finest(self) -> bool {
        matches!(self, GeoLevel::Parcel)
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a rendered geographic entity.
///
/// Ids are only unique within one [`GeoLevel`]; use [`FeatureRef`] for identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unit of identity for hover, selection and caching.
///
/// Displays as `"level:featureId"`, which is also the detail cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureRef {
    pub level: GeoLevel,
    pub id: FeatureId,
}

impl FeatureRef {
    pub fn new(level: GeoLevel, id: impl Into<String>) -> Self {
        Self {
            level,
            id: FeatureId::new(id),
        }
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.level, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::{FeatureRef, GeoLevel};

    #[test]
    fn level_names_round_trip() {
        for level in GeoLevel::ALL {
            assert_eq!(GeoLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(GeoLevel::parse("county"), None);
    }

    #[test]
    fn same_id_on_different_levels_is_distinct() {
        let a = FeatureRef::new(GeoLevel::Tract, "42");
        let b = FeatureRef::new(GeoLevel::Parcel, "42");
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "tract:42");
    }
}
