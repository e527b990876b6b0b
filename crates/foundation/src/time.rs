use std::time::Duration;

/// Monotonic engine timestamp in milliseconds.
///
/// The engine never reads a wall clock itself; hosts pass `Millis` in so
/// debounce and timeout behaviour is replayable in tests.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    pub fn after(self, d: Duration) -> Self {
        Millis(self.0.saturating_add(d.as_millis() as u64))
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn since(self, earlier: Millis) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

#[cfg(test)]
mod tests {
    use super::Millis;
    use std::time::Duration;

    #[test]
    fn since_saturates() {
        assert_eq!(Millis(100).since(Millis(40)), Duration::from_millis(60));
        assert_eq!(Millis(40).since(Millis(100)), Duration::ZERO);
        assert_eq!(Millis(5).after(Duration::from_millis(500)), Millis(505));
    }
}
