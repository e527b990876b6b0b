/// Monotonic request generation.
///
/// An operation captures the generation current when it starts and compares it
/// against the counter before committing; any later `bump` makes it stale.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

#[derive(Debug, Default)]
pub struct GenerationCounter {
    current: Generation,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation, invalidating every earlier one.
    pub fn bump(&mut self) -> Generation {
        self.current = Generation(self.current.0.wrapping_add(1));
        self.current
    }

    pub fn current(&self) -> Generation {
        self.current
    }

    pub fn is_current(&self, g: Generation) -> bool {
        self.current == g
    }
}
