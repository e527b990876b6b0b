use foundation::time::Millis;

/// One completed paint cycle reported by the host renderer.
///
/// The swap protocol counts frames rather than milliseconds when it defers a
/// commit, so the frame index is the timebase for "wait N paints".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Host time when the frame was presented.
    pub time: Millis,
}

impl Frame {
    pub fn new(index: u64, time: Millis) -> Self {
        Self { index, time }
    }

    pub fn next(self, time: Millis) -> Self {
        Self::new(self.index + 1, time)
    }
}
