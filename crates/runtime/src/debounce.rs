use std::time::Duration;

use foundation::time::Millis;

#[derive(Debug, Clone, PartialEq)]
struct Pending<T> {
    due: Millis,
    payload: T,
}

/// Single-slot debouncer.
///
/// Scheduling replaces whatever was pending, so at most one payload fires per
/// quiet period. Time only moves when the host calls [`Debouncer::poll`].
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Arms the debouncer; returns the payload it superseded, if any.
    pub fn schedule(&mut self, now: Millis, payload: T) -> Option<T> {
        let prev = self.pending.take().map(|p| p.payload);
        self.pending = Some(Pending {
            due: now.after(self.delay),
            payload,
        });
        prev
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.payload)
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|p| &p.payload)
    }

    /// Releases the pending payload once its quiet period has elapsed.
    pub fn poll(&mut self, now: Millis) -> Option<T> {
        match &self.pending {
            Some(p) if now >= p.due => self.pending.take().map(|p| p.payload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Debouncer;
    use foundation::time::Millis;
    use std::time::Duration;

    #[test]
    fn fires_only_after_quiet_period() {
        let mut d = Debouncer::new(Duration::from_millis(500));
        d.schedule(Millis(0), "a");
        assert_eq!(d.poll(Millis(499)), None);
        assert_eq!(d.poll(Millis(500)), Some("a"));
        assert_eq!(d.poll(Millis(900)), None);
    }

    #[test]
    fn reschedule_supersedes_and_restarts_timer() {
        let mut d = Debouncer::new(Duration::from_millis(500));
        d.schedule(Millis(0), "a");
        assert_eq!(d.schedule(Millis(300), "b"), Some("a"));
        assert_eq!(d.poll(Millis(600)), None);
        assert_eq!(d.poll(Millis(800)), Some("b"));
    }

    #[test]
    fn cancel_drops_pending() {
        let mut d = Debouncer::new(Duration::from_millis(10));
        d.schedule(Millis(0), 1);
        assert_eq!(d.cancel(), Some(1));
        assert_eq!(d.pending(), None);
        assert_eq!(d.poll(Millis(100)), None);
    }
}
