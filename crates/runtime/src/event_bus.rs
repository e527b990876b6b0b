/// An event stamped with the frame it was produced in.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<E> {
    pub frame_index: u64,
    pub event: E,
}

/// Ordered outbox of produced events, drained by the host after each input.
#[derive(Debug)]
pub struct EventBus<E> {
    events: Vec<Stamped<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, frame_index: u64, event: E) {
        self.events.push(Stamped { frame_index, event });
    }

    pub fn events(&self) -> &[Stamped<E>] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Stamped<E>> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;

    #[test]
    fn records_events_in_emission_order() {
        let mut bus = EventBus::new();
        bus.emit(2, "hover");
        bus.emit(2, "select");
        let got: Vec<_> = bus.events().iter().map(|s| s.event).collect();
        assert_eq!(got, vec!["hover", "select"]);
        assert_eq!(bus.events()[0].frame_index, 2);
    }

    #[test]
    fn drain_clears_events() {
        let mut bus = EventBus::new();
        bus.emit(0, 1u8);
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.is_empty());
    }
}
