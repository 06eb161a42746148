/// Lifecycle transitions reported by an audio sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Opened,
    Started,
    Stopped,
    Closed,
}

pub type SinkListener = Box<dyn Fn(SinkEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Observer list for sink lifecycle events.
///
/// Listeners only see events raised after they are registered, so they must
/// be attached before the sink is opened to observe `Opened`.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(ListenerId, SinkListener)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: SinkListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Empties the registry, handing the listeners over in registration order.
    pub fn take_all(&mut self) -> Vec<SinkListener> {
        std::mem::take(&mut self.listeners)
            .into_iter()
            .map(|(_, listener)| listener)
            .collect()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn notify(&self, event: SinkEvent) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<SinkEvent>>>, SinkListener) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        (seen, Box::new(move |event| sink_seen.lock().unwrap().push(event)))
    }

    #[test]
    fn notifies_every_listener_in_order() {
        let mut registry = ListenerRegistry::new();
        let (a, listener_a) = recorder();
        let (b, listener_b) = recorder();
        registry.register(listener_a);
        registry.register(listener_b);

        registry.notify(SinkEvent::Opened);
        registry.notify(SinkEvent::Started);

        assert_eq!(*a.lock().unwrap(), vec![SinkEvent::Opened, SinkEvent::Started]);
        assert_eq!(*b.lock().unwrap(), vec![SinkEvent::Opened, SinkEvent::Started]);
    }

    #[test]
    fn late_listener_misses_earlier_events() {
        let mut registry = ListenerRegistry::new();
        registry.notify(SinkEvent::Opened);
        let (seen, listener) = recorder();
        registry.register(listener);
        registry.notify(SinkEvent::Started);
        assert_eq!(*seen.lock().unwrap(), vec![SinkEvent::Started]);
    }

    #[test]
    fn removed_and_cleared_listeners_stay_quiet() {
        let mut registry = ListenerRegistry::new();
        let (a, listener_a) = recorder();
        let (b, listener_b) = recorder();
        let id_a = registry.register(listener_a);
        registry.register(listener_b);

        assert!(registry.remove(id_a));
        assert!(!registry.remove(id_a));
        registry.notify(SinkEvent::Stopped);
        registry.clear();
        registry.notify(SinkEvent::Closed);

        assert!(a.lock().unwrap().is_empty());
        assert_eq!(*b.lock().unwrap(), vec![SinkEvent::Stopped]);
        assert!(registry.is_empty());
    }
}
