//! Delivery registry: subscriber id to sink.
//!
//! Delivering to an id with no registered sink is not an error; the
//! subscriber is simply offline and the message is skipped.
//!
//! The registry does not own its sinks. A subscriber connection is kept
//! alive by its reactor registration, so once the connection closes the
//! entry goes dead and the socket is released.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::notification::UserId;
use crate::transport::FramedStream;

/// A destination that accepts framed writes.
pub trait Sink {
    fn write(&self, message: &str);
}

impl Sink for FramedStream {
    fn write(&self, message: &str) {
        FramedStream::write(self, message);
    }
}

/// Registered subscribers, iterated in ascending id order.
#[derive(Default)]
pub struct DeliveryRegistry {
    subscribers: RefCell<BTreeMap<UserId, Weak<dyn Sink>>>,
}

impl DeliveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` for `id`, replacing any previous sink. Dead entries
    /// are pruned.
    pub fn add(&self, id: UserId, sink: &Rc<dyn Sink>) {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|_, sink| sink.strong_count() > 0);
        subscribers.insert(id, Rc::downgrade(sink));
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.subscribers
            .borrow()
            .get(&id)
            .is_some_and(|sink| sink.strong_count() > 0)
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.subscribers
            .borrow()
            .values()
            .filter(|sink| sink.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `message` to `id`. Returns false if `id` has no live sink.
    pub fn deliver_to(&self, id: UserId, message: &str) -> bool {
        let sink = self.subscribers.borrow().get(&id).and_then(Weak::upgrade);
        match sink {
            Some(sink) => {
                sink.write(message);
                true
            }
            None => false,
        }
    }

    /// Write `message` to every live sink. Returns how many were written.
    pub fn deliver_to_all(&self, message: &str) -> usize {
        let sinks: Vec<Rc<dyn Sink>> = self
            .subscribers
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        for sink in &sinks {
            sink.write(message);
        }
        sinks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingSink;

    fn sink() -> (Rc<RecordingSink>, Rc<dyn Sink>) {
        let recording = Rc::new(RecordingSink::new());
        let sink: Rc<dyn Sink> = recording.clone();
        (recording, sink)
    }

    #[test]
    fn test_deliver_to_registered_subscriber() {
        let registry = DeliveryRegistry::new();
        let (recording, sink) = sink();
        registry.add(456, &sink);

        assert!(registry.deliver_to(456, "1|P|123|456"));
        assert_eq!(recording.messages(), vec!["1|P|123|456".to_string()]);
    }

    #[test]
    fn test_deliver_to_unknown_subscriber_is_skipped() {
        let registry = DeliveryRegistry::new();
        assert!(!registry.deliver_to(999, "1|S|1"));
    }

    #[test]
    fn test_add_overwrites_previous_sink() {
        let registry = DeliveryRegistry::new();
        let (old, old_sink) = sink();
        let (new, new_sink) = sink();
        registry.add(1, &old_sink);
        registry.add(1, &new_sink);

        registry.deliver_to(1, "2|B");

        assert!(old.messages().is_empty());
        assert_eq!(new.messages(), vec!["2|B".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_deliver_to_all() {
        let registry = DeliveryRegistry::new();
        let sinks: Vec<_> = (1..=3).map(|_| sink()).collect();
        for (id, (_, sink)) in sinks.iter().enumerate() {
            registry.add(id as UserId, sink);
        }

        assert_eq!(registry.deliver_to_all("1|B"), 3);
        for (recording, _) in &sinks {
            assert_eq!(recording.messages(), vec!["1|B".to_string()]);
        }
    }

    #[test]
    fn test_deliver_to_all_with_no_subscribers() {
        let registry = DeliveryRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.deliver_to_all("1|B"), 0);
    }

    #[test]
    fn test_dropped_sink_is_not_kept_alive() {
        let registry = DeliveryRegistry::new();
        let (recording, sink) = sink();
        registry.add(7, &sink);
        let weak = Rc::downgrade(&recording);
        drop(recording);
        drop(sink);

        assert!(weak.upgrade().is_none());
        assert!(!registry.contains(7));
        assert!(registry.is_empty());
        assert!(!registry.deliver_to(7, "1|B"));
        assert_eq!(registry.deliver_to_all("2|B"), 0);
    }

    #[test]
    fn test_add_prunes_dead_entries() {
        let registry = DeliveryRegistry::new();
        let (_, gone) = sink();
        registry.add(1, &gone);
        drop(gone);
        let (_live, sink) = sink();
        registry.add(2, &sink);

        assert_eq!(registry.subscribers.borrow().len(), 1);
        assert_eq!(registry.len(), 1);
    }
}
