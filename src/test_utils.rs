//! Test utilities and recording implementations of the core traits.
//!
//! Each double records what it was handed so tests can assert on it
//! without sockets or a running reactor.

use std::cell::RefCell;

use crate::notification::{Notification, NotificationListener};
use crate::observer::{BrokerEvent, BrokerObserver};
use crate::routing::{NotificationHandler, Sink};

/// Observer that records the name and debug rendering of every event.
#[derive(Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<(&'static str, String)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event with this name was observed.
    pub fn saw(&self, name: &str) -> bool {
        self.count(name) > 0
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|(event, _)| *event == name)
            .count()
    }

    /// Event names in observation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(|(name, _)| *name).collect()
    }

    /// Debug renderings in observation order.
    pub fn events(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .map(|(_, detail)| detail.clone())
            .collect()
    }
}

impl BrokerObserver for RecordingObserver {
    fn observe(&self, event: BrokerEvent<'_>) {
        self.events
            .borrow_mut()
            .push((event.name(), format!("{:?}", event)));
    }
}

/// Sink that keeps every written message.
#[derive(Default)]
pub struct RecordingSink {
    messages: RefCell<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl Sink for RecordingSink {
    fn write(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

/// Handler that records which method was called for which notification id.
#[derive(Default)]
pub struct RecordingHandler {
    calls: RefCell<Vec<(&'static str, u64)>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(&'static str, u64)> {
        self.calls.borrow().clone()
    }

    fn record(&self, method: &'static str, notification: &Notification) {
        self.calls.borrow_mut().push((method, notification.id));
    }
}

impl NotificationHandler for RecordingHandler {
    fn on_broadcast(&self, notification: &Notification) {
        self.record("on_broadcast", notification);
    }

    fn on_follow(&self, notification: &Notification) {
        self.record("on_follow", notification);
    }

    fn on_unfollow(&self, notification: &Notification) {
        self.record("on_unfollow", notification);
    }

    fn on_status_update(&self, notification: &Notification) {
        self.record("on_status_update", notification);
    }

    fn on_private_message(&self, notification: &Notification) {
        self.record("on_private_message", notification);
    }
}

/// Listener that keeps every processed notification.
#[derive(Default)]
pub struct RecordingListener {
    received: RefCell<Vec<Notification>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received.borrow().clone()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.received.borrow().iter().map(|n| n.id).collect()
    }
}

impl NotificationListener for RecordingListener {
    fn process(&self, notification: Notification) {
        self.received.borrow_mut().push(notification);
    }
}
