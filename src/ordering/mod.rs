//! Restores event-source order before notifications are routed.
//!
//! The event source numbers notifications from 1 but may deliver them in
//! any order. [`Resequencer`] forwards them downstream strictly in id order,
//! holding early arrivals until the gap before them closes. An id that
//! never arrives stalls everything after it; pending notifications are kept
//! without bound.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::notification::{Notification, NotificationListener};
use crate::observer::{BrokerEvent, BrokerObserver};

#[derive(Default)]
struct OrderingState {
    last_forwarded: Option<u64>,
    pending: HashMap<u64, Notification>,
}

impl OrderingState {
    fn next_id(&self) -> u64 {
        self.last_forwarded.map_or(1, |last| last + 1)
    }

    /// Ids that can never be forwarded: already forwarded, or 0.
    fn is_stale(&self, id: u64) -> bool {
        id < self.next_id()
    }

    /// Take `first` plus every buffered successor with no gap in between.
    fn take_ready_run(&mut self, first: Notification) -> Vec<Notification> {
        self.last_forwarded = Some(first.id);
        let mut run = vec![first];
        while let Some(next) = self.pending.remove(&self.next_id()) {
            self.last_forwarded = Some(next.id);
            run.push(next);
        }
        run
    }
}

/// Gap-filling reorder buffer in front of a downstream listener.
pub struct Resequencer {
    downstream: Rc<dyn NotificationListener>,
    state: RefCell<OrderingState>,
    observer: Rc<dyn BrokerObserver>,
}

impl Resequencer {
    pub fn new(downstream: Rc<dyn NotificationListener>, observer: Rc<dyn BrokerObserver>) -> Self {
        Self {
            downstream,
            state: RefCell::new(OrderingState::default()),
            observer,
        }
    }

    /// Id of the most recently forwarded notification.
    pub fn last_forwarded(&self) -> Option<u64> {
        self.state.borrow().last_forwarded
    }

    /// Number of notifications waiting for a gap to close.
    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }
}

impl NotificationListener for Resequencer {
    fn process(&self, notification: Notification) {
        let ready = {
            let mut state = self.state.borrow_mut();
            let id = notification.id;
            if state.is_stale(id) {
                drop(state);
                self.observer
                    .observe(BrokerEvent::StaleNotificationDropped { id });
                return;
            }
            if id != state.next_id() {
                state.pending.insert(id, notification);
                let pending = state.pending.len();
                drop(state);
                self.observer
                    .observe(BrokerEvent::NotificationBuffered { id, pending });
                return;
            }
            state.take_ready_run(notification)
        };

        for notification in ready {
            self.downstream.process(notification);
        }
    }
}
