//! Subscriber connection handshake.
//!
//! A subscriber identifies itself with a single frame holding its numeric
//! id. The connection is then registered with the [`Router`] as that
//! subscriber's sink.

use std::rc::Rc;

use crate::notification::parser::parse_id;
use crate::observer::{BrokerEvent, BrokerObserver};
use crate::routing::Router;
use crate::transport::{FramedStream, MessageListener};

pub struct SubscriptionHandshake {
    router: Rc<Router>,
    observer: Rc<dyn BrokerObserver>,
}

impl SubscriptionHandshake {
    pub fn new(router: Rc<Router>, observer: Rc<dyn BrokerObserver>) -> Self {
        Self { router, observer }
    }
}

impl MessageListener for SubscriptionHandshake {
    fn on_message(&self, frame: &str, stream: &Rc<FramedStream>) {
        match parse_id(frame) {
            Some(id) => self.router.register_subscriber(id, stream.clone()),
            None => self
                .observer
                .observe(BrokerEvent::MalformedSubscriberId { frame }),
        }
    }
}
