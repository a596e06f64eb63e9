//! Follower-aware notification router.

use std::cell::RefCell;
use std::rc::Rc;

use super::{DeliveryRegistry, FollowerGraph, NotificationHandler, RoutingConfig, Sink};
use crate::notification::{Notification, UserId};
use crate::observer::{BrokerEvent, BrokerObserver};

/// Applies notifications to the follower graph and delivers raw frames
/// to the subscribers they concern.
///
/// Unknown recipients are skipped silently; an offline subscriber is the
/// normal case, not an error.
pub struct Router {
    followers: RefCell<FollowerGraph>,
    subscribers: DeliveryRegistry,
    config: RoutingConfig,
    observer: Rc<dyn BrokerObserver>,
}

impl Router {
    pub fn new(config: RoutingConfig, observer: Rc<dyn BrokerObserver>) -> Self {
        Self {
            followers: RefCell::new(FollowerGraph::new()),
            subscribers: DeliveryRegistry::new(),
            config,
            observer,
        }
    }

    /// Attach `sink` to subscriber `id`, replacing any earlier connection.
    /// The router does not keep `sink` alive.
    pub fn register_subscriber(&self, id: UserId, sink: Rc<dyn Sink>) {
        self.observer.observe(BrokerEvent::RegisteringSubscriber { id });
        if let Some(welcome) = &self.config.welcome_message {
            sink.write(welcome);
        }
        self.subscribers.add(id, &sink);
    }

    pub fn is_subscribed(&self, id: UserId) -> bool {
        self.subscribers.contains(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_follower(&self, follower: UserId, followed: UserId) -> bool {
        self.followers.borrow().is_follower(follower, followed)
    }

    pub fn followers_of(&self, followed: UserId) -> Vec<UserId> {
        self.followers.borrow().followers_of(followed)
    }
}

/// Sender and recipient of a two-party notification. The parser guarantees
/// both are present for follow, unfollow and private message frames.
fn parties(notification: &Notification) -> Option<(UserId, UserId)> {
    Some((notification.sender?, notification.recipient?))
}

impl NotificationHandler for Router {
    fn on_broadcast(&self, notification: &Notification) {
        self.observer
            .observe(BrokerEvent::ForwardingBroadcast { notification });
        self.subscribers.deliver_to_all(&notification.raw);
    }

    fn on_follow(&self, notification: &Notification) {
        let Some((follower, followed)) = parties(notification) else {
            return;
        };
        self.observer
            .observe(BrokerEvent::ForwardingFollow { notification });
        self.followers.borrow_mut().add_follower(follower, followed);
        self.subscribers.deliver_to(followed, &notification.raw);
    }

    fn on_unfollow(&self, notification: &Notification) {
        let Some((follower, followed)) = parties(notification) else {
            return;
        };
        self.followers.borrow_mut().remove_follower(follower, followed);
        if self.config.forward_unfollow {
            self.observer
                .observe(BrokerEvent::ForwardingUnfollow { notification });
            self.subscribers.deliver_to(followed, &notification.raw);
        } else {
            self.observer
                .observe(BrokerEvent::DiscardingUnfollow { notification });
        }
    }

    fn on_status_update(&self, notification: &Notification) {
        let Some(sender) = notification.sender else {
            return;
        };
        self.observer
            .observe(BrokerEvent::ForwardingStatusUpdate { notification });
        let followers = self.followers.borrow().followers_of(sender);
        for follower in followers {
            self.subscribers.deliver_to(follower, &notification.raw);
        }
    }

    fn on_private_message(&self, notification: &Notification) {
        let Some((sender, recipient)) = parties(notification) else {
            return;
        };
        if self.config.private_messages_require_follow && !self.is_follower(sender, recipient) {
            self.observer
                .observe(BrokerEvent::DiscardingPrivateMessage { notification });
            return;
        }
        self.observer
            .observe(BrokerEvent::ForwardingPrivateMessage { notification });
        self.subscribers.deliver_to(recipient, &notification.raw);
    }
}
