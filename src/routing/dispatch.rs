//! Kind-based dispatch from the ordered stream to a [`NotificationHandler`].

use std::rc::Rc;

use super::NotificationHandler;
use crate::notification::{Notification, NotificationKind, NotificationListener};

/// Stateless translator from [`NotificationListener::process`] to the
/// handler method matching the notification kind.
pub struct TypeDispatcher {
    handler: Rc<dyn NotificationHandler>,
}

impl TypeDispatcher {
    pub fn new(handler: Rc<dyn NotificationHandler>) -> Self {
        Self { handler }
    }
}

impl NotificationListener for TypeDispatcher {
    fn process(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Broadcast => self.handler.on_broadcast(&notification),
            NotificationKind::Follow => self.handler.on_follow(&notification),
            NotificationKind::Unfollow => self.handler.on_unfollow(&notification),
            NotificationKind::StatusUpdate => self.handler.on_status_update(&notification),
            NotificationKind::PrivateMessage => self.handler.on_private_message(&notification),
        }
    }
}
