//! Notification routing.
//!
//! Notifications leave the resequencer in id order and reach the
//! [`TypeDispatcher`], which calls exactly one [`NotificationHandler`]
//! method per notification. The [`Router`] is that handler: it keeps the
//! [`FollowerGraph`] current and writes raw frames to subscriber sinks held
//! in the [`DeliveryRegistry`].

pub mod delivery;
pub mod dispatch;
pub mod followers;
pub mod router;

use serde::Deserialize;

use crate::notification::Notification;

pub use delivery::{DeliveryRegistry, Sink};
pub use dispatch::TypeDispatcher;
pub use followers::FollowerGraph;
pub use router::Router;

// ============================================================================
// Handler Trait
// ============================================================================

/// Per-kind callbacks invoked by the [`TypeDispatcher`].
pub trait NotificationHandler {
    fn on_broadcast(&self, notification: &Notification);
    fn on_follow(&self, notification: &Notification);
    fn on_unfollow(&self, notification: &Notification);
    fn on_status_update(&self, notification: &Notification);
    fn on_private_message(&self, notification: &Notification);
}

// ============================================================================
// Configuration
// ============================================================================

/// Routing behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Deliver unfollow notifications to the formerly followed user.
    /// When false they only update the follower graph.
    pub forward_unfollow: bool,
    /// Only deliver a private message when the sender follows the recipient.
    pub private_messages_require_follow: bool,
    /// Frame written to a subscriber right after it registers.
    pub welcome_message: Option<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            forward_unfollow: true,
            private_messages_require_follow: false,
            welcome_message: None,
        }
    }
}
