//! Logging collaborator for the broker core.
//!
//! Components never log on their own. At each named event point they hand a
//! [`BrokerEvent`] to the injected [`BrokerObserver`], which decides whether
//! and how the event is recorded. One observer instance is shared by the
//! whole component graph.

use tracing::{debug, info, warn};

use crate::notification::{Notification, UserId};

/// Named event points emitted by the broker.
#[derive(Debug, Clone, Copy)]
pub enum BrokerEvent<'a> {
    /// Broker is wiring up its components.
    StartingBroker,
    /// A listener is bound and registered with the reactor.
    ServerAcceptingConnections { port: u16 },
    /// A listener accepted one connection.
    ConnectionAccepted { port: u16 },
    /// Accepting or preparing a pending connection failed.
    AcceptFailed { port: u16, error: &'a std::io::Error },
    /// A peer closed (or reset) its connection.
    ConnectionClosed,
    /// A complete frame was read from a connection.
    StreamingMessage { frame: &'a str },
    /// An event-source frame had a non-numeric or missing field.
    MalformedMessage { frame: &'a str, reason: &'a str },
    /// An event-source frame carried an unrecognized type tag.
    UnknownNotificationType { frame: &'a str, tag: &'a str },
    /// A subscriber registration frame was not a numeric id.
    MalformedSubscriberId { frame: &'a str },
    /// A subscriber registered (or re-registered) on a connection.
    RegisteringSubscriber { id: UserId },
    /// A notification arrived ahead of its predecessors and was buffered.
    NotificationBuffered { id: u64, pending: usize },
    /// A notification with an already forwarded id was dropped.
    StaleNotificationDropped { id: u64 },
    ForwardingBroadcast { notification: &'a Notification },
    ForwardingFollow { notification: &'a Notification },
    ForwardingUnfollow { notification: &'a Notification },
    DiscardingUnfollow { notification: &'a Notification },
    ForwardingStatusUpdate { notification: &'a Notification },
    ForwardingPrivateMessage { notification: &'a Notification },
    /// A private message was withheld because the sender does not follow the recipient.
    DiscardingPrivateMessage { notification: &'a Notification },
    /// A listener is closing as the reactor stops.
    StoppingServer { port: u16 },
    /// The reactor loop is terminating.
    StoppingReactor,
}

impl BrokerEvent<'_> {
    /// Stable name of the event point.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartingBroker => "starting_broker",
            Self::ServerAcceptingConnections { .. } => "server_accepting_connections",
            Self::ConnectionAccepted { .. } => "connection_accepted",
            Self::AcceptFailed { .. } => "accept_failed",
            Self::ConnectionClosed => "connection_closed",
            Self::StreamingMessage { .. } => "streaming_message",
            Self::MalformedMessage { .. } => "malformed_message",
            Self::UnknownNotificationType { .. } => "unknown_notification_type",
            Self::MalformedSubscriberId { .. } => "malformed_subscriber_id",
            Self::RegisteringSubscriber { .. } => "registering_subscriber",
            Self::NotificationBuffered { .. } => "notification_buffered",
            Self::StaleNotificationDropped { .. } => "stale_notification_dropped",
            Self::ForwardingBroadcast { .. } => "forwarding_broadcast",
            Self::ForwardingFollow { .. } => "forwarding_follow",
            Self::ForwardingUnfollow { .. } => "forwarding_unfollow",
            Self::DiscardingUnfollow { .. } => "discarding_unfollow",
            Self::ForwardingStatusUpdate { .. } => "forwarding_status_update",
            Self::ForwardingPrivateMessage { .. } => "forwarding_private_message",
            Self::DiscardingPrivateMessage { .. } => "discarding_private_message",
            Self::StoppingServer { .. } => "stopping_server",
            Self::StoppingReactor => "stopping_reactor",
        }
    }
}

/// Receives broker events at every named event point.
pub trait BrokerObserver {
    fn observe(&self, event: BrokerEvent<'_>);
}

/// Observer that forwards events to `tracing`.
///
/// Lifecycle events are logged at info, per-message flow at debug and
/// dropped frames at warn.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BrokerObserver for TracingObserver {
    fn observe(&self, event: BrokerEvent<'_>) {
        match event {
            BrokerEvent::StartingBroker => info!("Starting activity broker"),
            BrokerEvent::ServerAcceptingConnections { port } => {
                info!(port, "TCP server accepting connections")
            }
            BrokerEvent::ConnectionAccepted { port } => debug!(port, "Connection accepted"),
            BrokerEvent::AcceptFailed { port, error } => {
                warn!(port, error = %error, "Failed to accept connection")
            }
            BrokerEvent::ConnectionClosed => debug!("Connection closed by peer"),
            BrokerEvent::StreamingMessage { frame } => debug!(frame, "Streaming message"),
            BrokerEvent::MalformedMessage { frame, reason } => {
                warn!(frame, reason, "Dropping malformed message")
            }
            BrokerEvent::UnknownNotificationType { frame, tag } => {
                warn!(frame, tag, "Dropping message with unknown notification type")
            }
            BrokerEvent::MalformedSubscriberId { frame } => {
                warn!(frame, "Ignoring malformed subscriber id")
            }
            BrokerEvent::RegisteringSubscriber { id } => debug!(subscriber = id, "Registering subscriber"),
            BrokerEvent::NotificationBuffered { id, pending } => {
                debug!(id, pending, "Buffering out-of-order notification")
            }
            BrokerEvent::StaleNotificationDropped { id } => {
                warn!(id, "Dropping notification with already forwarded id")
            }
            BrokerEvent::ForwardingBroadcast { notification } => {
                debug!(message = %notification.raw, "Forwarding broadcast event")
            }
            BrokerEvent::ForwardingFollow { notification } => {
                debug!(message = %notification.raw, "Forwarding follow event")
            }
            BrokerEvent::ForwardingUnfollow { notification } => {
                debug!(message = %notification.raw, "Forwarding unfollow event")
            }
            BrokerEvent::DiscardingUnfollow { notification } => {
                debug!(message = %notification.raw, "Discarding unfollow event")
            }
            BrokerEvent::ForwardingStatusUpdate { notification } => {
                debug!(message = %notification.raw, "Forwarding status update")
            }
            BrokerEvent::ForwardingPrivateMessage { notification } => {
                debug!(message = %notification.raw, "Forwarding private message")
            }
            BrokerEvent::DiscardingPrivateMessage { notification } => {
                debug!(message = %notification.raw, "Discarding private message from non-follower")
            }
            BrokerEvent::StoppingServer { port } => debug!(port, "Stopping server"),
            BrokerEvent::StoppingReactor => info!("Stopping activity broker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_snake_case() {
        assert_eq!(BrokerEvent::StartingBroker.name(), "starting_broker");
        assert_eq!(
            BrokerEvent::MalformedMessage {
                frame: "x|B",
                reason: "bad id"
            }
            .name(),
            "malformed_message"
        );
        assert_eq!(BrokerEvent::StoppingServer { port: 1 }.name(), "stopping_server");
    }

    #[test]
    fn test_tracing_observer_accepts_every_event() {
        let observer = TracingObserver;
        let notification = Notification::broadcast(1, "1|B");
        observer.observe(BrokerEvent::StartingBroker);
        observer.observe(BrokerEvent::ForwardingBroadcast {
            notification: &notification,
        });
        observer.observe(BrokerEvent::StoppingReactor);
    }
}
