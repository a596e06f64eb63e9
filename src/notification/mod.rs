//! Notifications parsed from the event-source stream.
//!
//! A [`Notification`] is created once per event-source frame by the
//! [`parser`], is never mutated, and is consumed by exactly one
//! [`NotificationListener`] at each stage of the pipeline.

pub mod parser;

pub use parser::{parse, ParseError};

/// Identifier shared by the event source and the subscriber channel.
pub type UserId = u64;

/// Event type carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Broadcast,
    Follow,
    Unfollow,
    StatusUpdate,
    PrivateMessage,
}

impl NotificationKind {
    /// Map a wire type tag to a kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "B" => Some(Self::Broadcast),
            "F" => Some(Self::Follow),
            "U" => Some(Self::Unfollow),
            "S" => Some(Self::StatusUpdate),
            "P" => Some(Self::PrivateMessage),
            _ => None,
        }
    }

    /// Wire type tag for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Broadcast => "B",
            Self::Follow => "F",
            Self::Unfollow => "U",
            Self::StatusUpdate => "S",
            Self::PrivateMessage => "P",
        }
    }

    /// Whether frames of this kind carry a sender field.
    pub fn has_sender(&self) -> bool {
        !matches!(self, Self::Broadcast)
    }

    /// Whether frames of this kind carry a recipient field.
    pub fn has_recipient(&self) -> bool {
        matches!(self, Self::Follow | Self::Unfollow | Self::PrivateMessage)
    }
}

/// One activity event from the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Sequence number assigned by the event source, starting at 1.
    pub id: u64,
    pub kind: NotificationKind,
    pub sender: Option<UserId>,
    pub recipient: Option<UserId>,
    /// The frame exactly as received, without its boundary.
    pub raw: String,
}

impl Notification {
    pub fn broadcast(id: u64, raw: impl Into<String>) -> Self {
        Self {
            id,
            kind: NotificationKind::Broadcast,
            sender: None,
            recipient: None,
            raw: raw.into(),
        }
    }

    pub fn follow(id: u64, follower: UserId, followed: UserId) -> Self {
        Self::between(id, NotificationKind::Follow, follower, followed)
    }

    pub fn unfollow(id: u64, follower: UserId, followed: UserId) -> Self {
        Self::between(id, NotificationKind::Unfollow, follower, followed)
    }

    pub fn status_update(id: u64, sender: UserId) -> Self {
        Self {
            id,
            kind: NotificationKind::StatusUpdate,
            sender: Some(sender),
            recipient: None,
            raw: format!("{}|S|{}", id, sender),
        }
    }

    pub fn private_message(id: u64, sender: UserId, recipient: UserId) -> Self {
        Self::between(id, NotificationKind::PrivateMessage, sender, recipient)
    }

    fn between(id: u64, kind: NotificationKind, sender: UserId, recipient: UserId) -> Self {
        Self {
            id,
            kind,
            sender: Some(sender),
            recipient: Some(recipient),
            raw: format!("{}|{}|{}|{}", id, kind.tag(), sender, recipient),
        }
    }
}

/// Consumer of notifications, one pipeline stage at a time.
pub trait NotificationListener {
    fn process(&self, notification: Notification);
}
