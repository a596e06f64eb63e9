//! Event-source frame parser.
//!
//! Frames look like `<id>|<tag>[|<sender>[|<recipient>]]`. Which trailing
//! fields are required depends on the tag:
//!
//! | tag | meaning         | fields                     |
//! |-----|-----------------|----------------------------|
//! | `B` | broadcast       | id                         |
//! | `F` | follow          | id, sender, recipient      |
//! | `U` | unfollow        | id, sender, recipient      |
//! | `S` | status update   | id, sender                 |
//! | `P` | private message | id, sender, recipient      |

use super::{Notification, NotificationKind, UserId};

/// Field separator within a frame.
pub const FIELD_SEPARATOR: char = '|';

/// Reasons a frame cannot become a notification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed message '{frame}': {reason}")]
    Malformed { frame: String, reason: String },

    #[error("Unknown notification type '{tag}' in '{frame}'")]
    UnknownType { frame: String, tag: String },
}

/// Parse one event-source frame into a notification.
pub fn parse(frame: &str) -> Result<Notification, ParseError> {
    let mut fields = frame.splitn(4, FIELD_SEPARATOR);

    let id = numeric_field(frame, "id", fields.next())?;

    let tag = fields
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| c.is_ascii_whitespace());
    let kind = NotificationKind::from_tag(tag).ok_or_else(|| ParseError::UnknownType {
        frame: frame.to_string(),
        tag: tag.to_string(),
    })?;

    let sender = if kind.has_sender() {
        Some(numeric_field(frame, "sender", fields.next())?)
    } else {
        None
    };

    let recipient = if kind.has_recipient() {
        Some(numeric_field(frame, "recipient", fields.next())?)
    } else {
        None
    };

    Ok(Notification {
        id,
        kind,
        sender,
        recipient,
        raw: frame.to_string(),
    })
}

fn numeric_field(frame: &str, name: &str, value: Option<&str>) -> Result<UserId, ParseError> {
    let malformed = |reason: String| ParseError::Malformed {
        frame: frame.to_string(),
        reason,
    };

    let value = value.ok_or_else(|| malformed(format!("missing {} field", name)))?;
    parse_id(value).ok_or_else(|| malformed(format!("{} '{}' is not a number", name, value)))
}

/// Parse a decimal identifier, tolerating surrounding ASCII whitespace.
pub fn parse_id(value: &str) -> Option<UserId> {
    let value = value.trim_matches(|c: char| c.is_ascii_whitespace());
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broadcast() {
        let n = parse("1|B").unwrap();
        assert_eq!(n.id, 1);
        assert_eq!(n.kind, NotificationKind::Broadcast);
        assert_eq!(n.sender, None);
        assert_eq!(n.recipient, None);
        assert_eq!(n.raw, "1|B");
    }

    #[test]
    fn test_parse_follow() {
        let n = parse("1|F|123|456").unwrap();
        assert_eq!(n.kind, NotificationKind::Follow);
        assert_eq!(n.sender, Some(123));
        assert_eq!(n.recipient, Some(456));
    }

    #[test]
    fn test_parse_status_update_has_no_recipient() {
        let n = parse("2|S|456").unwrap();
        assert_eq!(n.kind, NotificationKind::StatusUpdate);
        assert_eq!(n.sender, Some(456));
        assert_eq!(n.recipient, None);
    }

    #[test]
    fn test_parse_unfollow_and_private_message() {
        assert_eq!(parse("3|U|1|2").unwrap().kind, NotificationKind::Unfollow);
        let pm = parse("4|P|7|8").unwrap();
        assert_eq!(pm.kind, NotificationKind::PrivateMessage);
        assert_eq!((pm.sender, pm.recipient), (Some(7), Some(8)));
    }

    #[test]
    fn test_parse_large_id() {
        let n = parse("4327421|F|118|974").unwrap();
        assert_eq!(n.id, 4327421);
    }

    #[test]
    fn test_parse_tolerates_carriage_return() {
        let n = parse("5|S|42\r").unwrap();
        assert_eq!(n.sender, Some(42));
        assert_eq!(n.raw, "5|S|42\r");
    }

    #[test]
    fn test_parse_broadcast_with_carriage_return() {
        let n = parse("1|B\r").unwrap();
        assert_eq!(n.kind, NotificationKind::Broadcast);
        assert_eq!(n.raw, "1|B\r");
    }

    #[test]
    fn test_parse_non_numeric_id_is_malformed() {
        let err = parse("abc|B").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { ref frame, .. } if frame == "abc|B"));
    }

    #[test]
    fn test_parse_non_numeric_sender_is_malformed() {
        assert!(matches!(parse("1|F|x|2"), Err(ParseError::Malformed { .. })));
        assert!(matches!(parse("1|P|1|-2"), Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_parse_missing_recipient_is_malformed() {
        let err = parse("1|F|123").unwrap_err();
        match err {
            ParseError::Malformed { reason, .. } => assert!(reason.contains("recipient")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = parse("1|X|2|3").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownType {
                frame: "1|X|2|3".to_string(),
                tag: "X".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_missing_type_is_unknown() {
        assert!(matches!(parse("1"), Err(ParseError::UnknownType { .. })));
    }

    #[test]
    fn test_parse_empty_frame_is_malformed() {
        assert!(matches!(parse(""), Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_parse_id_rejects_signs_and_blanks() {
        assert_eq!(parse_id(" 42 "), Some(42));
        assert_eq!(parse_id("+42"), None);
        assert_eq!(parse_id(""), None);
        assert_eq!(parse_id("4 2"), None);
    }
}
