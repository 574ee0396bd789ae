//! Closed set of notification categories.
//!
//! Every notification carries exactly one of these variants; the payload
//! shape is fixed per category, so dispatch sites and the link resolver
//! are checked for exhaustiveness at compile time instead of switching on
//! a free-form type string at runtime.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "payload", rename_all = "snake_case")]
pub enum NotificationKind {
    /// A chat message arrived while the recipient was away from the thread.
    Message {
        conversation_id: String,
        sender_id: String,
    },
    /// A booking changed state (confirmed, cancelled, completed, ...).
    Booking {
        booking_id: String,
        status: String,
    },
    /// An identity-verification review finished.
    Verification { approved: bool },
    /// A trusted contact triggered an SOS alert.
    Sos {
        alert_id: String,
        reporter_id: String,
    },
}

impl NotificationKind {
    /// Category tag as stored in the notifications table.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Booking { .. } => "booking",
            Self::Verification { .. } => "verification",
            Self::Sos { .. } => "sos",
        }
    }

    /// Client navigation target for this notification. Total over the
    /// variant set: every category resolves to a link.
    pub fn link(&self) -> String {
        match self {
            Self::Message {
                conversation_id, ..
            } => format!("/messages/{}", conversation_id),
            Self::Booking { booking_id, .. } => format!("/bookings/{}", booking_id),
            Self::Verification { .. } => "/profile/verification".to_string(),
            Self::Sos { alert_id, .. } => format!("/sos/{}", alert_id),
        }
    }
}

/// Full durable notification record as exposed over the wire and REST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub recipient_id: String,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: String,
    pub is_read: bool,
    pub archived: bool,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_resolves_to_a_link() {
        let kinds = [
            NotificationKind::Message {
                conversation_id: "c1".into(),
                sender_id: "u2".into(),
            },
            NotificationKind::Booking {
                booking_id: "b1".into(),
                status: "confirmed".into(),
            },
            NotificationKind::Verification { approved: true },
            NotificationKind::Sos {
                alert_id: "a1".into(),
                reporter_id: "u1".into(),
            },
        ];
        for kind in kinds {
            assert!(kind.link().starts_with('/'));
        }
    }

    #[test]
    fn kind_serializes_with_category_tag() {
        let kind = NotificationKind::Sos {
            alert_id: "a1".into(),
            reporter_id: "u1".into(),
        };
        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value["category"], "sos");
        assert_eq!(value["payload"]["alert_id"], "a1");

        let back: NotificationKind = serde_json::from_value(value).unwrap();
        assert_eq!(back, kind);
    }
}
