/// Database row types for all tables.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.
use serde::{Deserialize, Serialize};

/// Alert status: `active` until resolved, then permanently `resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SosStatus {
    Active,
    Resolved,
}

impl SosStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }
}

/// One emergency session, from trigger to resolution.
#[derive(Debug, Clone, Serialize)]
pub struct SosAlert {
    pub id: String,
    pub reporter_id: String,
    pub status: SosStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub position_updated_at: String,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

/// One point in an alert's append-only position history.
#[derive(Debug, Clone, Serialize)]
pub struct SosPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: String,
}

/// Durable notification record. `payload` is the serialized
/// NotificationKind (category tag plus per-category fields).
#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: String,
    pub recipient_id: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub payload: String,
    pub is_read: bool,
    pub archived: bool,
    pub created_at: String,
}

/// A party designated by a user to be notified on SOS trigger.
#[derive(Debug, Clone, Serialize)]
pub struct TrustedContact {
    pub id: String,
    pub owner_id: String,
    pub display_name: String,
    pub phone: String,
    pub linked_user_id: Option<String>,
    pub verified: bool,
    pub created_at: String,
}

/// A registered device endpoint for out-of-band push delivery.
#[derive(Debug, Clone)]
pub struct PushSubscriptionRow {
    pub id: String,
    pub user_id: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: String,
}
