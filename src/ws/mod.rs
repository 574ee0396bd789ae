pub mod actor;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod rooms;

use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Unique id of one live connection (UUIDv7 string).
pub type ConnectionId = String;

/// Per-identity room, auto-joined when the connection authenticates.
pub fn user_room(identity: &str) -> String {
    format!("user:{}", identity)
}

/// Per-alert room, joined on watch_sos and left on unwatch_sos or disconnect.
pub fn sos_room(alert_id: &str) -> String {
    format!("sos:{}", alert_id)
}
