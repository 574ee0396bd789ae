//! JSON wire protocol for the live channel.
//!
//! Each frame is a JSON object with an `event` name and a `data` payload.
//! Client-to-server events: `authenticate`, `watch_sos`, `unwatch_sos`.
//! Server-to-client events: `authenticated`, `sos_location_changed`,
//! `sos_resolved`, `notification`, `error`.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::auth::jwt;
use crate::notify::category::NotificationRecord;
use crate::state::AppState;
use crate::ws::sos_room;

/// Events a client may send on the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Auth handshake for connections that upgraded without a token.
    Authenticate { token: String },
    /// Subscribe to live position updates for one alert.
    WatchSos { alert_id: String },
    /// Unsubscribe from one alert's updates.
    UnwatchSos { alert_id: String },
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Authenticated { identity: String },
    SosLocationChanged { latitude: f64, longitude: f64 },
    SosResolved { alert_id: String },
    Notification(NotificationRecord),
    Error { message: String },
}

impl ServerEvent {
    /// Serialize into a WebSocket text frame.
    pub fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self)
            .ok()
            .map(|text| Message::Text(text.into()))
    }
}

/// Handle one incoming text frame: decode, dispatch, reply.
/// A malformed or unauthorized frame produces an `error` event and
/// terminates only this operation, never the connection.
pub fn handle_text_message(
    text: &str,
    conn_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(
                conn_id = %conn_id,
                error = %e,
                "Malformed client event"
            );
            send_error(tx, "malformed event");
            return;
        }
    };

    match event {
        ClientEvent::Authenticate { token } => {
            handle_authenticate(&token, conn_id, tx, state);
        }
        ClientEvent::WatchSos { alert_id } => {
            // Requires a completed handshake; pre-auth sockets may not
            // subscribe to anything.
            if state.connections.identity_of(conn_id).is_none() {
                send_error(tx, "not authenticated");
                return;
            }
            // Unknown or resolved alert ids are accepted silently: the
            // room simply never produces another event.
            state
                .rooms
                .join(&state.connections, conn_id, &sos_room(&alert_id));
        }
        ClientEvent::UnwatchSos { alert_id } => {
            if state.connections.identity_of(conn_id).is_none() {
                send_error(tx, "not authenticated");
                return;
            }
            state
                .rooms
                .leave(&state.connections, conn_id, &sos_room(&alert_id));
        }
    }
}

fn handle_authenticate(
    token: &str,
    conn_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
) {
    match jwt::validate_access_token(&state.jwt_secret, token) {
        Ok(claims) => {
            state
                .connections
                .register(conn_id, &claims.sub, &state.rooms);
            send_event(
                tx,
                &ServerEvent::Authenticated {
                    identity: claims.sub,
                },
            );
        }
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "WS authenticate failed");
            send_error(tx, "invalid token");
        }
    }
}

/// Push a server event to one connection, fire-and-forget.
pub fn send_event(tx: &mpsc::UnboundedSender<Message>, event: &ServerEvent) {
    if let Some(msg) = event.to_message() {
        let _ = tx.send(msg);
    }
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    send_event(
        tx,
        &ServerEvent::Error {
            message: message.to_string(),
        },
    );
}
