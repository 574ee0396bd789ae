use std::sync::Arc;
use std::time::Duration;

use crate::db::DbPool;
use crate::push::transport::PushTransport;
use crate::ws::registry::ConnectionRegistry;
use crate::ws::rooms::RoomManager;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Live WebSocket connections and their identity bindings
    pub connections: Arc<ConnectionRegistry>,
    /// Named fan-out groups over the live connections
    pub rooms: Arc<RoomManager>,
    /// Push transport for browser/OS delivery (trait object so tests can
    /// script outcomes)
    pub push: Arc<dyn PushTransport>,
    /// Whether push fan-out runs at all
    pub push_enabled: bool,
    /// Upper bound on one push send
    pub push_timeout: Duration,
}
