//! Connection registry: owns every live WebSocket connection and its
//! binding to an authenticated identity.
//!
//! The registry has exclusive lifecycle authority over connections; the
//! room manager only holds back-references (room name -> connection ids).
//! An identity can have multiple concurrent connections (tabs/devices).

use std::collections::HashSet;

use dashmap::DashMap;

use crate::ws::rooms::RoomManager;
use crate::ws::{user_room, ConnectionId, ConnectionSender};

struct ConnectionEntry {
    /// None until the auth handshake completes.
    identity: Option<String>,
    sender: ConnectionSender,
    /// Names of every room this connection has joined.
    rooms: HashSet<String>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    /// Secondary index: identity -> connection ids.
    by_identity: DashMap<String, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly accepted connection, not yet bound to an identity.
    pub fn attach(&self, conn_id: &str, sender: ConnectionSender) {
        self.connections.insert(
            conn_id.to_string(),
            ConnectionEntry {
                identity: None,
                sender,
                rooms: HashSet::new(),
            },
        );
        tracing::debug!(conn_id = %conn_id, "Connection attached");
    }

    /// Bind a connection to an authenticated identity and auto-join its
    /// `user:<id>` room, so per-user notifications need no extra client
    /// action. Idempotent per connection id. Re-authenticating as a
    /// different identity is a full rebind: every trace of the old
    /// identity (index entry, user room) is removed first, so the old
    /// identity's events stop reaching this socket.
    pub fn register(&self, conn_id: &str, identity: &str, rooms: &RoomManager) {
        let previous = {
            let mut entry = match self.connections.get_mut(conn_id) {
                Some(entry) => entry,
                // Connection raced a disconnect; nothing to bind.
                None => return,
            };
            if entry.identity.as_deref() == Some(identity) {
                return;
            }
            entry.identity.replace(identity.to_string())
        };

        if let Some(old) = previous {
            let mut drop_identity = false;
            if let Some(mut ids) = self.by_identity.get_mut(&old) {
                ids.remove(conn_id);
                drop_identity = ids.is_empty();
            }
            if drop_identity {
                self.by_identity.remove_if(&old, |_, ids| ids.is_empty());
            }
            rooms.leave(self, conn_id, &user_room(&old));
            tracing::debug!(
                conn_id = %conn_id,
                old_identity = %old,
                new_identity = %identity,
                "Connection rebinding to a new identity"
            );
        }

        self.by_identity
            .entry(identity.to_string())
            .or_default()
            .insert(conn_id.to_string());

        rooms.join(self, conn_id, &user_room(identity));

        tracing::debug!(
            conn_id = %conn_id,
            identity = %identity,
            "Connection registered"
        );
    }

    /// Remove a connection and evict it from every room it had joined.
    /// Called on every disconnect path (close, timeout, protocol error)
    /// so no stale room membership leaks.
    pub fn unregister(&self, conn_id: &str, rooms: &RoomManager) {
        let entry = match self.connections.remove(conn_id) {
            Some((_, entry)) => entry,
            None => return,
        };

        if let Some(identity) = &entry.identity {
            let mut drop_identity = false;
            if let Some(mut ids) = self.by_identity.get_mut(identity) {
                ids.remove(conn_id);
                drop_identity = ids.is_empty();
            }
            if drop_identity {
                self.by_identity
                    .remove_if(identity, |_, ids| ids.is_empty());
            }
        }

        rooms.evict(conn_id, entry.rooms);

        tracing::debug!(conn_id = %conn_id, "Connection unregistered");
    }

    /// Identity bound to a connection, if the handshake has completed.
    pub fn identity_of(&self, conn_id: &str) -> Option<String> {
        self.connections
            .get(conn_id)
            .and_then(|entry| entry.identity.clone())
    }

    /// Sender for one connection, if still live.
    pub fn sender_of(&self, conn_id: &str) -> Option<ConnectionSender> {
        self.connections
            .get(conn_id)
            .map(|entry| entry.sender.clone())
    }

    /// Snapshot of live senders for an identity. Empty means the
    /// recipient is reachable via push only.
    pub fn connections_for(&self, identity: &str) -> Vec<ConnectionSender> {
        let ids: Vec<ConnectionId> = match self.by_identity.get(identity) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return Vec::new(),
        };
        ids.iter()
            .filter_map(|id| self.sender_of(id))
            .collect()
    }

    /// Record a room join on the connection's own joined set.
    /// Returns false if the connection no longer exists.
    pub(crate) fn note_join(&self, conn_id: &str, room: &str) -> bool {
        match self.connections.get_mut(conn_id) {
            Some(mut entry) => {
                entry.rooms.insert(room.to_string());
                true
            }
            None => false,
        }
    }

    /// Record a room leave on the connection's own joined set.
    pub(crate) fn note_leave(&self, conn_id: &str, room: &str) {
        if let Some(mut entry) = self.connections.get_mut(conn_id) {
            entry.rooms.remove(room);
        }
    }
}
