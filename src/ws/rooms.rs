//! Room manager: named fan-out groups over live connections.
//!
//! Rooms are lazily created on first join and dropped on last leave; a
//! room with zero members is logically absent. Join and leave are
//! idempotent since clients may retry.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::ws::protocol::ServerEvent;
use crate::ws::registry::ConnectionRegistry;
use crate::ws::ConnectionId;

#[derive(Default)]
pub struct RoomManager {
    rooms: DashMap<String, HashSet<ConnectionId>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Joining a room the connection is
    /// already in is a no-op.
    pub fn join(&self, registry: &ConnectionRegistry, conn_id: &str, room: &str) {
        // Record on the connection first; a vanished connection must not
        // leave a dangling member behind.
        if !registry.note_join(conn_id, room) {
            return;
        }
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    /// Remove a connection from a room. Leaving a room not joined is a
    /// no-op, never an error.
    pub fn leave(&self, registry: &ConnectionRegistry, conn_id: &str, room: &str) {
        registry.note_leave(conn_id, room);
        self.remove_member(conn_id, room);
    }

    /// Evict a connection from every room it had joined. Called by the
    /// registry on unregister, after the connection entry is gone.
    pub(crate) fn evict(&self, conn_id: &str, joined: HashSet<String>) {
        for room in joined {
            self.remove_member(conn_id, &room);
        }
    }

    /// Deliver an event to every connection currently in the room.
    /// Best-effort and fire-and-forget per connection: a dead member
    /// never blocks delivery to the others.
    pub fn broadcast(&self, registry: &ConnectionRegistry, room: &str, event: &ServerEvent) {
        let msg = match event.to_message() {
            Some(msg) => msg,
            None => return,
        };

        // Snapshot members so no shard lock is held across sends.
        let members: Vec<ConnectionId> = match self.rooms.get(room) {
            Some(members) => members.iter().cloned().collect(),
            None => return,
        };

        for conn_id in members {
            if let Some(sender) = registry.sender_of(&conn_id) {
                // A closed channel means the connection raced a
                // disconnect; treated as offline, not an error.
                let _ = sender.send(msg.clone());
            }
        }
    }

    /// Snapshot of current member connection ids, for diagnostics and tests.
    pub fn members_of(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn remove_member(&self, conn_id: &str, room: &str) {
        let mut empty = false;
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(conn_id);
            empty = members.is_empty();
        }
        if empty {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
    }
}
