//! Room event publishing
//!
//! The engine emits [`RoomEvent`]s through the narrow [`EventPublisher`]
//! seam. Delivery is at-most-once and best-effort: a publish with no
//! listening room is dropped, and a lagging subscriber loses the oldest
//! events rather than stalling the engine.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use mentora_types::{RoomEvent, SessionId};

/// Default per-room buffer for slow subscribers
const DEFAULT_ROOM_CAPACITY: usize = 32;

/// Outbound event seam between the engine and the gateway transport
pub trait EventPublisher: Send + Sync {
    /// Publish an event to its session's room
    fn publish(&self, event: RoomEvent);

    /// Tear down a session's room once the session is gone
    fn close_room(&self, _session_id: &SessionId) {}
}

/// Broadcast-backed publisher with one channel per session room
pub struct RoomHub {
    capacity: usize,
    rooms: RwLock<HashMap<SessionId, broadcast::Sender<RoomEvent>>>,
}

impl RoomHub {
    /// Create a hub with the default per-room capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ROOM_CAPACITY)
    }

    /// Create a hub with a custom per-room capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Join a session's room, creating it on first join
    pub fn subscribe(&self, session_id: &SessionId) -> broadcast::Receiver<RoomEvent> {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        rooms
            .entry(session_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of rooms currently open
    pub fn room_count(&self) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for RoomHub {
    fn publish(&self, event: RoomEvent) {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = rooms.get(event.session_id()) {
            // a send with no receivers just means nobody joined yet
            let _ = tx.send(event);
        }
    }

    fn close_room(&self, session_id: &SessionId) {
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }
}

impl std::fmt::Debug for RoomHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHub")
            .field("capacity", &self.capacity)
            .field("rooms", &self.room_count())
            .finish()
    }
}
