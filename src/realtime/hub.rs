use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

use crate::realtime::events::OutboundEvent;

/// Address of a live-broadcast group: one per conversation plus one
/// personal notification stream per operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    Conversation(i64),
    Operator(String),
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomKey::Conversation(id) => write!(f, "chat_{}", id),
            RoomKey::Operator(id) => write!(f, "notifications_{}", id),
        }
    }
}

/// Connection registry and room fan-out. Each member owns an unbounded
/// outbound queue: broadcasting hands events off to those queues, so one
/// slow or dead consumer never delays delivery to the rest of the room.
///
/// Rooms exist only while they have members; the last leave removes the
/// room entry. Broadcasting to a room nobody has joined is a no-op: there
/// is no store-and-forward, offline parties catch up over REST.
pub struct RealtimeHub {
    rooms: RwLock<HashMap<RoomKey, HashMap<u64, UnboundedSender<OutboundEvent>>>>,
    next_conn_id: AtomicU64,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Register a connection with a room. Returns the connection id used
    /// for `leave` and the receiving half of the connection's outbound
    /// queue.
    pub async fn join(&self, room: RoomKey) -> (u64, UnboundedReceiver<OutboundEvent>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded_channel();

        let mut rooms = self.rooms.write().await;
        rooms.entry(room.clone()).or_default().insert(conn_id, tx);

        tracing::debug!("Connection {} joined room {}", conn_id, room);

        (conn_id, rx)
    }

    /// Remove a connection from a room. Idempotent; the room itself is
    /// dropped when its last member leaves.
    pub async fn leave(&self, room: &RoomKey, conn_id: u64) {
        let mut rooms = self.rooms.write().await;

        if let Some(members) = rooms.get_mut(room) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(room);
            }
        }

        tracing::debug!("Connection {} left room {}", conn_id, room);
    }

    /// Deliver an event to every current member of a room. Events are
    /// queued per connection in call order, so a single room's stream is
    /// never reordered. Members whose queue is gone (receiver dropped) are
    /// pruned here instead of failing the broadcast.
    pub async fn broadcast(&self, room: &RoomKey, event: OutboundEvent) {
        let mut rooms = self.rooms.write().await;

        let Some(members) = rooms.get_mut(room) else {
            return;
        };

        members.retain(|conn_id, tx| {
            if tx.send(event.clone()).is_ok() {
                true
            } else {
                tracing::debug!("Dropping dead connection {} from room {}", conn_id, room);
                false
            }
        });

        if members.is_empty() {
            rooms.remove(room);
        }
    }

    pub async fn member_count(&self, room: &RoomKey) -> usize {
        self.rooms
            .read()
            .await
            .get(room)
            .map(|members| members.len())
            .unwrap_or(0)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
