use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

use lanchat_types::events::ServerEvent;

/// Identity of one socket, issued when the WebSocket is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the coordination core needs from the connection layer.
pub trait Transport {
    /// Fire-and-forget delivery. A dead connection is silently skipped.
    fn emit(&self, conn: ConnId, event: ServerEvent);

    fn join_room(&mut self, conn: ConnId, room: &str);

    /// Forget `conn` and drop it from every room.
    fn unregister(&mut self, conn: ConnId);

    /// Connections currently joined to `room`, in join order.
    fn room_members(&self, room: &str) -> Vec<ConnId>;

    fn is_connected(&self, conn: ConnId) -> bool;
}

/// Tracks every connected socket's outbound channel and the transport rooms
/// it has joined. Owned by the engine task, so no locking.
#[derive(Debug, Default)]
pub struct Dispatcher {
    /// Per-connection send channels: conn_id -> sender
    channels: HashMap<ConnId, mpsc::UnboundedSender<ServerEvent>>,

    /// Transport rooms: room -> members in join order
    rooms: HashMap<String, Vec<ConnId>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound channel.
    pub fn register(&mut self, conn: ConnId, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.channels.insert(conn, tx);
    }
}

impl Transport for Dispatcher {
    fn emit(&self, conn: ConnId, event: ServerEvent) {
        if let Some(tx) = self.channels.get(&conn) {
            let _ = tx.send(event);
        }
    }

    fn join_room(&mut self, conn: ConnId, room: &str) {
        let members = self.rooms.entry(room.to_string()).or_default();
        if !members.contains(&conn) {
            members.push(conn);
        }
    }

    fn unregister(&mut self, conn: ConnId) {
        self.channels.remove(&conn);
        self.rooms.retain(|_, members| {
            members.retain(|member| *member != conn);
            !members.is_empty()
        });
    }

    fn room_members(&self, room: &str) -> Vec<ConnId> {
        self.rooms.get(room).cloned().unwrap_or_default()
    }

    fn is_connected(&self, conn: ConnId) -> bool {
        self.channels.contains_key(&conn)
    }
}
