//! Session types: what the server remembers about one connection.

use noughts_protocol::{Role, RoomCode, ServerEvent};
use noughts_transport::ConnectionId;
use tokio::sync::mpsc;

/// Sending half of a connection's event queue.
///
/// Unbounded: producers are room actors, which must never wait on a slow
/// socket. Events for one connection leave in exactly the order they
/// were queued.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Receiving half of a connection's event queue, drained by the writer.
pub type Inbox = mpsc::UnboundedReceiver<ServerEvent>;

/// Creates a connected outbox/inbox pair.
pub fn outbox() -> (Outbox, Inbox) {
    mpsc::unbounded_channel()
}

/// The room a connection joined and the role it holds there.
///
/// Assigned once at join time; changing it requires a leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: RoomCode,
    pub role: Role,
    pub player_name: String,
}

/// A single live connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub outbox: Outbox,
    pub binding: Option<Binding>,
}
