//! Error types for the session layer.

use noughts_protocol::RoomCode;
use noughts_transport::ConnectionId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given connection.
    #[error("session not found for {0}")]
    NotFound(ConnectionId),

    /// A session was already registered for this connection.
    #[error("{0} already has a session")]
    AlreadyConnected(ConnectionId),

    /// The connection is already bound to a room. Rebinding requires
    /// leaving first.
    #[error("{0} is already bound to room {1}")]
    AlreadyBound(ConnectionId, RoomCode),

    /// The connection is not bound to any room.
    #[error("{0} is not in any room")]
    NotBound(ConnectionId),
}
