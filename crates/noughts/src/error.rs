//! Unified error type for the Noughts server.

use noughts_protocol::ProtocolError;
use noughts_room::RoomError;
use noughts_session::SessionError;
use noughts_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum NoughtsError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown connection, already bound).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (not found, rejected move, room gone).
    #[error(transparent)]
    Room(#[from] RoomError),
}
