//! Error types for the room layer.

use noughts_protocol::{Rejection, RoomCode, Symbol};

/// Errors that can occur during room operations.
///
/// Every variant except [`RoomError::Unavailable`] leaves the room
/// exactly as it was before the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The client named a room with a code no room can have.
    #[error("room {0:?} not found")]
    UnknownCode(String),

    /// The requested seat is already occupied.
    #[error("seat {0} is already taken")]
    SlotTaken(Symbol),

    /// A move was attempted while a seat is empty.
    #[error("waiting for a second player")]
    NotEnoughPlayers,

    /// The game already has an outcome.
    #[error("the game is over; reset to play again")]
    GameOver,

    #[error("it is {expected}'s turn")]
    WrongTurn { expected: Symbol },

    #[error("({row}, {col}) is off the board")]
    OutOfBounds { row: i64, col: i64 },

    #[error("cell ({row}, {col}) is occupied")]
    CellOccupied { row: usize, col: usize },

    /// Reset was requested before the game finished.
    #[error("the game is still in progress")]
    GameNotOver,

    /// A chat message was empty or whitespace-only.
    #[error("empty chat message")]
    EmptyMessage,

    /// A spectator tried to do something only a seated player may do.
    #[error("only seated players may do that")]
    NotAPlayer,

    /// The connection is not a member of this room.
    #[error("not a member of room {0}")]
    NotInRoom(RoomCode),

    /// The connection is already a member of a room.
    #[error("already in room {0}")]
    AlreadyInRoom(RoomCode),

    /// The room actor is gone (destroyed between lookup and command).
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The wire code reported to the requester, or `None` for errors
    /// that are dropped without a reply.
    pub fn rejection(&self) -> Option<Rejection> {
        Some(match self {
            Self::NotFound(_) | Self::UnknownCode(_) | Self::Unavailable(_) => {
                Rejection::RoomNotFound
            }
            Self::SlotTaken(_) => Rejection::SlotTaken,
            Self::NotEnoughPlayers => Rejection::NotEnoughPlayers,
            Self::GameOver => Rejection::GameOver,
            Self::WrongTurn { .. } => Rejection::WrongTurn,
            Self::OutOfBounds { .. } => Rejection::OutOfBounds,
            Self::CellOccupied { .. } => Rejection::CellOccupied,
            Self::GameNotOver => Rejection::GameNotOver,
            Self::NotAPlayer => Rejection::NotAPlayer,
            Self::NotInRoom(_) => Rejection::NotInRoom,
            Self::AlreadyInRoom(_) => Rejection::AlreadyInRoom,
            Self::EmptyMessage => return None,
        })
    }
}
