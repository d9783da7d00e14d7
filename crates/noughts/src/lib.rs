//! # Noughts
//!
//! Real-time multiplayer noughts and crosses over WebSockets.
//!
//! Clients create or join rooms identified by six-character codes, play
//! as `X` or `O` or watch as spectators, chat, and can opt into a
//! per-player chess clock. The server is authoritative: every move is
//! validated by the room that owns the game, and every member of the
//! room sees the same events in the same order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use noughts::prelude::*;
//!
//! # async fn run() -> Result<(), NoughtsError> {
//! let server = NoughtsServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;
mod stats;

pub use error::NoughtsError;
pub use server::{NoughtsServer, NoughtsServerBuilder, ServerConfig};
pub use stats::PlayerStats;

pub use noughts_protocol as protocol;
pub use noughts_room as room;

pub mod prelude {
    pub use crate::{NoughtsError, NoughtsServer, NoughtsServerBuilder, ServerConfig};
    pub use noughts_protocol::{
        ClientEvent, Codec, Envelope, GameMode, JsonCodec, Rejection, Role,
        RoomCode, ServerEvent, Snapshot, Symbol, PROTOCOL_VERSION,
    };
    pub use noughts_room::RoomConfig;
}
