//! Wire protocol for Noughts.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Game vocabulary** ([`Symbol`], [`Grid`], [`Outcome`], [`Snapshot`],
//!   [`ChatEntry`], ...) shared by the room layer and the wire.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`Envelope`]): the
//!   closed set of messages that travel over a connection.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer doesn't know about connections or rooms; it only
//! describes and (de)serializes what they exchange.

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, Envelope, ServerEvent, PROTOCOL_VERSION};
pub use types::{
    ChatEntry, ChatSender, Coord, GameMode, Grid, Line, MoveRecord, Names,
    Outcome, Phase, PlayerRecord, Rejection, RemainingTime, Role, RoomCode,
    Scores, Snapshot, Symbol, TimeControlView,
};
