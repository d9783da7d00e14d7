//! Rooms for Noughts.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns one
//! game: board, turn, seats, spectators, scores, chat, and clock. All
//! mutations of a room go through its mailbox, so they never interleave.
//!
//! # Key types
//!
//! - [`Room`]: the pure state machine with the game rules
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomRegistry`]: creates, finds, and destroys rooms
//! - [`RoomConfig`]: chat limits, grace window, clock budgets
//! - [`GameResult`]: what the stats collector hears when a game ends
//!
//! The board engine ([`board`]) and time control ([`clock`]) are plain
//! modules the room builds on.

pub mod board;
mod chat;
pub mod clock;
mod config;
mod error;
mod registry;
mod room;
mod state;

pub use chat::ChatLog;
pub use config::{RoomConfig, RoomSettings};
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{ResultSender, RoomHandle};
pub use state::{Effects, GameResult, Member, Recipient, Room};
