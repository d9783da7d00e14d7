//! The closed set of events exchanged over a connection.
//!
//! Both directions use internally tagged JSON: `{"type": "move", ...}`.
//! Anything that doesn't match a variant's schema fails to decode and
//! is answered with a `malformed` rejection instead of being trusted.

use serde::{Deserialize, Serialize};

use crate::{
    ChatEntry, GameMode, PlayerRecord, Rejection, Role, RoomCode, Snapshot,
    Symbol,
};

/// The current protocol version, announced in [`ServerEvent::Connected`].
pub const PROTOCOL_VERSION: u32 = 1;

fn default_theme() -> String {
    "classic".to_string()
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a client may send.
///
/// `role` and `player_name` on room-scoped events are accepted for
/// compatibility with older clients, but the server acts on the role
/// and name bound to the connection when it joined.
///
/// `room_id` is carried as sent. The server normalizes it with
/// [`RoomCode::parse`] and treats a code that can't name a room as an
/// unknown room rather than a malformed frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Create a room and take the `X` seat in it.
    CreateRoom {
        player_name: String,
        #[serde(default)]
        mode: GameMode,
        #[serde(default = "default_theme")]
        theme: String,
    },

    /// Join a room. Without a `role` the server seats the caller as `O`
    /// if that seat is free and as a spectator otherwise.
    Join {
        room_id: String,
        #[serde(default)]
        role: Option<Role>,
        player_name: String,
    },

    Leave {
        room_id: String,
        #[serde(default)]
        role: Option<Role>,
        #[serde(default)]
        player_name: Option<String>,
    },

    /// Place the caller's mark. Coordinates are signed so that
    /// out-of-range values reach the room and are rejected there.
    Move {
        room_id: String,
        #[serde(default)]
        role: Option<Role>,
        row: i64,
        col: i64,
    },

    Reset { room_id: String },

    Chat {
        room_id: String,
        #[serde(default)]
        role: Option<Role>,
        #[serde(default)]
        player_name: Option<String>,
        message: String,
    },

    /// Ask for a fresh snapshot (reconnect/resync). Answered only to the
    /// requester.
    RequestState { room_id: String },

    RequestStats { player_name: String },

    Heartbeat { client_time: u64 },
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First event on every connection.
    Connected {
        connection_id: u64,
        protocol_version: u32,
    },

    /// Reply to `create_room`.
    RoomCreated { room_id: RoomCode },

    /// Reply to a successful `join` (and to `create_room`).
    RoomJoined {
        room_id: RoomCode,
        role: Role,
        player_name: String,
    },

    StateSnapshot(Snapshot),

    PlayerJoined { role: Symbol, player_name: String },

    SpectatorJoined { player_name: String },

    PlayerLeft { role: Symbol, player_name: String },

    ChatMessage(ChatEntry),

    /// A request was refused. Only the requester receives this.
    MoveRejected { reason: Rejection, message: String },

    /// Number of live connections on the server.
    ConnectionCount { count: usize },

    PlayerStats {
        player_name: String,
        record: PlayerRecord,
    },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// The room was destroyed; the connection is no longer bound to it.
    RoomClosed { room_id: RoomCode },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Every frame on the wire is an `Envelope` around one event.
///
/// ```text
/// { "seq": 42, "timestamp": 15000, "payload": { "type": "chat", ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Per-connection, per-direction sequence number.
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,

    pub payload: P,
}

impl<P> Envelope<P> {
    pub fn new(seq: u64, timestamp: u64, payload: P) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}
