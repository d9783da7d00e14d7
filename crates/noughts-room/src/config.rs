//! Room configuration and per-room settings.

use std::time::Duration;

use noughts_protocol::GameMode;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Server-wide tuning shared by every room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum chat entries retained per room. Oldest are evicted first.
    pub chat_capacity: usize,

    /// How many recent chat entries a joining connection is sent.
    pub chat_backlog: usize,

    /// How long a room with both seats empty survives before it is
    /// destroyed. Any join during the window keeps it alive.
    pub abandon_grace: Duration,

    /// Bound of each room actor's command mailbox.
    pub channel_size: usize,

    /// Per-player clock budget in [`GameMode::Timed`].
    pub timed_budget: Duration,

    /// Per-player clock budget in [`GameMode::Blitz`].
    pub blitz_budget: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            chat_capacity: 100,
            chat_backlog: 50,
            abandon_grace: Duration::from_secs(60),
            channel_size: 64,
            timed_budget: Duration::from_secs(60),
            blitz_budget: Duration::from_secs(10),
        }
    }
}

impl RoomConfig {
    /// The clock budget for `mode`, or `None` when the mode is untimed.
    pub fn budget_for(&self, mode: GameMode) -> Option<Duration> {
        match mode {
            GameMode::Standard => None,
            GameMode::Timed => Some(self.timed_budget),
            GameMode::Blitz => Some(self.blitz_budget),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// Choices made by the creator of a room. Fixed for the room's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomSettings {
    pub mode: GameMode,
    /// Opaque presentation label, echoed back in snapshots.
    pub theme: String,
}

impl RoomSettings {
    pub fn new(mode: GameMode, theme: impl Into<String>) -> Self {
        Self {
            mode,
            theme: theme.into(),
        }
    }
}
