//! Game vocabulary shared by the room layer and the wire format.
//!
//! Everything here is plain data: it derives `Serialize`/`Deserialize`
//! and carries no behaviour beyond small accessors. The rules that
//! mutate these values live in `noughts-room`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A short, human-typeable room identifier such as `"K7Q2ZD"`.
///
/// Codes are upper-case ASCII alphanumerics. Codes arriving from clients
/// are trimmed and upper-cased on deserialization, so `" k7q2zd"` and
/// `"K7Q2ZD"` name the same room; anything else fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Length of codes generated by the registry.
    pub const LEN: usize = 6;

    /// Longest code accepted from a client.
    pub const MAX_LEN: usize = 16;

    /// Normalizes and validates a code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if the code is empty,
    /// too long, or contains non-alphanumeric characters.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() || code.len() > Self::MAX_LEN {
            return Err(ProtocolError::InvalidMessage(format!(
                "room code must be 1-{} characters",
                Self::MAX_LEN
            )));
        }
        if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ProtocolError::InvalidMessage(
                "room code must be alphanumeric".into(),
            ));
        }
        Ok(Self(code))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two player marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    /// The other player's symbol.
    pub fn opponent(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }

    /// Stable index (`X` = 0, `O` = 1) for per-symbol arrays.
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::O => 1,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::O => f.write_str("O"),
        }
    }
}

/// The role a connection holds within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    X,
    O,
    #[serde(rename = "spectator")]
    Spectator,
}

impl Role {
    /// The player symbol for `X`/`O`, `None` for spectators.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Self::X => Some(Symbol::X),
            Self::O => Some(Symbol::O),
            Self::Spectator => None,
        }
    }
}

impl From<Symbol> for Role {
    fn from(symbol: Symbol) -> Self {
        match symbol {
            Symbol::X => Self::X,
            Symbol::O => Self::O,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::O => f.write_str("O"),
            Self::Spectator => f.write_str("spectator"),
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// A position on the 3×3 board. Always in bounds once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    /// Board edge length.
    pub const SIZE: usize = 3;

    /// Builds a coordinate from untrusted, possibly negative input.
    /// Returns `None` when either component is outside `0..3`.
    pub fn checked(row: i64, col: i64) -> Option<Self> {
        let size = Self::SIZE as i64;
        if (0..size).contains(&row) && (0..size).contains(&col) {
            Some(Self {
                row: row as usize,
                col: col as usize,
            })
        } else {
            None
        }
    }
}

/// Three coordinates forming a completed row, column, or diagonal.
pub type Line = [Coord; 3];

/// The 3×3 board. `None` is an empty cell.
///
/// Serializes as a nested array: `[["X",null,null],[null,"O",null],...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid([[Option<Symbol>; 3]; 3]);

impl Grid {
    /// An all-empty board.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The mark at `at`, if any.
    pub fn get(&self, at: Coord) -> Option<Symbol> {
        self.0[at.row][at.col]
    }

    /// Returns a copy of the board with `at` set to `symbol`.
    pub fn with(mut self, at: Coord, symbol: Symbol) -> Self {
        self.0[at.row][at.col] = Some(symbol);
        self
    }

    /// `true` when every cell is filled.
    pub fn is_full(&self) -> bool {
        self.0.iter().flatten().all(Option::is_some)
    }

    /// `true` when no cell is filled.
    pub fn is_empty(&self) -> bool {
        self.0.iter().flatten().all(Option::is_none)
    }

    /// Number of filled cells.
    pub fn filled(&self) -> usize {
        self.0.iter().flatten().filter(|c| c.is_some()).count()
    }
}

// ---------------------------------------------------------------------------
// Game results
// ---------------------------------------------------------------------------

/// A terminal game result.
///
/// A `Win` with `line: None` is a forfeiture on time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Win { winner: Symbol, line: Option<Line> },
    Tie,
}

impl Outcome {
    /// The winning symbol, `None` for a tie.
    pub fn winner(&self) -> Option<Symbol> {
        match self {
            Self::Win { winner, .. } => Some(*winner),
            Self::Tie => None,
        }
    }

    /// The completed line for a board win.
    pub fn line(&self) -> Option<Line> {
        match self {
            Self::Win { line, .. } => *line,
            Self::Tie => None,
        }
    }

    /// `true` for a win produced by time exhaustion.
    pub fn is_forfeit(&self) -> bool {
        matches!(self, Self::Win { line: None, .. })
    }
}

/// Per-symbol win counters. Serializes as `{"X": 1, "O": 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scores {
    #[serde(rename = "X")]
    pub x: u32,
    #[serde(rename = "O")]
    pub o: u32,
}

impl Scores {
    pub fn get(&self, symbol: Symbol) -> u32 {
        match symbol {
            Symbol::X => self.x,
            Symbol::O => self.o,
        }
    }

    pub fn increment(&mut self, symbol: Symbol) {
        match symbol {
            Symbol::X => self.x += 1,
            Symbol::O => self.o += 1,
        }
    }
}

/// Lifecycle phase of a room's current game.
///
/// ```text
/// WaitingForPlayers → InProgress → Finished
///        ↑                │  ↑         │
///        └── seat empties ┘  └─ reset ─┘ (or back to WaitingForPlayers)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WaitingForPlayers,
    InProgress,
    Finished,
}

impl Phase {
    /// Returns `true` if moving from `self` to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        use Phase::*;
        matches!(
            (self, target),
            (WaitingForPlayers, InProgress)
                | (InProgress, WaitingForPlayers)
                | (InProgress, Finished)
                | (Finished, InProgress)
                | (Finished, WaitingForPlayers)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForPlayers => f.write_str("WaitingForPlayers"),
            Self::InProgress => f.write_str("InProgress"),
            Self::Finished => f.write_str("Finished"),
        }
    }
}

/// Time control selected when the room was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// No clock.
    #[default]
    Standard,
    /// A generous per-player budget.
    Timed,
    /// A short per-player budget.
    Blitz,
}

/// One applied move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub symbol: Symbol,
    pub row: usize,
    pub col: usize,
    /// Unix time in milliseconds.
    pub timestamp: u64,
}

/// Remaining clock per player, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemainingTime {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "O")]
    pub o: f64,
}

/// Clock state as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeControlView {
    pub per_move_secs: u64,
    pub remaining: RemainingTime,
}

/// Display names of everyone in the room.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Names {
    #[serde(rename = "X")]
    pub x: Option<String>,
    #[serde(rename = "O")]
    pub o: Option<String>,
    pub spectators: Vec<String>,
}

/// Full room state, sent after every mutation and on `request_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub room_id: RoomCode,
    pub phase: Phase,
    pub mode: GameMode,
    pub theme: String,
    pub grid: Grid,
    /// Whose move is accepted next; `None` once the game is finished.
    pub turn: Option<Symbol>,
    pub outcome: Option<Outcome>,
    /// Cells of the winning line, empty unless the board was won.
    pub winning_line: Vec<Coord>,
    pub scores: Scores,
    pub history: Vec<MoveRecord>,
    pub time_control: Option<TimeControlView>,
    pub names: Names,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Who wrote a chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatSender {
    X,
    O,
    #[serde(rename = "spectator")]
    Spectator,
    #[serde(rename = "system")]
    System,
}

impl From<Role> for ChatSender {
    fn from(role: Role) -> Self {
        match role {
            Role::X => Self::X,
            Role::O => Self::O,
            Role::Spectator => Self::Spectator,
        }
    }
}

/// One line in a room's chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub sender: ChatSender,
    pub player_name: String,
    pub message: String,
    /// Unix time in milliseconds.
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Rejections and stats
// ---------------------------------------------------------------------------

/// Why a client request was refused. Delivered only to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    RoomNotFound,
    SlotTaken,
    NotEnoughPlayers,
    GameOver,
    WrongTurn,
    OutOfBounds,
    CellOccupied,
    GameNotOver,
    NotAPlayer,
    NotInRoom,
    AlreadyInRoom,
    Malformed,
}

/// Lifetime counters for one display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub games_played: u32,
}
