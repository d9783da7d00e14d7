//! The room state machine.
//!
//! [`Room`] holds one game's state and enforces its rules. It is plain
//! data with no I/O or locking: the room actor owns exactly one `Room`
//! and calls into it one command at a time, which is what serializes
//! mutations. Every operation either fails without touching the room or
//! succeeds and returns the [`Effects`] to deliver.
//!
//! ```text
//!                      second seat filled
//! WaitingForPlayers ───────────────────────→ InProgress
//!        ↑                                     │  ↑
//!        │ seat empties              line/tie/ │  │ reset (both seated)
//!        │                            forfeit  ↓  │
//!        └──────────── reset (seat empty) ─── Finished
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use noughts_protocol::{
    ChatEntry, ChatSender, Coord, Grid, MoveRecord, Names, Outcome, Phase,
    Role, RoomCode, Scores, ServerEvent, Snapshot, Symbol,
};
use noughts_session::ConnectionId;
use tokio::time::Instant;

use crate::board;
use crate::chat::ChatLog;
use crate::clock::TurnClock;
use crate::{RoomConfig, RoomError, RoomSettings};

const SYSTEM_NAME: &str = "System";

/// A connection taking part in a room, with the name it joined under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub name: String,
}

impl Member {
    pub fn new(connection_id: ConnectionId, name: impl Into<String>) -> Self {
        Self {
            connection_id,
            name: name.into(),
        }
    }
}

/// Who an outgoing event is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every member of the room.
    All,
    /// A single connection.
    Only(ConnectionId),
}

/// A terminal game, reported to the stats collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameResult {
    Decisive { winner: String, loser: String },
    Tie { x: String, o: String },
}

/// What a successful room operation produced.
#[derive(Debug, Default)]
pub struct Effects {
    /// Events in the order they must be delivered.
    pub messages: Vec<(Recipient, ServerEvent)>,
    /// Set when this operation ended a game.
    pub result: Option<GameResult>,
}

impl Effects {
    fn push(&mut self, to: Recipient, event: ServerEvent) {
        self.messages.push((to, event));
    }

    fn broadcast(&mut self, event: ServerEvent) {
        self.push(Recipient::All, event);
    }
}

/// One game room.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    settings: RoomSettings,
    grid: Grid,
    turn: Symbol,
    outcome: Option<Outcome>,
    scores: Scores,
    history: Vec<MoveRecord>,
    clock: Option<TurnClock>,
    seats: [Option<Member>; 2],
    spectators: Vec<Member>,
    chat: ChatLog,
    chat_backlog: usize,
}

impl Room {
    /// Creates a room with `creator` seated as `X`.
    pub fn new(
        code: RoomCode,
        settings: RoomSettings,
        config: &RoomConfig,
        creator: Member,
    ) -> Self {
        let clock = config.budget_for(settings.mode).map(TurnClock::new);
        Self {
            code,
            settings,
            grid: Grid::empty(),
            turn: Symbol::X,
            outcome: None,
            scores: Scores::default(),
            history: Vec::new(),
            clock,
            seats: [Some(creator), None],
            spectators: Vec::new(),
            chat: ChatLog::new(config.chat_capacity),
            chat_backlog: config.chat_backlog,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// The current phase, derived from outcome and seat occupancy.
    pub fn phase(&self) -> Phase {
        if self.outcome.is_some() {
            Phase::Finished
        } else if self.seats_filled() {
            Phase::InProgress
        } else {
            Phase::WaitingForPlayers
        }
    }

    /// `true` once both seats are empty. Spectators don't keep a room alive.
    pub fn is_abandoned(&self) -> bool {
        self.seats.iter().all(Option::is_none)
    }

    /// The role `connection_id` holds here, if it is a member.
    pub fn role_of(&self, connection_id: ConnectionId) -> Option<Role> {
        if let Some(symbol) = self.seat_of(connection_id) {
            return Some(symbol.into());
        }
        self.spectators
            .iter()
            .any(|m| m.connection_id == connection_id)
            .then_some(Role::Spectator)
    }

    /// Every member's connection, seats first.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.seats.iter().flatten().chain(self.spectators.iter())
    }

    /// When the running player's clock runs out, if a clock is running.
    pub fn clock_deadline(&self) -> Option<Instant> {
        self.clock.as_ref().and_then(TurnClock::deadline)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Adds a member.
    ///
    /// Without a requested role the member takes the `O` seat if it is
    /// free and joins as a spectator otherwise.
    ///
    /// # Errors
    /// - [`RoomError::AlreadyInRoom`]: the connection is already a member
    /// - [`RoomError::SlotTaken`]: the requested seat is occupied
    pub fn join(
        &mut self,
        member: Member,
        role: Option<Role>,
        now: Instant,
    ) -> Result<(Role, Effects), RoomError> {
        if self.role_of(member.connection_id).is_some() {
            return Err(RoomError::AlreadyInRoom(self.code.clone()));
        }

        let role = role.unwrap_or(if self.seats[Symbol::O.index()].is_none() {
            Role::O
        } else {
            Role::Spectator
        });

        let joiner = member.connection_id;
        let mut effects = Effects::default();

        match role.symbol() {
            Some(symbol) => {
                let seat = &mut self.seats[symbol.index()];
                if seat.is_some() {
                    return Err(RoomError::SlotTaken(symbol));
                }
                effects.broadcast(ServerEvent::PlayerJoined {
                    role: symbol,
                    player_name: member.name.clone(),
                });
                *seat = Some(member);
                self.resume_clock(now);
            }
            None => {
                effects.broadcast(ServerEvent::SpectatorJoined {
                    player_name: member.name.clone(),
                });
                self.spectators.push(member);
            }
        }

        effects.broadcast(ServerEvent::StateSnapshot(self.snapshot()));
        for entry in self.chat.recent(self.chat_backlog) {
            effects.push(
                Recipient::Only(joiner),
                ServerEvent::ChatMessage(entry.clone()),
            );
        }

        Ok((role, effects))
    }

    /// Removes a member.
    ///
    /// A player leaving frees their seat, stops the clock, and is announced
    /// with a system chat line. If the running clock is already spent the
    /// game is forfeited first. A spectator leaving removes exactly that
    /// connection.
    ///
    /// # Errors
    /// Returns [`RoomError::NotInRoom`] if the connection isn't a member.
    pub fn leave(
        &mut self,
        connection_id: ConnectionId,
        now: Instant,
    ) -> Result<Effects, RoomError> {
        let mut effects = Effects::default();

        if let Some(symbol) = self.seat_of(connection_id) {
            // A clock that ran out before the leave landed still decides
            // the game; settle it while both seats are known.
            let spent = self
                .clock
                .as_mut()
                .and_then(|clock| clock.stop(now))
                .and_then(|(running, spent)| spent.then_some(running));
            if let (Some(loser), None) = (spent, self.outcome) {
                tracing::info!(room_id = %self.code, %loser, "clock expired before leave");
                effects.result = self.finish(Outcome::Win {
                    winner: loser.opponent(),
                    line: None,
                });
            }

            let Some(member) = self.seats[symbol.index()].take() else {
                return Err(RoomError::NotInRoom(self.code.clone()));
            };

            effects.broadcast(ServerEvent::PlayerLeft {
                role: symbol,
                player_name: member.name.clone(),
            });
            let notice = self.append_chat(
                ChatSender::System,
                SYSTEM_NAME.to_string(),
                format!("{} has left the game", member.name),
            );
            effects.broadcast(ServerEvent::ChatMessage(notice));
        } else if let Some(pos) = self
            .spectators
            .iter()
            .position(|m| m.connection_id == connection_id)
        {
            self.spectators.remove(pos);
        } else {
            return Err(RoomError::NotInRoom(self.code.clone()));
        }

        effects.broadcast(ServerEvent::StateSnapshot(self.snapshot()));
        Ok(effects)
    }

    // -----------------------------------------------------------------------
    // Play
    // -----------------------------------------------------------------------

    /// Plays `symbol` at `(row, col)`.
    ///
    /// Checks run in a fixed order and the first failure wins: seats,
    /// outcome, turn, bounds, occupancy. On success the move is recorded,
    /// the mover's clock is charged, and the position is judged. A spent
    /// clock overrides whatever the board says.
    pub fn submit_move(
        &mut self,
        symbol: Symbol,
        row: i64,
        col: i64,
        now: Instant,
    ) -> Result<Effects, RoomError> {
        if !self.seats_filled() {
            return Err(RoomError::NotEnoughPlayers);
        }
        if self.outcome.is_some() {
            return Err(RoomError::GameOver);
        }
        if symbol != self.turn {
            return Err(RoomError::WrongTurn {
                expected: self.turn,
            });
        }
        let coord =
            Coord::checked(row, col).ok_or(RoomError::OutOfBounds { row, col })?;
        if self.grid.get(coord).is_some() {
            return Err(RoomError::CellOccupied {
                row: coord.row,
                col: coord.col,
            });
        }

        self.grid = board::apply_move(self.grid, symbol, coord);
        self.history.push(MoveRecord {
            symbol,
            row: coord.row,
            col: coord.col,
            timestamp: unix_millis(),
        });

        let out_of_time = self
            .clock
            .as_mut()
            .and_then(|clock| clock.stop(now))
            .is_some_and(|(_, spent)| spent);

        let outcome = if out_of_time {
            Some(Outcome::Win {
                winner: symbol.opponent(),
                line: None,
            })
        } else {
            board::evaluate(&self.grid)
        };

        let mut effects = Effects::default();
        match outcome {
            Some(outcome) => effects.result = self.finish(outcome),
            None => {
                self.turn = symbol.opponent();
                if let Some(clock) = &mut self.clock {
                    clock.start(self.turn, now);
                }
            }
        }

        effects.broadcast(ServerEvent::StateSnapshot(self.snapshot()));
        Ok(effects)
    }

    /// Ends the game on time if the running player's clock is spent at
    /// `now`. Returns `None` when nothing expired.
    pub fn expire(&mut self, now: Instant) -> Option<Effects> {
        if self.outcome.is_some() {
            return None;
        }
        let deadline = self.clock_deadline()?;
        if now < deadline {
            return None;
        }

        let (loser, _) = self.clock.as_mut()?.stop(now)?;
        tracing::info!(room_id = %self.code, %loser, "clock expired");

        let mut effects = Effects {
            result: self.finish(Outcome::Win {
                winner: loser.opponent(),
                line: None,
            }),
            ..Effects::default()
        };
        effects.broadcast(ServerEvent::StateSnapshot(self.snapshot()));
        Some(effects)
    }

    /// Starts a new game after one finished. Scores, members, and chat
    /// are kept.
    ///
    /// # Errors
    /// Returns [`RoomError::GameNotOver`] unless the game has an outcome.
    pub fn reset(&mut self, now: Instant) -> Result<Effects, RoomError> {
        if self.outcome.is_none() {
            return Err(RoomError::GameNotOver);
        }

        self.grid = Grid::empty();
        self.outcome = None;
        self.history.clear();
        self.turn = Symbol::X;
        if let Some(clock) = &mut self.clock {
            clock.refill();
        }
        self.resume_clock(now);

        let mut effects = Effects::default();
        effects.broadcast(ServerEvent::StateSnapshot(self.snapshot()));
        let notice = self.append_chat(
            ChatSender::System,
            SYSTEM_NAME.to_string(),
            "Game has been reset!".to_string(),
        );
        effects.broadcast(ServerEvent::ChatMessage(notice));
        Ok(effects)
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    /// Appends a chat line from `connection_id`.
    ///
    /// # Errors
    /// - [`RoomError::EmptyMessage`]: nothing left after trimming
    /// - [`RoomError::NotInRoom`]: the connection isn't a member
    pub fn post_chat(
        &mut self,
        connection_id: ConnectionId,
        message: &str,
    ) -> Result<Effects, RoomError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(RoomError::EmptyMessage);
        }
        let (role, name) = self
            .members_with_roles()
            .find(|(_, m)| m.connection_id == connection_id)
            .map(|(role, m)| (role, m.name.clone()))
            .ok_or_else(|| RoomError::NotInRoom(self.code.clone()))?;

        let entry = self.append_chat(role.into(), name, message.to_string());
        let mut effects = Effects::default();
        effects.broadcast(ServerEvent::ChatMessage(entry));
        Ok(effects)
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// The full room state as sent to clients.
    pub fn snapshot(&self) -> Snapshot {
        let name = |symbol: Symbol| {
            self.seats[symbol.index()].as_ref().map(|m| m.name.clone())
        };
        Snapshot {
            room_id: self.code.clone(),
            phase: self.phase(),
            mode: self.settings.mode,
            theme: self.settings.theme.clone(),
            grid: self.grid,
            turn: self.outcome.is_none().then_some(self.turn),
            outcome: self.outcome,
            winning_line: self
                .outcome
                .and_then(|o| o.line())
                .map(Vec::from)
                .unwrap_or_default(),
            scores: self.scores,
            history: self.history.clone(),
            time_control: self.clock.as_ref().map(TurnClock::view),
            names: Names {
                x: name(Symbol::X),
                o: name(Symbol::O),
                spectators: self.spectators.iter().map(|m| m.name.clone()).collect(),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn seats_filled(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    fn seat_of(&self, connection_id: ConnectionId) -> Option<Symbol> {
        [Symbol::X, Symbol::O].into_iter().find(|s| {
            self.seats[s.index()]
                .as_ref()
                .is_some_and(|m| m.connection_id == connection_id)
        })
    }

    fn members_with_roles(&self) -> impl Iterator<Item = (Role, &Member)> {
        let seated = [Symbol::X, Symbol::O].into_iter().filter_map(|s| {
            self.seats[s.index()].as_ref().map(|m| (Role::from(s), m))
        });
        seated.chain(self.spectators.iter().map(|m| (Role::Spectator, m)))
    }

    /// Starts the turn clock if a game is now in progress and it isn't
    /// already running.
    fn resume_clock(&mut self, now: Instant) {
        if self.phase() != Phase::InProgress {
            return;
        }
        let turn = self.turn;
        if let Some(clock) = &mut self.clock {
            if !clock.is_running() {
                clock.start(turn, now);
            }
        }
    }

    /// Records a terminal outcome. Called at most once per game.
    fn finish(&mut self, outcome: Outcome) -> Option<GameResult> {
        debug_assert!(self.outcome.is_none());
        self.outcome = Some(outcome);

        let name = |symbol: Symbol| {
            self.seats[symbol.index()]
                .as_ref()
                .map(|m| m.name.clone())
        };

        match outcome.winner() {
            Some(winner) => {
                self.scores.increment(winner);
                tracing::info!(room_id = %self.code, %winner, forfeit = outcome.is_forfeit(), "game finished");
                Some(GameResult::Decisive {
                    winner: name(winner)?,
                    loser: name(winner.opponent())?,
                })
            }
            None => {
                tracing::info!(room_id = %self.code, "game tied");
                Some(GameResult::Tie {
                    x: name(Symbol::X)?,
                    o: name(Symbol::O)?,
                })
            }
        }
    }

    fn append_chat(
        &mut self,
        sender: ChatSender,
        player_name: String,
        message: String,
    ) -> ChatEntry {
        let entry = ChatEntry {
            sender,
            player_name,
            message,
            timestamp: unix_millis(),
        };
        self.chat.push(entry.clone());
        entry
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use noughts_protocol::GameMode;

    use super::*;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn code() -> RoomCode {
        RoomCode::parse("ABC123").unwrap()
    }

    fn room(mode: GameMode) -> Room {
        Room::new(
            code(),
            RoomSettings::new(mode, "classic"),
            &RoomConfig::default(),
            Member::new(cid(1), "Ada"),
        )
    }

    /// A room with both seats filled at `now`.
    fn full_room(mode: GameMode, now: Instant) -> Room {
        let mut room = room(mode);
        room.join(Member::new(cid(2), "Bob"), Some(Role::O), now).unwrap();
        room
    }

    fn snapshot_of(effects: &Effects) -> &Snapshot {
        effects
            .messages
            .iter()
            .rev()
            .find_map(|(_, e)| match e {
                ServerEvent::StateSnapshot(s) => Some(s),
                _ => None,
            })
            .expect("effects carry a snapshot")
    }

    // =====================================================================
    // Membership
    // =====================================================================

    #[test]
    fn test_new_room_waits_for_second_player() {
        let room = room(GameMode::Standard);
        assert_eq!(room.phase(), Phase::WaitingForPlayers);
        assert_eq!(room.role_of(cid(1)), Some(Role::X));
        assert!(!room.is_abandoned());
    }

    #[tokio::test]
    async fn test_join_without_role_takes_o_then_spectates() {
        let now = Instant::now();
        let mut room = room(GameMode::Standard);

        let (role, effects) = room.join(Member::new(cid(2), "Bob"), None, now).unwrap();
        assert_eq!(role, Role::O);
        assert_eq!(
            effects.messages[0],
            (
                Recipient::All,
                ServerEvent::PlayerJoined {
                    role: Symbol::O,
                    player_name: "Bob".into()
                }
            )
        );
        assert_eq!(snapshot_of(&effects).phase, Phase::InProgress);

        let (role, _) = room.join(Member::new(cid(3), "Eve"), None, now).unwrap();
        assert_eq!(role, Role::Spectator);
        assert_eq!(room.snapshot().names.spectators, vec!["Eve".to_string()]);
    }

    #[tokio::test]
    async fn test_join_taken_seat_is_rejected() {
        let now = Instant::now();
        let mut room = room(GameMode::Standard);

        let err = room
            .join(Member::new(cid(2), "Bob"), Some(Role::X), now)
            .unwrap_err();

        assert_eq!(err, RoomError::SlotTaken(Symbol::X));
        assert_eq!(room.role_of(cid(2)), None);
    }

    #[tokio::test]
    async fn test_same_connection_cannot_join_twice() {
        let now = Instant::now();
        let mut room = room(GameMode::Standard);
        let err = room
            .join(Member::new(cid(1), "Ada"), Some(Role::Spectator), now)
            .unwrap_err();
        assert!(matches!(err, RoomError::AlreadyInRoom(_)));
    }

    #[tokio::test]
    async fn test_join_replays_chat_backlog_to_joiner_only() {
        let now = Instant::now();
        let mut room = room(GameMode::Standard);
        for i in 0..60 {
            room.post_chat(cid(1), &format!("hello {i}")).unwrap();
        }

        let (_, effects) = room.join(Member::new(cid(2), "Bob"), None, now).unwrap();

        let backlog: Vec<_> = effects
            .messages
            .iter()
            .filter(|(to, _)| *to == Recipient::Only(cid(2)))
            .collect();
        assert_eq!(backlog.len(), 50);
        assert!(matches!(
            &backlog[0].1,
            ServerEvent::ChatMessage(e) if e.message == "hello 10"
        ));
    }

    #[tokio::test]
    async fn test_player_leave_frees_seat_and_posts_notice() {
        let now = Instant::now();
        let mut room = full_room(GameMode::Standard, now);

        let effects = room.leave(cid(2), now).unwrap();

        assert!(matches!(
            &effects.messages[0].1,
            ServerEvent::PlayerLeft { role: Symbol::O, player_name } if player_name == "Bob"
        ));
        assert!(matches!(
            &effects.messages[1].1,
            ServerEvent::ChatMessage(e)
                if e.sender == ChatSender::System && e.message == "Bob has left the game"
        ));
        assert_eq!(room.phase(), Phase::WaitingForPlayers);
        assert_eq!(room.role_of(cid(2)), None);
    }

    #[tokio::test]
    async fn test_spectator_leave_removes_only_that_connection() {
        let now = Instant::now();
        let mut room = room(GameMode::Standard);
        room.join(Member::new(cid(3), "Eve"), Some(Role::Spectator), now).unwrap();
        room.join(Member::new(cid(4), "Eve"), Some(Role::Spectator), now).unwrap();

        room.leave(cid(4), now).unwrap();

        assert_eq!(room.role_of(cid(3)), Some(Role::Spectator));
        assert_eq!(room.role_of(cid(4)), None);
        assert_eq!(room.snapshot().names.spectators.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_by_stranger_is_rejected() {
        let mut room = room(GameMode::Standard);
        assert!(matches!(
            room.leave(cid(9), Instant::now()),
            Err(RoomError::NotInRoom(_))
        ));
    }

    #[tokio::test]
    async fn test_abandoned_once_both_seats_empty() {
        let now = Instant::now();
        let mut room = full_room(GameMode::Standard, now);
        room.join(Member::new(cid(3), "Eve"), Some(Role::Spectator), now).unwrap();

        room.leave(cid(1), now).unwrap();
        assert!(!room.is_abandoned());
        room.leave(cid(2), now).unwrap();
        assert!(room.is_abandoned());
    }

    // =====================================================================
    // Moves
    // =====================================================================

    #[tokio::test]
    async fn test_move_rejections_in_order() {
        let now = Instant::now();
        let mut room = room(GameMode::Standard);
        assert_eq!(
            room.submit_move(Symbol::X, 0, 0, now).unwrap_err(),
            RoomError::NotEnoughPlayers
        );

        room.join(Member::new(cid(2), "Bob"), None, now).unwrap();
        assert_eq!(
            room.submit_move(Symbol::O, 9, 9, now).unwrap_err(),
            RoomError::WrongTurn { expected: Symbol::X }
        );
        assert_eq!(
            room.submit_move(Symbol::X, 3, 0, now).unwrap_err(),
            RoomError::OutOfBounds { row: 3, col: 0 }
        );
        assert_eq!(
            room.submit_move(Symbol::X, -1, 0, now).unwrap_err(),
            RoomError::OutOfBounds { row: -1, col: 0 }
        );

        room.submit_move(Symbol::X, 0, 0, now).unwrap();
        assert_eq!(
            room.submit_move(Symbol::O, 0, 0, now).unwrap_err(),
            RoomError::CellOccupied { row: 0, col: 0 }
        );
    }

    #[tokio::test]
    async fn test_rejected_move_leaves_state_untouched() {
        let now = Instant::now();
        let mut room = full_room(GameMode::Standard, now);
        room.submit_move(Symbol::X, 1, 1, now).unwrap();
        let before = room.snapshot();

        let _ = room.submit_move(Symbol::X, 0, 0, now);
        let _ = room.submit_move(Symbol::O, 1, 1, now);

        assert_eq!(room.snapshot(), before);
    }

    #[tokio::test]
    async fn test_row_win_scores_once() {
        let now = Instant::now();
        let mut room = full_room(GameMode::Standard, now);

        let moves = [
            (Symbol::X, 0, 0),
            (Symbol::O, 1, 1),
            (Symbol::X, 0, 1),
            (Symbol::O, 2, 2),
        ];
        for (symbol, row, col) in moves {
            let effects = room.submit_move(symbol, row, col, now).unwrap();
            assert!(effects.result.is_none());
        }
        let effects = room.submit_move(Symbol::X, 0, 2, now).unwrap();

        let snap = snapshot_of(&effects);
        assert_eq!(snap.phase, Phase::Finished);
        assert_eq!(snap.turn, None);
        assert_eq!(
            snap.winning_line,
            vec![
                Coord { row: 0, col: 0 },
                Coord { row: 0, col: 1 },
                Coord { row: 0, col: 2 }
            ]
        );
        assert_eq!(snap.scores, Scores { x: 1, o: 0 });
        assert_eq!(snap.history.len(), 5);
        assert_eq!(
            effects.result,
            Some(GameResult::Decisive {
                winner: "Ada".into(),
                loser: "Bob".into()
            })
        );

        assert_eq!(
            room.submit_move(Symbol::O, 2, 0, now).unwrap_err(),
            RoomError::GameOver
        );
        assert_eq!(room.snapshot().scores, Scores { x: 1, o: 0 });
    }

    #[tokio::test]
    async fn test_tie_scores_nothing() {
        let now = Instant::now();
        let mut room = full_room(GameMode::Standard, now);
        // X O X
        // X O O
        // O X X
        let moves = [
            (Symbol::X, 0, 0),
            (Symbol::O, 0, 1),
            (Symbol::X, 0, 2),
            (Symbol::O, 1, 1),
            (Symbol::X, 1, 0),
            (Symbol::O, 1, 2),
            (Symbol::X, 2, 1),
            (Symbol::O, 2, 0),
        ];
        for (symbol, row, col) in moves {
            room.submit_move(symbol, row, col, now).unwrap();
        }
        let effects = room.submit_move(Symbol::X, 2, 2, now).unwrap();

        let snap = snapshot_of(&effects);
        assert_eq!(snap.outcome, Some(Outcome::Tie));
        assert!(snap.winning_line.is_empty());
        assert_eq!(snap.scores, Scores::default());
        assert_eq!(
            effects.result,
            Some(GameResult::Tie {
                x: "Ada".into(),
                o: "Bob".into()
            })
        );
    }

    // =====================================================================
    // Time control
    // =====================================================================

    #[tokio::test]
    async fn test_slow_move_applies_then_forfeits() {
        let t0 = Instant::now();
        let mut room = full_room(GameMode::Blitz, t0);
        assert_eq!(room.clock_deadline(), Some(t0 + Duration::from_secs(10)));

        let effects = room
            .submit_move(Symbol::X, 1, 1, t0 + Duration::from_secs(11))
            .unwrap();

        let snap = snapshot_of(&effects);
        assert_eq!(
            snap.grid.get(Coord { row: 1, col: 1 }),
            Some(Symbol::X)
        );
        assert_eq!(
            snap.outcome,
            Some(Outcome::Win {
                winner: Symbol::O,
                line: None
            })
        );
        assert_eq!(snap.scores, Scores { x: 0, o: 1 });
        assert_eq!(snap.time_control.map(|t| t.remaining.x), Some(0.0));
        assert_eq!(room.clock_deadline(), None);
    }

    #[tokio::test]
    async fn test_forfeit_overrides_board_win_with_single_increment() {
        let t0 = Instant::now();
        let mut room = full_room(GameMode::Blitz, t0);
        let s = Duration::from_secs(1);
        room.submit_move(Symbol::X, 0, 0, t0 + s).unwrap();
        room.submit_move(Symbol::O, 1, 0, t0 + s * 2).unwrap();
        room.submit_move(Symbol::X, 0, 1, t0 + s * 3).unwrap();
        room.submit_move(Symbol::O, 1, 1, t0 + s * 4).unwrap();

        // X completes the top row, but its clock ran out first.
        let effects = room.submit_move(Symbol::X, 0, 2, t0 + s * 13).unwrap();

        let snap = snapshot_of(&effects);
        assert_eq!(snap.outcome.and_then(|o| o.winner()), Some(Symbol::O));
        assert!(snap.winning_line.is_empty());
        assert_eq!(snap.scores, Scores { x: 0, o: 1 });
    }

    #[tokio::test]
    async fn test_budget_is_charged_per_player() {
        let t0 = Instant::now();
        let mut room = full_room(GameMode::Timed, t0);

        room.submit_move(Symbol::X, 0, 0, t0 + Duration::from_secs(5)).unwrap();
        room.submit_move(Symbol::O, 1, 1, t0 + Duration::from_secs(8)).unwrap();

        let view = room.snapshot().time_control.unwrap();
        assert_eq!(view.per_move_secs, 60);
        assert_eq!(view.remaining.x, 55.0);
        assert_eq!(view.remaining.o, 57.0);
    }

    #[tokio::test]
    async fn test_expire_before_deadline_does_nothing() {
        let t0 = Instant::now();
        let mut room = full_room(GameMode::Blitz, t0);
        assert!(room.expire(t0 + Duration::from_secs(9)).is_none());
        assert_eq!(room.phase(), Phase::InProgress);
    }

    #[tokio::test]
    async fn test_expire_at_deadline_forfeits_running_player() {
        let t0 = Instant::now();
        let mut room = full_room(GameMode::Blitz, t0);
        room.submit_move(Symbol::X, 0, 0, t0 + Duration::from_secs(2)).unwrap();

        let deadline = room.clock_deadline().unwrap();
        assert_eq!(deadline, t0 + Duration::from_secs(12));
        let effects = room.expire(deadline).unwrap();

        assert_eq!(
            snapshot_of(&effects).outcome,
            Some(Outcome::Win {
                winner: Symbol::X,
                line: None
            })
        );
        assert_eq!(
            effects.result,
            Some(GameResult::Decisive {
                winner: "Ada".into(),
                loser: "Bob".into()
            })
        );
        assert!(room.expire(deadline).is_none());
    }

    #[tokio::test]
    async fn test_clock_pauses_while_seat_empty() {
        let t0 = Instant::now();
        let mut room = full_room(GameMode::Blitz, t0);
        room.leave(cid(2), t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(room.clock_deadline(), None);

        let back = t0 + Duration::from_secs(100);
        room.join(Member::new(cid(5), "Cy"), Some(Role::O), back).unwrap();

        assert_eq!(room.clock_deadline(), Some(back + Duration::from_secs(9)));
    }

    #[tokio::test]
    async fn test_leave_after_deadline_forfeits_running_player() {
        let t0 = Instant::now();
        let mut room = full_room(GameMode::Blitz, t0);

        // X's clock ran out before O walked away.
        let effects = room.leave(cid(2), t0 + Duration::from_secs(11)).unwrap();

        assert_eq!(
            effects.result,
            Some(GameResult::Decisive {
                winner: "Bob".into(),
                loser: "Ada".into()
            })
        );
        let snap = snapshot_of(&effects);
        assert_eq!(
            snap.outcome,
            Some(Outcome::Win {
                winner: Symbol::O,
                line: None
            })
        );
        assert_eq!(snap.scores, Scores { x: 0, o: 1 });
        assert_eq!(room.phase(), Phase::Finished);
        assert_eq!(room.clock_deadline(), None);

        let later = t0 + Duration::from_secs(30);
        let (_, effects) = room
            .join(Member::new(cid(5), "Cy"), Some(Role::O), later)
            .unwrap();
        assert!(effects.result.is_none());
        assert!(room.expire(later).is_none());
        assert_eq!(room.snapshot().scores, Scores { x: 0, o: 1 });
    }

    #[tokio::test]
    async fn test_leave_before_deadline_keeps_game_open() {
        let t0 = Instant::now();
        let mut room = full_room(GameMode::Blitz, t0);
        let effects = room.leave(cid(2), t0 + Duration::from_secs(9)).unwrap();
        assert!(effects.result.is_none());
        assert_eq!(snapshot_of(&effects).outcome, None);
    }

    #[tokio::test]
    async fn test_standard_mode_has_no_clock() {
        let now = Instant::now();
        let room = full_room(GameMode::Standard, now);
        assert_eq!(room.clock_deadline(), None);
        assert!(room.snapshot().time_control.is_none());
    }

    // =====================================================================
    // Reset
    // =====================================================================

    #[tokio::test]
    async fn test_reset_requires_finished_game() {
        let now = Instant::now();
        let mut room = full_room(GameMode::Standard, now);
        assert_eq!(room.reset(now).unwrap_err(), RoomError::GameNotOver);
    }

    #[tokio::test]
    async fn test_reset_clears_board_and_keeps_scores() {
        let now = Instant::now();
        let mut room = full_room(GameMode::Blitz, now);
        for (symbol, row, col) in [
            (Symbol::X, 0, 0),
            (Symbol::O, 1, 0),
            (Symbol::X, 0, 1),
            (Symbol::O, 1, 1),
            (Symbol::X, 0, 2),
        ] {
            room.submit_move(symbol, row, col, now).unwrap();
        }
        room.post_chat(cid(2), "gg").unwrap();

        let effects = room.reset(now).unwrap();

        let snap = snapshot_of(&effects);
        assert!(snap.grid.is_empty());
        assert_eq!(snap.outcome, None);
        assert_eq!(snap.turn, Some(Symbol::X));
        assert!(snap.history.is_empty());
        assert_eq!(snap.scores, Scores { x: 1, o: 0 });
        assert_eq!(snap.phase, Phase::InProgress);
        assert_eq!(snap.time_control.map(|t| t.remaining.x), Some(10.0));
        assert!(matches!(
            &effects.messages[1].1,
            ServerEvent::ChatMessage(e) if e.message == "Game has been reset!"
        ));
        assert_eq!(room.chat.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_with_empty_seat_waits() {
        let now = Instant::now();
        let mut room = full_room(GameMode::Blitz, now);
        let deadline = room.clock_deadline().unwrap();
        room.expire(deadline).unwrap();
        room.leave(cid(2), deadline).unwrap();

        room.reset(deadline).unwrap();

        assert_eq!(room.phase(), Phase::WaitingForPlayers);
        assert_eq!(room.clock_deadline(), None);
    }

    // =====================================================================
    // Chat
    // =====================================================================

    #[test]
    fn test_chat_trims_and_tags_sender() {
        let mut room = room(GameMode::Standard);

        let effects = room.post_chat(cid(1), "  hi there  ").unwrap();

        match &effects.messages[0] {
            (Recipient::All, ServerEvent::ChatMessage(entry)) => {
                assert_eq!(entry.message, "hi there");
                assert_eq!(entry.sender, ChatSender::X);
                assert_eq!(entry.player_name, "Ada");
            }
            other => panic!("expected a chat broadcast, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_chat_is_dropped() {
        let mut room = room(GameMode::Standard);
        assert_eq!(
            room.post_chat(cid(1), " \t ").unwrap_err(),
            RoomError::EmptyMessage
        );
        assert!(room.chat.is_empty());
    }

    #[test]
    fn test_chat_log_is_capped() {
        let mut room = room(GameMode::Standard);
        for i in 0..250 {
            room.post_chat(cid(1), &format!("m{i}")).unwrap();
        }
        assert_eq!(room.chat.len(), 100);
        assert_eq!(room.chat.recent(1).next().unwrap().message, "m249");
    }
}
