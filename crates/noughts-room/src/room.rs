//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task and is reached only through its
//! mailbox. Commands are processed one at a time to completion, so every
//! check-then-act sequence in [`Room`] runs without interleaving, and
//! events leave in the order the room produced them.
//!
//! Besides commands the actor waits on two timers: the running player's
//! clock deadline, and the abandon deadline armed when both seats empty.

use std::collections::HashMap;
use std::sync::Weak;

use noughts_protocol::{Role, RoomCode, ServerEvent, Snapshot, Symbol};
use noughts_session::{ConnectionId, Outbox};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;

use crate::clock;
use crate::state::{Effects, GameResult, Member, Recipient, Room};
use crate::{RoomConfig, RoomError};

/// The registry's room table, as seen from a room that may outlive it.
pub(crate) type RoomTable = Weak<Mutex<HashMap<RoomCode, RoomHandle>>>;

/// Sink for finished games.
pub type ResultSender = mpsc::UnboundedSender<GameResult>;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor through its mailbox.
///
/// Every variant carries a reply channel so the caller learns whether
/// the command was applied. The events it produced go straight to the
/// members' outboxes.
pub(crate) enum RoomCommand {
    Join {
        member: Member,
        role: Option<Role>,
        outbox: Outbox,
        reply: Reply<Role>,
    },
    Leave {
        connection_id: ConnectionId,
        reply: Reply<()>,
    },
    Move {
        connection_id: ConnectionId,
        row: i64,
        col: i64,
        reply: Reply<()>,
    },
    Reset {
        connection_id: ConnectionId,
        reply: Reply<()>,
    },
    Chat {
        connection_id: ConnectionId,
        message: String,
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<Snapshot>,
    },
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone; it wraps an `mpsc::Sender`. Once the actor has gone
/// every method returns [`RoomError::Unavailable`].
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Adds a member. Events for the room start flowing into `outbox`
    /// immediately, beginning with the join announcement.
    pub async fn join(
        &self,
        member: Member,
        role: Option<Role>,
        outbox: Outbox,
    ) -> Result<Role, RoomError> {
        self.request(|reply| RoomCommand::Join {
            member,
            role,
            outbox,
            reply,
        })
        .await
    }

    pub async fn leave(&self, connection_id: ConnectionId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave {
            connection_id,
            reply,
        })
        .await
    }

    /// Plays for whichever seat `connection_id` holds.
    pub async fn submit_move(
        &self,
        connection_id: ConnectionId,
        row: i64,
        col: i64,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Move {
            connection_id,
            row,
            col,
            reply,
        })
        .await
    }

    pub async fn reset(&self, connection_id: ConnectionId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Reset {
            connection_id,
            reply,
        })
        .await
    }

    pub async fn chat(
        &self,
        connection_id: ConnectionId,
        message: String,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Chat {
            connection_id,
            message,
            reply,
        })
        .await
    }

    /// The current full state. Nothing is broadcast.
    pub async fn snapshot(&self) -> Result<Snapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Tells the room to close. Remaining members get `room_closed`.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room: Room,
    config: RoomConfig,
    /// Per-member outbound channels.
    outboxes: HashMap<ConnectionId, Outbox>,
    /// When the room is destroyed unless someone takes a seat first.
    abandon_at: Option<Instant>,
    table: RoomTable,
    results: Option<ResultSender>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until shutdown or abandonment.
    async fn run(mut self) {
        let room_id = self.room.code().clone();
        tracing::info!(%room_id, "room actor started");

        loop {
            tokio::select! {
                biased;

                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        self.close("shut down").await;
                        break;
                    }
                }

                _ = clock::sleep_until(self.room.clock_deadline()) => {
                    if let Some(effects) = self.room.expire(Instant::now()) {
                        self.dispatch(effects);
                    }
                }

                _ = clock::sleep_until(self.abandon_at) => {
                    self.abandon_at = None;
                    // A seat may have been taken while the timer was pending.
                    if self.room.is_abandoned() {
                        self.close("abandoned").await;
                        break;
                    }
                }
            }
        }

        tracing::info!(%room_id, "room actor stopped");
    }

    /// Applies one command. Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        let now = Instant::now();
        match cmd {
            RoomCommand::Join {
                member,
                role,
                outbox,
                reply,
            } => {
                let connection_id = member.connection_id;
                let name = member.name.clone();
                let result = match self.room.join(member, role, now) {
                    Ok((role, effects)) => {
                        self.outboxes.insert(connection_id, outbox);
                        tracing::info!(
                            room_id = %self.room.code(),
                            %connection_id,
                            %role,
                            player_name = %name,
                            "member joined"
                        );
                        self.dispatch(effects);
                        if !self.room.is_abandoned() {
                            self.abandon_at = None;
                        }
                        Ok(role)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                connection_id,
                reply,
            } => {
                let result = match self.room.leave(connection_id, now) {
                    Ok(effects) => {
                        self.outboxes.remove(&connection_id);
                        tracing::info!(room_id = %self.room.code(), %connection_id, "member left");
                        self.dispatch(effects);
                        if self.room.is_abandoned() && self.abandon_at.is_none() {
                            tracing::info!(
                                room_id = %self.room.code(),
                                grace_secs = self.config.abandon_grace.as_secs(),
                                "both seats empty, scheduling close"
                            );
                            self.abandon_at = Some(now + self.config.abandon_grace);
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Move {
                connection_id,
                row,
                col,
                reply,
            } => {
                let result = self
                    .seat_symbol(connection_id)
                    .and_then(|symbol| self.room.submit_move(symbol, row, col, now))
                    .map(|effects| self.dispatch(effects));
                let _ = reply.send(result);
            }
            RoomCommand::Reset {
                connection_id,
                reply,
            } => {
                let result = self
                    .require_member(connection_id)
                    .and_then(|()| self.room.reset(now))
                    .map(|effects| self.dispatch(effects));
                let _ = reply.send(result);
            }
            RoomCommand::Chat {
                connection_id,
                message,
                reply,
            } => {
                let result = self
                    .room
                    .post_chat(connection_id, &message)
                    .map(|effects| self.dispatch(effects));
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.room.snapshot()));
            }
            RoomCommand::Shutdown => return false,
        }
        true
    }

    fn seat_symbol(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Symbol, RoomError> {
        match self.room.role_of(connection_id) {
            Some(role) => role.symbol().ok_or(RoomError::NotAPlayer),
            None => Err(RoomError::NotInRoom(self.room.code().clone())),
        }
    }

    fn require_member(&self, connection_id: ConnectionId) -> Result<(), RoomError> {
        match self.room.role_of(connection_id) {
            Some(_) => Ok(()),
            None => Err(RoomError::NotInRoom(self.room.code().clone())),
        }
    }

    /// Delivers events to their recipients in order, then reports any
    /// finished game.
    fn dispatch(&self, effects: Effects) {
        for (recipient, event) in effects.messages {
            match recipient {
                Recipient::All => {
                    tracing::trace!(
                        room_id = %self.room.code(),
                        members = self.outboxes.len(),
                        "broadcast"
                    );
                    for connection_id in self.outboxes.keys() {
                        self.send_to(*connection_id, event.clone());
                    }
                }
                Recipient::Only(connection_id) => self.send_to(connection_id, event),
            }
        }

        if let (Some(result), Some(results)) = (effects.result, &self.results) {
            if results.send(result).is_err() {
                tracing::warn!(room_id = %self.room.code(), "stats collector is gone");
            }
        }
    }

    /// Sends an event to a single member. Silently drops if the receiver
    /// is gone; that connection's own leave is on its way.
    fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        if let Some(outbox) = self.outboxes.get(&connection_id) {
            let _ = outbox.send(event);
        }
    }

    /// Removes the room from the registry and tells whoever is left.
    async fn close(&mut self, reason: &str) {
        let room_id = self.room.code().clone();
        match self.table.upgrade() {
            Some(table) => {
                table.lock().await.remove(&room_id);
            }
            None => tracing::warn!(%room_id, "registry already gone"),
        }

        for outbox in self.outboxes.values() {
            let _ = outbox.send(ServerEvent::RoomClosed {
                room_id: room_id.clone(),
            });
        }
        self.outboxes.clear();
        tracing::info!(%room_id, reason, "room destroyed");
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// The creator is seated as `X` and receives the initial snapshot.
pub(crate) fn spawn_room(
    room: Room,
    creator_outbox: Outbox,
    config: RoomConfig,
    table: RoomTable,
    results: Option<ResultSender>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);
    let code = room.code().clone();

    let mut outboxes = HashMap::new();
    if let Some(creator) = room.members().next() {
        outboxes.insert(creator.connection_id, creator_outbox);
    }

    let actor = RoomActor {
        room,
        config,
        outboxes,
        abandon_at: None,
        table,
        results,
        receiver: rx,
    };

    // Queued before the handle exists, so it precedes anything the
    // creator is told about the room.
    actor.dispatch(Effects {
        messages: vec![(
            Recipient::All,
            ServerEvent::StateSnapshot(actor.room.snapshot()),
        )],
        result: None,
    });

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
