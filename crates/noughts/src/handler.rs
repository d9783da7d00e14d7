//! Per-connection handler: greeting, routing, and the outbound writer.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register the session → send `connected` → broadcast the gauge
//!   2. Loop: write queued events out, or decode and route an inbound one
//!   3. On exit the guard removes the session and leaves the bound room
//!
//! Everything addressed to a connection, from its own requests or from
//! a room, goes through one outbox, so the client sees events in the
//! order they were produced.

use std::sync::Arc;

use noughts_protocol::{
    ClientEvent, Codec, Envelope, Rejection, Role, RoomCode, ServerEvent,
    PROTOCOL_VERSION,
};
use noughts_room::{clock, Member, RoomError, RoomSettings};
use noughts_session::{outbox, Binding, ConnectionId, Outbox};
use noughts_transport::{Connection, WebSocketConnection};
use tokio::time::Instant;

use crate::server::ServerState;
use crate::NoughtsError;

/// Drop guard that tears a connection down when the handler exits.
///
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async cleanup.
struct ConnectionGuard<C: Codec> {
    connection_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(disconnect(state, connection_id));
    }
}

/// Removes the session, rebroadcasts the gauge, then synthesizes a
/// leave for the room the connection was bound to.
async fn disconnect<C: Codec>(state: Arc<ServerState<C>>, connection_id: ConnectionId) {
    let binding = {
        let mut sessions = state.sessions.lock().await;
        let binding = match sessions.disconnect(connection_id) {
            Ok(session) => session.binding,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "session already gone");
                None
            }
        };
        sessions.broadcast_count();
        binding
    };

    let Some(binding) = binding else { return };
    let result = match state.registry.get(&binding.room_id).await {
        Ok(room) => room.leave(connection_id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => tracing::info!(
            %connection_id,
            room_id = %binding.room_id,
            role = %binding.role,
            "left room on disconnect"
        ),
        Err(e) => tracing::debug!(%connection_id, error = %e, "no room to leave"),
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), NoughtsError> {
    let connection_id = conn.id();
    let (outbox, mut inbox) = outbox();

    // Register and greet under one lock so `connected` is queued before
    // any gauge update.
    {
        let mut sessions = state.sessions.lock().await;
        sessions.connect(connection_id, outbox.clone())?;
        reply(
            &outbox,
            ServerEvent::Connected {
                connection_id: connection_id.into_inner(),
                protocol_version: PROTOCOL_VERSION,
            },
        );
        sessions.broadcast_count();
    }
    let _guard = ConnectionGuard {
        connection_id,
        state: Arc::clone(&state),
    };

    let mut seq: u64 = 1;
    let start = Instant::now();
    let idle = state.config.idle_timeout;
    let mut idle_deadline = idle.map(|d| start + d);

    loop {
        tokio::select! {
            biased;

            Some(event) = inbox.recv() => {
                if let ServerEvent::RoomClosed { room_id } = &event {
                    state.sessions.lock().await.unbind_room(connection_id, room_id);
                }
                let envelope = Envelope::new(
                    next_seq(&mut seq),
                    start.elapsed().as_millis() as u64,
                    event,
                );
                let bytes = state.codec.encode(&envelope)?;
                conn.send(&bytes).await?;
            }

            frame = conn.recv() => match frame {
                Ok(Some(data)) => {
                    idle_deadline = idle.map(|d| Instant::now() + d);
                    route_frame(&state, connection_id, &outbox, &data, start).await;
                }
                Ok(None) => {
                    tracing::info!(%connection_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%connection_id, error = %e, "recv error");
                    break;
                }
            },

            _ = clock::sleep_until(idle_deadline) => {
                tracing::info!(%connection_id, "connection timed out");
                break;
            }
        }
    }

    let _ = conn.close().await;
    Ok(())
}

/// Decodes one inbound frame and routes it. Failures become a
/// `move_rejected` for this connection only.
async fn route_frame<C: Codec>(
    state: &ServerState<C>,
    connection_id: ConnectionId,
    outbox: &Outbox,
    data: &[u8],
    start: Instant,
) {
    let event = match state.codec.decode::<Envelope<ClientEvent>>(data) {
        Ok(envelope) => envelope.payload,
        Err(e) => {
            tracing::debug!(%connection_id, error = %e, "malformed frame");
            reject(outbox, connection_id, e.into());
            return;
        }
    };

    tracing::trace!(%connection_id, ?event, "routing");
    if let Err(e) = route(state, connection_id, outbox, event, start).await {
        reject(outbox, connection_id, e);
    }
}

async fn route<C: Codec>(
    state: &ServerState<C>,
    connection_id: ConnectionId,
    outbox: &Outbox,
    event: ClientEvent,
    start: Instant,
) -> Result<(), NoughtsError> {
    match event {
        ClientEvent::CreateRoom {
            player_name,
            mode,
            theme,
        } => {
            ensure_unbound(state, connection_id).await?;
            let player_name = display_name(&player_name, "Player X");
            let room = state
                .registry
                .create(
                    RoomSettings::new(mode, theme),
                    Member::new(connection_id, player_name.clone()),
                    outbox.clone(),
                )
                .await;
            let room_id = room.code().clone();
            state.sessions.lock().await.bind(
                connection_id,
                Binding {
                    room_id: room_id.clone(),
                    role: Role::X,
                    player_name: player_name.clone(),
                },
            )?;
            tracing::info!(%connection_id, %room_id, %player_name, ?mode, "room created by client");

            reply(outbox, ServerEvent::RoomCreated { room_id: room_id.clone() });
            reply(
                outbox,
                ServerEvent::RoomJoined {
                    room_id,
                    role: Role::X,
                    player_name,
                },
            );
        }

        ClientEvent::Join {
            room_id,
            role,
            player_name,
        } => {
            let room_id = room_code(&room_id)?;
            ensure_unbound(state, connection_id).await?;
            let room = state.registry.get(&room_id).await?;
            let player_name = display_name(&player_name, default_name(role));
            let role = room
                .join(
                    Member::new(connection_id, player_name.clone()),
                    role,
                    outbox.clone(),
                )
                .await?;
            state.sessions.lock().await.bind(
                connection_id,
                Binding {
                    room_id: room_id.clone(),
                    role,
                    player_name: player_name.clone(),
                },
            )?;

            reply(
                outbox,
                ServerEvent::RoomJoined {
                    room_id,
                    role,
                    player_name,
                },
            );
        }

        ClientEvent::Leave { room_id, .. } => {
            let room_id = room_code(&room_id)?;
            require_binding(state, connection_id, &room_id).await?;
            state.sessions.lock().await.unbind(connection_id)?;
            let result = match state.registry.get(&room_id).await {
                Ok(room) => room.leave(connection_id).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) | Err(RoomError::NotFound(_) | RoomError::Unavailable(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        ClientEvent::Move {
            room_id, row, col, ..
        } => {
            let room_id = room_code(&room_id)?;
            require_binding(state, connection_id, &room_id).await?;
            let result = match state.registry.get(&room_id).await {
                Ok(room) => room.submit_move(connection_id, row, col).await,
                Err(e) => Err(e),
            };
            settle(state, connection_id, &room_id, result).await?;
        }

        ClientEvent::Reset { room_id } => {
            let room_id = room_code(&room_id)?;
            require_binding(state, connection_id, &room_id).await?;
            let result = match state.registry.get(&room_id).await {
                Ok(room) => room.reset(connection_id).await,
                Err(e) => Err(e),
            };
            settle(state, connection_id, &room_id, result).await?;
        }

        ClientEvent::Chat {
            room_id, message, ..
        } => {
            let room_id = room_code(&room_id)?;
            require_binding(state, connection_id, &room_id).await?;
            let result = match state.registry.get(&room_id).await {
                Ok(room) => room.chat(connection_id, message).await,
                Err(e) => Err(e),
            };
            settle(state, connection_id, &room_id, result).await?;
        }

        ClientEvent::RequestState { room_id } => {
            let room_id = room_code(&room_id)?;
            let snapshot = state.registry.get(&room_id).await?.snapshot().await?;
            reply(outbox, ServerEvent::StateSnapshot(snapshot));
        }

        ClientEvent::RequestStats { player_name } => {
            let player_name = player_name.trim().to_string();
            let record = state.stats.lock().await.get(&player_name);
            reply(outbox, ServerEvent::PlayerStats { player_name, record });
        }

        ClientEvent::Heartbeat { client_time } => {
            reply(
                outbox,
                ServerEvent::HeartbeatAck {
                    client_time,
                    server_time: start.elapsed().as_millis() as u64,
                },
            );
        }
    }
    Ok(())
}

/// Normalizes a client-supplied room code. A code that can't be parsed
/// names no room.
fn room_code(raw: &str) -> Result<RoomCode, RoomError> {
    RoomCode::parse(raw).map_err(|_| RoomError::UnknownCode(raw.to_string()))
}

/// Fails with `AlreadyInRoom` if the connection is bound somewhere.
async fn ensure_unbound<C: Codec>(
    state: &ServerState<C>,
    connection_id: ConnectionId,
) -> Result<(), RoomError> {
    match state.sessions.lock().await.binding(connection_id) {
        Some(binding) => Err(RoomError::AlreadyInRoom(binding.room_id.clone())),
        None => Ok(()),
    }
}

/// Room-scoped requests only act on the room the connection joined.
async fn require_binding<C: Codec>(
    state: &ServerState<C>,
    connection_id: ConnectionId,
    room_id: &RoomCode,
) -> Result<(), RoomError> {
    let bound = state
        .sessions
        .lock()
        .await
        .binding(connection_id)
        .is_some_and(|binding| &binding.room_id == room_id);
    if bound {
        Ok(())
    } else {
        Err(RoomError::NotInRoom(room_id.clone()))
    }
}

/// Drops a binding whose room has disappeared, then passes the result on.
async fn settle<C: Codec>(
    state: &ServerState<C>,
    connection_id: ConnectionId,
    room_id: &RoomCode,
    result: Result<(), RoomError>,
) -> Result<(), RoomError> {
    if let Err(RoomError::NotFound(_) | RoomError::Unavailable(_)) = &result {
        state.sessions.lock().await.unbind_room(connection_id, room_id);
    }
    result
}

/// Tells the requester why a request was refused.
fn reject(outbox: &Outbox, connection_id: ConnectionId, error: NoughtsError) {
    let (reason, message) = match &error {
        NoughtsError::Room(e) => match e.rejection() {
            Some(reason) => (reason, e.to_string()),
            None => {
                tracing::debug!(%connection_id, error = %e, "request ignored");
                return;
            }
        },
        NoughtsError::Protocol(e) => (Rejection::Malformed, e.to_string()),
        other => {
            tracing::warn!(%connection_id, error = %other, "request failed");
            return;
        }
    };
    tracing::debug!(%connection_id, ?reason, %message, "request rejected");
    reply(outbox, ServerEvent::MoveRejected { reason, message });
}

/// Queues an event for this connection's writer. The writer owns the
/// receiving end for as long as the handler runs.
fn reply(outbox: &Outbox, event: ServerEvent) {
    let _ = outbox.send(event);
}

/// The trimmed name, or `fallback` if nothing is left.
fn display_name(raw: &str, fallback: &str) -> String {
    match raw.trim() {
        "" => fallback.to_string(),
        name => name.to_string(),
    }
}

fn default_name(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::X) => "Player X",
        Some(Role::O) => "Player O",
        Some(Role::Spectator) => "Spectator",
        None => "Player",
    }
}

fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
