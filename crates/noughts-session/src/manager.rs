//! The session manager: tracks every live connection and its binding.
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself; it is a plain
//! `HashMap`. The server wraps it in a `tokio::sync::Mutex` and only
//! holds that lock for map operations, never across room commands.

use std::collections::HashMap;

use noughts_protocol::{RoomCode, ServerEvent};
use noughts_transport::ConnectionId;

use crate::{Binding, Outbox, Session, SessionError};

/// Registry of live connections.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ bind() ──→ unbind() ──→ disconnect()
///     │                                     ▲
///     └─────────────────────────────────────┘
/// ```
#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<ConnectionId, Session>,
}

impl SessionManager {
    /// Creates a new, empty session manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if the id is already
    /// registered.
    pub fn connect(
        &mut self,
        connection_id: ConnectionId,
        outbox: Outbox,
    ) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&connection_id) {
            return Err(SessionError::AlreadyConnected(connection_id));
        }

        let session = Session {
            connection_id,
            outbox,
            binding: None,
        };
        tracing::info!(%connection_id, total = self.sessions.len() + 1, "session created");
        Ok(self.sessions.entry(connection_id).or_insert(session))
    }

    /// Removes a connection and returns its last session record, so the
    /// caller can synthesize a leave from the binding.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no session exists.
    pub fn disconnect(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))?;
        tracing::info!(
            %connection_id,
            total = self.sessions.len(),
            bound = session.binding.is_some(),
            "session removed"
        );
        Ok(session)
    }

    /// Binds a connection to a room.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: unknown connection
    /// - [`SessionError::AlreadyBound`]: already in a room
    pub fn bind(
        &mut self,
        connection_id: ConnectionId,
        binding: Binding,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))?;
        if let Some(existing) = &session.binding {
            return Err(SessionError::AlreadyBound(
                connection_id,
                existing.room_id.clone(),
            ));
        }
        tracing::debug!(
            %connection_id,
            room_id = %binding.room_id,
            role = %binding.role,
            "connection bound"
        );
        session.binding = Some(binding);
        Ok(())
    }

    /// Clears a connection's binding and returns it.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: unknown connection
    /// - [`SessionError::NotBound`]: not in a room
    pub fn unbind(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<Binding, SessionError> {
        let session = self
            .sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))?;
        session
            .binding
            .take()
            .ok_or(SessionError::NotBound(connection_id))
    }

    /// Clears the binding only if it still points at `room_id`.
    ///
    /// Used when a room turns out to be gone; a connection that has
    /// meanwhile joined another room keeps that binding.
    pub fn unbind_room(
        &mut self,
        connection_id: ConnectionId,
        room_id: &RoomCode,
    ) -> Option<Binding> {
        let session = self.sessions.get_mut(&connection_id)?;
        if session.binding.as_ref().map(|b| &b.room_id) == Some(room_id) {
            session.binding.take()
        } else {
            None
        }
    }

    /// The connection's current binding, if any.
    pub fn binding(&self, connection_id: ConnectionId) -> Option<&Binding> {
        self.sessions.get(&connection_id)?.binding.as_ref()
    }

    /// Sends `event` to every live connection.
    ///
    /// Outboxes whose writer has already gone are skipped; their session
    /// is about to be removed by its own connection task.
    pub fn broadcast(&self, event: &ServerEvent) {
        for session in self.sessions.values() {
            if session.outbox.send(event.clone()).is_err() {
                tracing::trace!(
                    connection_id = %session.connection_id,
                    "outbox closed, skipping broadcast"
                );
            }
        }
    }

    /// Sends the current connection gauge to everyone.
    pub fn broadcast_count(&self) {
        self.broadcast(&ServerEvent::ConnectionCount {
            count: self.sessions.len(),
        });
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no connections.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
