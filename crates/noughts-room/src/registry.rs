//! Room registry: creates, looks up, and destroys rooms.

use std::collections::HashMap;
use std::sync::Arc;

use noughts_protocol::RoomCode;
use noughts_session::Outbox;
use rand::Rng;
use tokio::sync::Mutex;

use crate::room::{spawn_room, ResultSender};
use crate::state::{Member, Room};
use crate::{RoomConfig, RoomError, RoomHandle, RoomSettings};

/// Characters room codes are drawn from.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The process-wide table of live rooms.
///
/// Cheap to clone; clones share the same table. The table lock is held
/// only for map operations, never while talking to a room, so busy rooms
/// never block unrelated ones.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<Mutex<HashMap<RoomCode, RoomHandle>>>,
    config: RoomConfig,
    results: Option<ResultSender>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            config,
            results: None,
        }
    }

    /// Reports every finished game to `results`.
    pub fn with_results(mut self, results: ResultSender) -> Self {
        self.results = Some(results);
        self
    }

    /// Creates a room with `creator` in the `X` seat and returns its
    /// handle. The code is unique among live rooms.
    ///
    /// The creator's outbox receives the room's initial snapshot.
    pub async fn create(
        &self,
        settings: RoomSettings,
        creator: Member,
        outbox: Outbox,
    ) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;
        let code = loop {
            let code = generate_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        let room = Room::new(code.clone(), settings, &self.config, creator);
        let handle = spawn_room(
            room,
            outbox,
            self.config.clone(),
            Arc::downgrade(&self.rooms),
            self.results.clone(),
        );
        rooms.insert(code.clone(), handle.clone());
        tracing::info!(room_id = %code, rooms = rooms.len(), "room created");
        handle
    }

    /// Looks up a live room.
    ///
    /// # Errors
    /// Returns [`RoomError::NotFound`] if no room has this code.
    pub async fn get(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .lock()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Removes a room and shuts its actor down. Returns `false` if the
    /// room was already gone.
    pub async fn destroy(&self, code: &RoomCode) -> bool {
        let handle = self.rooms.lock().await.remove(code);
        match handle {
            Some(handle) => {
                let _ = handle.shutdown().await;
                tracing::info!(room_id = %code, "room removed from registry");
                true
            }
            None => false,
        }
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

fn generate_code() -> RoomCode {
    let mut rng = rand::rng();
    loop {
        let raw: String = (0..RoomCode::LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        if let Ok(code) = RoomCode::parse(&raw) {
            return code;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use noughts_session::{outbox, ConnectionId};

    use super::*;

    fn member(id: u64) -> Member {
        Member::new(ConnectionId::new(id), "Ada")
    }

    #[test]
    fn test_generated_codes_are_six_alphanumerics() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.as_str().len(), 6);
            assert!(code
                .as_str()
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_create_assigns_unique_codes() {
        let registry = RoomRegistry::new(RoomConfig::default());
        let mut codes = HashSet::new();
        for id in 0..50 {
            let handle = registry
                .create(RoomSettings::default(), member(id), outbox().0)
                .await;
            assert!(codes.insert(handle.code().clone()));
        }
        assert_eq!(registry.room_count().await, 50);
    }

    #[tokio::test]
    async fn test_get_unknown_room_is_not_found() {
        let registry = RoomRegistry::new(RoomConfig::default());
        let code = RoomCode::parse("NOPE00").unwrap();
        assert!(matches!(
            registry.get(&code).await,
            Err(RoomError::NotFound(c)) if c == code
        ));
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let registry = RoomRegistry::new(RoomConfig::default());
        let handle = registry
            .create(RoomSettings::default(), member(1), outbox().0)
            .await;
        let code = handle.code().clone();

        assert!(registry.destroy(&code).await);
        assert!(!registry.destroy(&code).await);
        assert!(registry.get(&code).await.is_err());
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_stale_handle_reports_unavailable() {
        let registry = RoomRegistry::new(RoomConfig::default());
        let handle = registry
            .create(RoomSettings::default(), member(1), outbox().0)
            .await;
        registry.destroy(handle.code()).await;

        let err = handle.snapshot().await.unwrap_err();

        assert!(matches!(err, RoomError::Unavailable(_)));
        assert_eq!(err.rejection(), Some(noughts_protocol::Rejection::RoomNotFound));
    }
}
