//! `NoughtsServer` builder and server loop.
//!
//! This is the entry point for running a Noughts server. It ties
//! together all the layers: transport → protocol → session → room.

use std::sync::Arc;
use std::time::Duration;

use noughts_protocol::{Codec, JsonCodec};
use noughts_room::{GameResult, RoomConfig, RoomRegistry};
use noughts_session::SessionManager;
use noughts_transport::{Handshake, Transport, WebSocketTransport};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use crate::handler::handle_connection;
use crate::stats::PlayerStats;
use crate::NoughtsError;

/// Server-wide settings. Missing fields take their defaults when
/// deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// Close a connection after this long without an inbound frame.
    /// `None` disables the check.
    pub idle_timeout: Option<Duration>,
    /// How long a new peer gets to complete the WebSocket upgrade.
    pub handshake_timeout: Duration,
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout: Some(Duration::from_secs(300)),
            handshake_timeout: Duration::from_secs(10),
            room: RoomConfig::default(),
        }
    }
}

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
/// Interior mutability via `Mutex` where needed. The room registry
/// has its own lock.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) registry: RoomRegistry,
    pub(crate) stats: Arc<Mutex<PlayerStats>>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Noughts server.
///
/// # Example
///
/// ```rust,ignore
/// use noughts::prelude::*;
///
/// let server = NoughtsServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct NoughtsServerBuilder {
    config: ServerConfig,
}

impl NoughtsServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the inbound idle timeout. `None` keeps connections open
    /// indefinitely.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets how long a new peer may take to complete the upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets the per-room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Binds the listener and starts the stats collector.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<NoughtsServer<JsonCodec>, NoughtsError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Like [`build`](Self::build) with a custom wire codec.
    pub async fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<NoughtsServer<C>, NoughtsError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(Mutex::new(PlayerStats::new()));
        tokio::spawn(collect_results(results_rx, Arc::clone(&stats)));

        let registry =
            RoomRegistry::new(self.config.room.clone()).with_results(results_tx);

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new()),
            registry,
            stats,
            codec,
            config: self.config,
        });

        Ok(NoughtsServer { transport, state })
    }
}

impl Default for NoughtsServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds every finished game into the stats table. Ends when the last
/// room holding a sender is gone.
async fn collect_results(
    mut results: mpsc::UnboundedReceiver<GameResult>,
    stats: Arc<Mutex<PlayerStats>>,
) {
    while let Some(result) = results.recv().await {
        tracing::debug!(?result, "recording game result");
        stats.lock().await.record(&result);
    }
}

/// A running Noughts server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct NoughtsServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl NoughtsServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> NoughtsServerBuilder {
        NoughtsServerBuilder::new()
    }
}

impl<C: Codec> NoughtsServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// The WebSocket upgrade runs inside that task, so a peer that never
    /// completes it cannot hold up anyone else. Runs until the process
    /// is terminated.
    pub async fn run(mut self) -> Result<(), NoughtsError> {
        tracing::info!(
            addr = %self.state.config.bind_addr,
            idle_timeout_secs = self.state.config.idle_timeout.map(|d| d.as_secs()),
            "Noughts server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let handshake = tokio::time::timeout(
                            state.config.handshake_timeout,
                            pending.complete(),
                        );
                        let conn = match handshake.await {
                            Ok(Ok(conn)) => conn,
                            Ok(Err(e)) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                                return;
                            }
                            Err(_) => {
                                tracing::debug!(%peer, "handshake timed out");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
