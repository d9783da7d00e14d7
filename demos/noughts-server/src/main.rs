//! Standalone Noughts server.
//!
//! ```text
//! NOUGHTS_BIND=0.0.0.0:8080 RUST_LOG=noughts=debug cargo run -p noughts-server
//! ```
//!
//! `NOUGHTS_IDLE_TIMEOUT_SECS=0` disables the idle timeout.

use std::time::Duration;

use noughts::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("NOUGHTS_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let idle_timeout = match std::env::var("NOUGHTS_IDLE_TIMEOUT_SECS") {
        Ok(raw) => parse_idle_timeout(&raw)?,
        Err(_) => ServerConfig::default().idle_timeout,
    };

    let server = NoughtsServer::builder()
        .bind(&bind)
        .idle_timeout(idle_timeout)
        .build()
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await?;
    Ok(())
}

fn parse_idle_timeout(raw: &str) -> Result<Option<Duration>, std::num::ParseIntError> {
    let secs: u64 = raw.trim().parse()?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
