//! Dicebet server binary.
//!
//! Reads `BIND_HOST` (default `0.0.0.0`) and `PORT` (default `3000`),
//! then serves lobbies until the process is killed. Log verbosity comes
//! from `RUST_LOG`, defaulting to `info`.

use dicebet::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

/// Builds `host:port` from the two environment values, falling back to the
/// defaults for anything missing or unparsable.
fn bind_addr(host: Option<String>, port: Option<String>) -> String {
    let host = host
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = port
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    format!("{host}:{port}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let addr = bind_addr(std::env::var("BIND_HOST").ok(), std::env::var("PORT").ok());
    info!(%addr, "dicebet-server starting");

    let server = DicebetServer::builder().bind(&addr).build().await?;
    server.run().await?;
    Ok(())
}
