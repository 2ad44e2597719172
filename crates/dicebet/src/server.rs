//! `DicebetServer` builder and accept loop.
//!
//! This is the entry point for running a Dicebet server. It ties together
//! all the layers: transport → protocol → lobby registry.

use std::sync::Arc;

use dicebet_lobby::{LobbyConfig, LobbyRegistry, RandomFactory};
use dicebet_protocol::JsonCodec;
use dicebet_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::DicebetError;
use crate::handler::handle_connection;

/// Address the server binds to unless told otherwise.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState {
    pub(crate) registry: Mutex<LobbyRegistry>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Dicebet server.
///
/// # Example
///
/// ```rust,ignore
/// use dicebet::prelude::*;
///
/// let server = DicebetServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct DicebetServerBuilder {
    bind_addr: String,
    lobby_config: LobbyConfig,
    random: Option<RandomFactory>,
}

impl DicebetServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            lobby_config: LobbyConfig::default(),
            random: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the rules every lobby is created with.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// Replaces the thread-local RNG used for lobby codes and dice.
    pub fn random_source(mut self, factory: RandomFactory) -> Self {
        self.random = Some(factory);
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<DicebetServer, DicebetError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let registry = match self.random {
            Some(factory) => LobbyRegistry::with_random(self.lobby_config, factory),
            None => LobbyRegistry::new(self.lobby_config),
        };

        let state = Arc::new(ServerState {
            registry: Mutex::new(registry),
            codec: JsonCodec,
        });

        Ok(DicebetServer { transport, state })
    }
}

impl Default for DicebetServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Dicebet server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DicebetServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl DicebetServer {
    /// Creates a new builder.
    pub fn builder() -> DicebetServerBuilder {
        DicebetServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated; a failed accept is logged and skipped.
    pub async fn run(mut self) -> Result<(), DicebetError> {
        match self.transport.local_addr() {
            Ok(addr) => tracing::info!(%addr, "dicebet server running"),
            Err(_) => tracing::info!("dicebet server running"),
        }

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
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
