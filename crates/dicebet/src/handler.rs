//! Per-connection handler: command dispatch and snapshot delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The task waits on two things at once: frames from the client, which are
//! decoded into [`ClientCommand`]s and dispatched to the registry, and
//! events from the connection's lobby, which are encoded and written out.
//! Every outbound frame goes through the same channel, so a client sees
//! events in the order they were produced.

use std::sync::Arc;

use dicebet_lobby::{LobbyError, LobbyHandle};
use dicebet_protocol::{ClientCommand, Codec, PlayerId, ServerEvent};
use dicebet_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::DicebetError;
use crate::server::ServerState;

/// Drop guard that takes the connection out of its lobby when the handler
/// exits, however it exits.
///
/// `Drop` is synchronous, so the async registry call runs on a
/// fire-and-forget task.
struct LobbyGuard {
    conn_id: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for LobbyGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut registry = state.registry.lock().await;
            registry.handle_disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), DicebetError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbound, mut events) = mpsc::unbounded_channel::<ServerEvent>();
    let _guard = LobbyGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    loop {
        tokio::select! {
            incoming = conn.recv() => {
                let data = match incoming {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };

                let command: ClientCommand = match state.codec.decode(&data) {
                    Ok(command) => command,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "ignoring undecodable frame");
                        continue;
                    }
                };

                dispatch(&state, conn_id, command, &outbound).await;
            }
            Some(event) = events.recv() => {
                let bytes = state.codec.encode(&event)?;
                conn.send(&bytes).await?;
            }
        }
    }

    // _guard drops here → the connection leaves its lobby.
    Ok(())
}

/// Applies one client command.
///
/// Name and lookup failures are reported to the client as `lobbyError`;
/// every other failure is only logged.
async fn dispatch(
    state: &ServerState,
    conn_id: ConnectionId,
    command: ClientCommand,
    outbound: &mpsc::UnboundedSender<ServerEvent>,
) {
    let result = match command {
        ClientCommand::CreateLobby { name } => {
            let mut registry = state.registry.lock().await;
            registry
                .create_lobby(conn_id, &name, outbound.clone())
                .await
                .map(|code| tracing::info!(%conn_id, %code, "created lobby"))
        }
        ClientCommand::JoinLobby { lobby_code, name } => {
            let mut registry = state.registry.lock().await;
            registry
                .join_lobby(conn_id, &lobby_code, &name, outbound.clone())
                .await
                .map(|code| tracing::info!(%conn_id, %code, "joined lobby"))
        }
        // The registry lock is released before the lobby is awaited.
        ClientCommand::StartGame => match lobby_handle(state, conn_id).await {
            Ok(handle) => handle.start_round().await.map(drop),
            Err(e) => Err(e),
        },
        ClientCommand::PlaceBet { amount } => match lobby_handle(state, conn_id).await {
            Ok(handle) => handle
                .place_bet(PlayerId::from(conn_id), amount)
                .await
                .map(drop),
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        report(conn_id, e, outbound);
    }
}

/// The handle of `conn_id`'s lobby. The registry lock is held only for the
/// lookup.
async fn lobby_handle(
    state: &ServerState,
    conn_id: ConnectionId,
) -> Result<LobbyHandle, LobbyError> {
    state.registry.lock().await.lobby_handle(conn_id)
}

fn report(conn_id: ConnectionId, error: LobbyError, outbound: &mpsc::UnboundedSender<ServerEvent>) {
    if error.is_client_visible() {
        tracing::debug!(%conn_id, error = %error, "sending lobby error");
        let _ = outbound.send(ServerEvent::LobbyError {
            message: error.to_string(),
        });
    } else {
        tracing::debug!(%conn_id, error = %error, "command ignored");
    }
}
