//! Unified error type for the Dicebet server.

use dicebet_lobby::LobbyError;
use dicebet_protocol::ProtocolError;
use dicebet_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates `From` impls, so the
/// `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DicebetError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lobby-level error (not found, bad name, refused bet).
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}
