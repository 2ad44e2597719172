//! Error types for the lobby layer.

use dicebet_protocol::{LobbyCode, PlayerId};
use dicebet_transport::ConnectionId;

/// Why a bet was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BetRejection {
    /// No round is in its betting window.
    #[error("round is not accepting bets")]
    RoundNotActive,

    /// The amount was zero, negative, or not an integer.
    #[error("amount must be a positive integer")]
    NonPositiveAmount,

    /// The player cannot cover the amount.
    #[error("balance {balance} cannot cover {amount}")]
    InsufficientBalance { balance: u64, amount: u64 },

    /// The player already bet this round.
    #[error("player already bet this round")]
    AlreadyBet,

    /// The sender is not a member of the lobby.
    #[error("player is not in this lobby")]
    UnknownPlayer,
}

/// Errors that can occur during lobby operations.
///
/// Only [`InvalidName`](Self::InvalidName) and
/// [`LobbyNotFound`](Self::LobbyNotFound) are ever shown to a client; their
/// `Display` text is the message the client receives. Everything else is
/// logged and dropped (see [`LobbyError::is_client_visible`]).
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The player name was blank after trimming.
    #[error("Name cannot be blank.")]
    InvalidName,

    /// No live lobby has this code.
    #[error("Lobby not found.")]
    LobbyNotFound(LobbyCode),

    /// A bet was refused.
    #[error("invalid bet: {0}")]
    InvalidBet(#[from] BetRejection),

    /// `startGame` while a round is already running.
    #[error("lobby {0} already has an active round")]
    RoundAlreadyActive(LobbyCode),

    /// A countdown tick arrived for a round that is no longer current.
    #[error("stale tick for round {got}, current round is {current}")]
    StaleRound { current: u64, got: u64 },

    /// The connection is not a member of any lobby.
    #[error("connection {0} is not in a lobby")]
    NotInLobby(ConnectionId),

    /// The player id is already taken in this lobby.
    #[error("player {0} already in lobby {1}")]
    AlreadyInLobby(PlayerId, LobbyCode),

    /// Every generated code collided with a live lobby.
    #[error("no free lobby code after {attempts} attempts")]
    CodesExhausted { attempts: usize },

    /// The lobby's command channel is closed (it is shutting down).
    #[error("lobby {0} is unavailable")]
    Unavailable(LobbyCode),
}

impl LobbyError {
    /// Returns `true` for errors reported back to the client as `lobbyError`.
    pub fn is_client_visible(&self) -> bool {
        matches!(self, Self::InvalidName | Self::LobbyNotFound(_))
    }
}
