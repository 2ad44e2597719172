//! Wire protocol for Dicebet.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`ClientCommand`], [`ServerEvent`], [`LobbySnapshot`]):
//!   the intents a client may send and the full-state broadcasts it gets
//!   back.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   turned into bytes and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing so.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (ClientCommand) → Lobby (state machine)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    BetAmount, ClientCommand, GameView, LobbyCode, LobbySnapshot, PlayerId,
    PlayerView, ServerEvent,
};
