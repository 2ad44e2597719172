//! # Dicebet
//!
//! Real-time multi-lobby dice betting server.
//!
//! Players connect over WebSocket, create or join a lobby by its short
//! code, and bet chips on a shared 15-second round. When the clock runs
//! out every bettor rolls a die; the highest roll takes the pot, split
//! evenly on ties. The server is authoritative: clients send intents and
//! receive full lobby snapshots after every change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dicebet::prelude::*;
//!
//! # async fn start() -> Result<(), DicebetError> {
//! let server = DicebetServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::DicebetError;
pub use server::{DEFAULT_BIND_ADDR, DicebetServer, DicebetServerBuilder};

pub use dicebet_lobby as lobby;
pub use dicebet_protocol as protocol;
pub use dicebet_tick as tick;
pub use dicebet_transport as transport;

/// Everything needed to configure and run a server, or to talk to one.
pub mod prelude {
    pub use crate::{DicebetError, DicebetServer, DicebetServerBuilder};
    pub use dicebet_lobby::{
        LobbyConfig, RandomFactory, RandomSource, ScriptedRandom, SeededRandom, ThreadRandom,
    };
    pub use dicebet_protocol::{
        BetAmount, ClientCommand, GameView, LobbyCode, LobbySnapshot, PlayerId, PlayerView,
        ServerEvent,
    };
    pub use dicebet_tick::{TickConfig, TickPolicy};
}
