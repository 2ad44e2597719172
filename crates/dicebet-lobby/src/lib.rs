//! Lobbies and betting rounds for Dicebet.
//!
//! Each lobby runs as an isolated Tokio task (actor model) that owns its
//! players and its one round. A countdown task per running round feeds
//! it ticks, and every change is pushed to members as a full snapshot.
//!
//! # Key types
//!
//! - [`LobbyRegistry`]: creates/destroys lobbies, routes connections
//! - [`LobbyHandle`]: send commands to a running lobby actor
//! - [`Lobby`]: the synchronous state an actor owns
//! - [`GameRound`] / [`RoundPhase`]: the betting round state machine
//! - [`resolve_round`]: rolls dice and splits the pot
//! - [`RandomSource`]: where dice and codes come from (injectable for tests)

mod actor;
mod config;
mod error;
mod lobby;
mod player;
mod random;
mod registry;
mod resolver;
mod round;
mod scheduler;

pub use actor::{LobbyHandle, PlayerSender, TickOutcome};
pub use config::LobbyConfig;
pub use error::{BetRejection, LobbyError};
pub use lobby::{Lobby, Settlement};
pub use player::{Player, normalize_name};
pub use random::{RandomFactory, RandomSource, ScriptedRandom, SeededRandom, ThreadRandom};
pub use registry::LobbyRegistry;
pub use resolver::{Resolution, resolve_round};
pub use round::{GameRound, RoundPhase};
pub use scheduler::{RoundScheduler, SchedulerExit};
