//! Lobby configuration.

use std::time::Duration;

use dicebet_tick::TickConfig;

/// Configuration shared by every lobby a registry creates.
///
/// The defaults are the game's fixed rules: 1000 starting chips, a
/// 15-second betting window, a six-sided die, 4-character codes. Tests
/// shorten or tweak them; production uses `LobbyConfig::default()`.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Balance a player receives on create/join.
    pub starting_balance: u64,

    /// Length of the betting window in ticks (seconds by default).
    pub betting_seconds: u32,

    /// Number of faces on the die. Rolls are uniform in `1..=dice_faces`.
    pub dice_faces: u8,

    /// Length of generated lobby codes.
    pub code_length: usize,

    /// How many codes to try before giving up on finding a free one.
    pub max_code_attempts: usize,

    /// Capacity of each lobby actor's command channel.
    pub channel_size: usize,

    /// Countdown cadence and overrun policy.
    pub tick: TickConfig,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1000,
            betting_seconds: 15,
            dice_faces: 6,
            code_length: 4,
            max_code_attempts: 64,
            channel_size: 64,
            tick: TickConfig::with_interval(Duration::from_secs(1)),
        }
    }
}

impl LobbyConfig {
    /// Clamp values that would make a lobby unusable.
    pub fn validated(mut self) -> Self {
        if self.betting_seconds == 0 {
            tracing::warn!("betting_seconds is 0, using 1");
            self.betting_seconds = 1;
        }
        if self.dice_faces == 0 {
            tracing::warn!("dice_faces is 0, using 1");
            self.dice_faces = 1;
        }
        self.code_length = self.code_length.max(1);
        self.max_code_attempts = self.max_code_attempts.max(1);
        self.channel_size = self.channel_size.max(1);
        self
    }
}
