//! Player records held by a lobby.

use dicebet_protocol::{PlayerId, PlayerView};

use crate::LobbyError;

/// One member of a lobby.
///
/// The balance only moves in two places: debited when a bet is placed,
/// credited when a round pays out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub balance: u64,
}

impl Player {
    /// Creates a player, trimming the name.
    ///
    /// # Errors
    /// [`LobbyError::InvalidName`] if the name is blank after trimming.
    pub fn new(id: PlayerId, name: &str, balance: u64) -> Result<Self, LobbyError> {
        Ok(Self {
            id,
            name: normalize_name(name)?,
            balance,
        })
    }

    /// The public view of this player inside a snapshot.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            balance: self.balance,
        }
    }
}

/// Trims a display name and rejects blank ones.
pub fn normalize_name(raw: &str) -> Result<String, LobbyError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(LobbyError::InvalidName);
    }
    Ok(name.to_owned())
}
