//! Lobby registry: creates lobbies, routes connections to them, and
//! destroys them when they empty.

use std::collections::HashMap;

use dicebet_protocol::{BetAmount, LobbyCode, LobbySnapshot, PlayerId};
use dicebet_transport::ConnectionId;

use crate::actor::spawn_lobby;
use crate::{
    Lobby, LobbyConfig, LobbyError, LobbyHandle, PlayerSender, RandomFactory, RandomSource,
    ThreadRandom, normalize_name,
};

/// Characters a lobby code is drawn from.
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// All live lobbies and which connection sits in which one.
///
/// This is the entry point for lobby operations from the connection
/// handlers. A connection is in at most one lobby at a time, and a lobby
/// is listed here exactly as long as it has members.
pub struct LobbyRegistry {
    /// Live lobbies, keyed by code.
    lobbies: HashMap<LobbyCode, LobbyHandle>,

    /// Current lobby of each connection.
    members: HashMap<ConnectionId, LobbyCode>,

    config: LobbyConfig,

    /// Draws lobby codes.
    codes: Box<dyn RandomSource>,

    /// Makes one dice source per new lobby.
    dice: RandomFactory,
}

impl LobbyRegistry {
    /// Creates an empty registry backed by the thread-local RNG.
    pub fn new(config: LobbyConfig) -> Self {
        Self::with_random(config, ThreadRandom::factory())
    }

    /// Creates an empty registry drawing codes and dice from `factory`.
    ///
    /// The first source the factory makes draws codes; each lobby then
    /// gets its own.
    pub fn with_random(config: LobbyConfig, factory: RandomFactory) -> Self {
        let codes = factory();
        Self::with_sources(config, codes, factory)
    }

    /// Creates an empty registry with separate code and dice sources.
    pub fn with_sources(
        config: LobbyConfig,
        codes: Box<dyn RandomSource>,
        dice: RandomFactory,
    ) -> Self {
        Self {
            lobbies: HashMap::new(),
            members: HashMap::new(),
            config: config.validated(),
            codes,
            dice,
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    /// Creates a lobby with `conn` as its only member and returns its code.
    ///
    /// A connection already in a lobby leaves it first. On error nothing
    /// changes.
    pub async fn create_lobby(
        &mut self,
        conn: ConnectionId,
        name: &str,
        sender: PlayerSender,
    ) -> Result<LobbyCode, LobbyError> {
        let name = normalize_name(name)?;
        let code = self.generate_code()?;
        let lobby = Lobby::new(code.clone(), PlayerId::from(conn), &name, self.config.clone())?;

        self.leave_current(conn).await;

        let handle = spawn_lobby(
            lobby,
            sender,
            (self.dice)(),
            self.config.tick.clone(),
            self.config.channel_size,
        );

        self.lobbies.insert(code.clone(), handle);
        self.members.insert(conn, code.clone());
        tracing::info!(%code, %conn, lobbies = self.lobbies.len(), "lobby created");
        Ok(code)
    }

    /// Adds `conn` to the lobby with code `raw_code` (case-insensitive).
    ///
    /// Joining the lobby the connection is already in changes nothing. A
    /// connection in a different lobby leaves it once the new lobby has
    /// accepted it. On error nothing changes.
    pub async fn join_lobby(
        &mut self,
        conn: ConnectionId,
        raw_code: &str,
        name: &str,
        sender: PlayerSender,
    ) -> Result<LobbyCode, LobbyError> {
        let name = normalize_name(name)?;
        let code = LobbyCode::normalize(raw_code);
        let handle = self
            .lobbies
            .get(&code)
            .cloned()
            .ok_or_else(|| LobbyError::LobbyNotFound(code.clone()))?;

        if self.members.get(&conn) == Some(&code) {
            tracing::debug!(%code, %conn, "already in this lobby");
            return Ok(code);
        }

        handle.join(PlayerId::from(conn), name, sender).await?;
        if let Some(previous) = self.members.insert(conn, code.clone()) {
            self.leave_lobby(conn, &previous).await;
        }
        Ok(code)
    }

    /// A handle to the lobby `conn` is in.
    ///
    /// Callers sharing the registry behind a lock take the handle and drop
    /// the guard before talking to the lobby.
    pub fn lobby_handle(&self, conn: ConnectionId) -> Result<LobbyHandle, LobbyError> {
        let code = self
            .members
            .get(&conn)
            .ok_or(LobbyError::NotInLobby(conn))?;
        self.lobbies
            .get(code)
            .cloned()
            .ok_or_else(|| LobbyError::LobbyNotFound(code.clone()))
    }

    /// Starts a round in the caller's lobby. Returns the round generation.
    pub async fn start_game(&self, conn: ConnectionId) -> Result<u64, LobbyError> {
        self.lobby_handle(conn)?.start_round().await
    }

    /// Places a bet in the caller's lobby. Returns the amount debited.
    pub async fn place_bet(
        &self,
        conn: ConnectionId,
        amount: BetAmount,
    ) -> Result<u64, LobbyError> {
        self.lobby_handle(conn)?
            .place_bet(PlayerId::from(conn), amount)
            .await
    }

    /// Removes `conn` from its lobby, destroying the lobby if it empties.
    /// Returns the code of the lobby it left, if any.
    pub async fn handle_disconnect(&mut self, conn: ConnectionId) -> Option<LobbyCode> {
        let left = self.leave_current(conn).await;
        tracing::debug!(%conn, lobby = ?left.as_ref().map(LobbyCode::as_str), "connection released");
        left
    }

    /// Current state of a lobby.
    pub async fn snapshot(&self, code: &LobbyCode) -> Result<LobbySnapshot, LobbyError> {
        self.lobbies
            .get(code)
            .ok_or_else(|| LobbyError::LobbyNotFound(code.clone()))?
            .snapshot()
            .await
    }

    /// The lobby `conn` is in.
    pub fn lobby_of(&self, conn: ConnectionId) -> Option<&LobbyCode> {
        self.members.get(&conn)
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    /// Codes of all live lobbies, sorted.
    pub fn lobby_codes(&self) -> Vec<LobbyCode> {
        let mut codes: Vec<_> = self.lobbies.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Takes `conn` out of its lobby. Tears the lobby down when it was
    /// the last member.
    async fn leave_current(&mut self, conn: ConnectionId) -> Option<LobbyCode> {
        let code = self.members.remove(&conn)?;
        self.leave_lobby(conn, &code).await;
        Some(code)
    }

    /// Removes `conn`'s player from lobby `code` without touching the
    /// membership index.
    async fn leave_lobby(&mut self, conn: ConnectionId, code: &LobbyCode) {
        let Some(handle) = self.lobbies.get(code) else {
            tracing::warn!(%code, %conn, "member of a lobby that is not registered");
            return;
        };

        let left = handle.leave(PlayerId::from(conn)).await;
        match left {
            Ok(0) | Err(LobbyError::Unavailable(_)) => {
                self.destroy(code).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%code, %conn, error = %e, "leave failed");
            }
        }
    }

    async fn destroy(&mut self, code: &LobbyCode) {
        if let Some(handle) = self.lobbies.remove(code) {
            // The actor stops by itself once empty; this covers the case
            // where it is still draining commands.
            let _ = handle.shutdown().await;
            self.members.retain(|_, c| c != code);
            tracing::info!(%code, lobbies = self.lobbies.len(), "lobby destroyed");
        }
    }

    /// Draws a code no live lobby uses.
    fn generate_code(&mut self) -> Result<LobbyCode, LobbyError> {
        let attempts = self.config.max_code_attempts;
        for attempt in 1..=attempts {
            let code: String = (0..self.config.code_length)
                .map(|_| {
                    let i = self.codes.below(CODE_ALPHABET.len() as u32) as usize;
                    char::from(CODE_ALPHABET[i])
                })
                .collect();
            let code = LobbyCode::new(code);
            if !self.lobbies.contains_key(&code) {
                return Ok(code);
            }
            tracing::debug!(%code, attempt, "lobby code collision");
        }
        tracing::warn!(attempts, lobbies = self.lobbies.len(), "no free lobby code");
        Err(LobbyError::CodesExhausted { attempts })
    }
}
