//! Core protocol types for Dicebet's wire format.
//!
//! Clients only ever send intents ([`ClientCommand`]); the server answers
//! with full-state snapshots ([`ServerEvent::UpdateLobbyState`]) or, for
//! failed create/join attempts, a [`ServerEvent::LobbyError`].

use std::collections::BTreeMap;
use std::fmt;

use dicebet_transport::ConnectionId;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's identity inside a lobby.
///
/// Players have no accounts: the id is the connection id the transport
/// assigned, so it is unique within a lobby for as long as the socket
/// lives. `Ord` gives bets and rolls a stable iteration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl From<ConnectionId> for PlayerId {
    fn from(conn: ConnectionId) -> Self {
        Self(conn.into_inner())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The short code a lobby is addressed by (also its broadcast topic).
///
/// Codes are stored upper-case. Client-supplied codes go through
/// [`LobbyCode::normalize`] before lookup, so `"ab12"` finds `"AB12"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyCode(String);

impl LobbyCode {
    /// Wraps an already-canonical code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Canonicalizes a code typed by a user.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.to_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LobbyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// BetAmount: lenient integer parsing
// ---------------------------------------------------------------------------

/// The amount field of a `placeBet` command.
///
/// Web clients send whatever is in the input box, so the amount is parsed
/// leniently: JSON integers are taken as is, floats are truncated toward
/// zero, and strings contribute their leading integer (`" 150abc"` is
/// 150). Anything unparseable becomes an invalid amount instead of a
/// decode error, so the bet is rejected by the round like any other
/// non-positive amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetAmount(Option<i64>);

impl BetAmount {
    /// A well-formed integer amount (which may still be non-positive).
    pub fn new(amount: i64) -> Self {
        Self(Some(amount))
    }

    /// An amount that did not parse as an integer.
    pub fn invalid() -> Self {
        Self(None)
    }

    /// Returns the parsed integer, if there was one.
    pub fn value(self) -> Option<i64> {
        self.0
    }

    /// Parses the leading integer of `text`, the way a form field is read.
    pub fn parse_leading(text: &str) -> Self {
        let trimmed = text.trim_start();
        let sign_len = usize::from(trimmed.starts_with(['+', '-']));
        let digits = trimmed[sign_len..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits == 0 {
            return Self::invalid();
        }
        Self(trimmed[..sign_len + digits].parse().ok())
    }
}

impl From<i64> for BetAmount {
    fn from(amount: i64) -> Self {
        Self::new(amount)
    }
}

impl Serialize for BetAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(amount) => serializer.serialize_i64(amount),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for BetAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(BetAmountVisitor)
    }
}

struct BetAmountVisitor;

impl<'de> Visitor<'de> for BetAmountVisitor {
    type Value = BetAmount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer, a number, or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<BetAmount, E> {
        Ok(BetAmount::new(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<BetAmount, E> {
        Ok(i64::try_from(v).map_or_else(|_| BetAmount::invalid(), BetAmount::new))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<BetAmount, E> {
        if !v.is_finite() || v.abs() >= i64::MAX as f64 {
            return Ok(BetAmount::invalid());
        }
        Ok(BetAmount::new(v.trunc() as i64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<BetAmount, E> {
        Ok(BetAmount::parse_leading(v))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<BetAmount, E> {
        Ok(BetAmount::invalid())
    }

    fn visit_unit<E: de::Error>(self) -> Result<BetAmount, E> {
        Ok(BetAmount::invalid())
    }

    fn visit_none<E: de::Error>(self) -> Result<BetAmount, E> {
        Ok(BetAmount::invalid())
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// An intent sent by a client.
///
/// Adjacently tagged with camelCase names:
/// `{ "type": "joinLobby", "data": { "lobbyCode": "AB12", "name": "Bo" } }`.
/// `startGame` carries no data: `{ "type": "startGame" }`.
///
/// None of the commands name a lobby except `joinLobby`; the server
/// resolves the sender's lobby from its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Open a new lobby with the sender as its only member.
    CreateLobby { name: String },

    /// Join an existing lobby by code.
    #[serde(rename_all = "camelCase")]
    JoinLobby { lobby_code: String, name: String },

    /// Start a betting round in the sender's lobby.
    StartGame,

    /// Bet on the current round.
    PlaceBet { amount: BetAmount },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// One player as shown to every member of the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub balance: u64,
}

/// The round part of a snapshot.
///
/// `rolls` is empty while betting and filled once the round resolves;
/// it stays visible until the next round starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub active: bool,
    pub bets: BTreeMap<PlayerId, u64>,
    pub rolls: BTreeMap<PlayerId, u8>,
    /// Seconds left in the betting window.
    pub timer: u32,
}

/// The full state of one lobby, pushed after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub code: LobbyCode,
    pub players: Vec<PlayerView>,
    pub game: GameView,
}

impl LobbySnapshot {
    /// Sum of all player balances. Bets in flight are not included.
    pub fn total_balance(&self) -> u64 {
        self.players.iter().map(|p| p.balance).sum()
    }

    /// Looks up a player by id.
    pub fn player(&self, id: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// An event pushed from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full lobby state; sent to every member after each state change.
    UpdateLobbyState(LobbySnapshot),

    /// A failed `createLobby`/`joinLobby`, sent only to the sender.
    LobbyError { message: String },
}

// =========================================================================
// Tests
// =========================================================================
