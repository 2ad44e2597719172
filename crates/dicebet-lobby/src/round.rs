//! The betting round state machine.

use std::collections::BTreeMap;

use dicebet_protocol::{GameView, PlayerId};

// ---------------------------------------------------------------------------
// RoundPhase
// ---------------------------------------------------------------------------

/// The lifecycle of one round.
///
/// ```text
/// Idle → Betting → Resolving → Idle
/// ```
///
/// - **Idle**: no round running; `startGame` is accepted.
/// - **Betting**: the countdown is running and bets are accepted.
/// - **Resolving**: the countdown hit zero; dice are being rolled and the
///   pot paid out. Never observable from outside the lobby actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    Betting,
    Resolving,
}

impl RoundPhase {
    /// The phase that follows this one.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Betting,
            Self::Betting => Self::Resolving,
            Self::Resolving => Self::Idle,
        }
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == target
    }
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Betting => write!(f, "Betting"),
            Self::Resolving => write!(f, "Resolving"),
        }
    }
}

// ---------------------------------------------------------------------------
// GameRound
// ---------------------------------------------------------------------------

/// The current round of a lobby.
///
/// A lobby owns exactly one `GameRound` for its whole life; it is reused
/// from round to round. `generation` counts round starts so that a
/// countdown belonging to an earlier round can be recognized and dropped.
///
/// `bets` may hold ids of players who have since left: their stake stays
/// in the pot and they still roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRound {
    phase: RoundPhase,
    bets: BTreeMap<PlayerId, u64>,
    rolls: BTreeMap<PlayerId, u8>,
    remaining_seconds: u32,
    generation: u64,
}

impl Default for GameRound {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRound {
    /// An idle round with nothing in it.
    pub fn new() -> Self {
        Self {
            phase: RoundPhase::Idle,
            bets: BTreeMap::new(),
            rolls: BTreeMap::new(),
            remaining_seconds: 0,
            generation: 0,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// `true` while bets are accepted.
    pub fn is_active(&self) -> bool {
        self.phase == RoundPhase::Betting
    }

    pub fn bets(&self) -> &BTreeMap<PlayerId, u64> {
        &self.bets
    }

    pub fn rolls(&self) -> &BTreeMap<PlayerId, u8> {
        &self.rolls
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_bet(&self, player: PlayerId) -> bool {
        self.bets.contains_key(&player)
    }

    /// Sum of all bets this round.
    pub fn pot(&self) -> u64 {
        self.bets.values().sum()
    }

    /// Idle → Betting. Clears the previous round and returns the new
    /// generation, or `None` if a round is already running.
    pub(crate) fn start(&mut self, betting_seconds: u32) -> Option<u64> {
        if !self.phase.can_transition_to(RoundPhase::Betting) {
            return None;
        }
        self.bets.clear();
        self.rolls.clear();
        self.remaining_seconds = betting_seconds;
        self.generation += 1;
        self.phase = RoundPhase::Betting;
        Some(self.generation)
    }

    /// Records a bet that the lobby has already validated and debited.
    pub(crate) fn record_bet(&mut self, player: PlayerId, amount: u64) {
        debug_assert!(self.is_active() && !self.has_bet(player));
        self.bets.insert(player, amount);
    }

    /// One second passes. Returns the seconds left.
    pub(crate) fn count_down(&mut self) -> u32 {
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        self.remaining_seconds
    }

    /// Betting → Resolving. Returns `false` if not betting.
    pub(crate) fn begin_resolution(&mut self) -> bool {
        if !self.phase.can_transition_to(RoundPhase::Resolving) {
            return false;
        }
        self.phase = RoundPhase::Resolving;
        true
    }

    /// Resolving → Idle, keeping the rolls visible until the next start.
    pub(crate) fn finish(&mut self, rolls: BTreeMap<PlayerId, u8>) {
        debug_assert_eq!(self.phase, RoundPhase::Resolving);
        self.rolls = rolls;
        self.phase = RoundPhase::Idle;
    }

    /// The round part of a lobby snapshot.
    pub fn view(&self) -> GameView {
        GameView {
            active: self.is_active(),
            bets: self.bets.clone(),
            rolls: self.rolls.clone(),
            timer: self.remaining_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_phase_cycles() {
        assert_eq!(RoundPhase::Idle.next(), RoundPhase::Betting);
        assert_eq!(RoundPhase::Betting.next(), RoundPhase::Resolving);
        assert_eq!(RoundPhase::Resolving.next(), RoundPhase::Idle);
        assert!(!RoundPhase::Idle.can_transition_to(RoundPhase::Resolving));
        assert_eq!(RoundPhase::Betting.to_string(), "Betting");
    }

    #[test]
    fn test_new_round_is_idle_and_empty() {
        let round = GameRound::new();
        assert_eq!(round.phase(), RoundPhase::Idle);
        assert!(!round.is_active());
        assert!(round.bets().is_empty());
        assert!(round.rolls().is_empty());
        assert_eq!(round.remaining_seconds(), 0);
        assert_eq!(round.generation(), 0);
    }

    #[test]
    fn test_start_only_from_idle() {
        let mut round = GameRound::new();
        assert_eq!(round.start(15), Some(1));
        assert_eq!(round.remaining_seconds(), 15);
        assert!(round.is_active());

        // Second start is refused and does not reset the timer.
        round.count_down();
        assert_eq!(round.start(15), None);
        assert_eq!(round.remaining_seconds(), 14);
        assert_eq!(round.generation(), 1);
    }

    #[test]
    fn test_start_clears_previous_round() {
        let mut round = GameRound::new();
        round.start(1);
        round.record_bet(PlayerId(1), 50);
        round.count_down();
        assert!(round.begin_resolution());
        round.finish(BTreeMap::from([(PlayerId(1), 4)]));
        assert_eq!(round.rolls().len(), 1, "rolls stay visible while idle");

        assert_eq!(round.start(15), Some(2));
        assert!(round.bets().is_empty());
        assert!(round.rolls().is_empty());
    }

    #[test]
    fn test_count_down_saturates_at_zero() {
        let mut round = GameRound::new();
        round.start(1);
        assert_eq!(round.count_down(), 0);
        assert_eq!(round.count_down(), 0);
    }

    #[test]
    fn test_begin_resolution_requires_betting() {
        let mut round = GameRound::new();
        assert!(!round.begin_resolution());
        round.start(3);
        assert!(round.begin_resolution());
        assert!(!round.is_active());
        assert!(!round.begin_resolution());
    }

    #[test]
    fn test_view_reports_timer_and_pot() {
        let mut round = GameRound::new();
        round.start(15);
        round.record_bet(PlayerId(1), 200);
        round.record_bet(PlayerId(2), 300);
        assert_eq!(round.pot(), 500);

        let view = round.view();
        assert!(view.active);
        assert_eq!(view.timer, 15);
        assert_eq!(view.bets.get(&PlayerId(2)), Some(&300));
    }

    #[test]
    fn test_view_serializes_with_player_id_keys() {
        let mut round = GameRound::new();
        round.start(15);
        round.record_bet(PlayerId(7), 25);

        let json = serde_json::to_value(round.view()).unwrap();
        assert_eq!(json["bets"]["7"], 25);
        assert_eq!(json["timer"], 15);
    }
}
