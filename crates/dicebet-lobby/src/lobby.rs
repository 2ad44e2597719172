//! A lobby: its players and its single round.
//!
//! `Lobby` is plain synchronous state. It is owned by exactly one lobby
//! actor, which serializes every mutation; nothing here knows about
//! channels, tasks, or time.

use dicebet_protocol::{BetAmount, LobbyCode, LobbySnapshot, PlayerId};

use crate::resolver::{Resolution, resolve_round};
use crate::{BetRejection, GameRound, LobbyConfig, LobbyError, Player, RandomSource};

/// What a finished round did to the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub resolution: Resolution,
    /// Shares owed to winners who left before the round resolved.
    pub unclaimed: u64,
}

impl Settlement {
    /// Chips that left circulation this round: the undivided remainder
    /// plus shares nobody was present to collect.
    pub fn lost(&self) -> u64 {
        self.resolution.remainder + self.unclaimed
    }
}

/// A group of players sharing one round.
#[derive(Debug, Clone)]
pub struct Lobby {
    code: LobbyCode,
    players: Vec<Player>,
    round: GameRound,
    config: LobbyConfig,
}

impl Lobby {
    /// Creates a lobby whose only member is its founder.
    ///
    /// # Errors
    /// [`LobbyError::InvalidName`] if the founder's name is blank.
    pub fn new(
        code: LobbyCode,
        founder: PlayerId,
        name: &str,
        config: LobbyConfig,
    ) -> Result<Self, LobbyError> {
        let founder = Player::new(founder, name, config.starting_balance)?;
        Ok(Self {
            code,
            players: vec![founder],
            round: GameRound::new(),
            config,
        })
    }

    pub fn code(&self) -> &LobbyCode {
        &self.code
    }

    /// Members in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn round(&self) -> &GameRound {
        &self.round
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Sum of member balances (chips staked in the current round excluded).
    pub fn total_balance(&self) -> u64 {
        self.players.iter().map(|p| p.balance).sum()
    }

    /// Appends a member with the starting balance.
    ///
    /// # Errors
    /// - [`LobbyError::InvalidName`] for a blank name
    /// - [`LobbyError::AlreadyInLobby`] if the id is already a member
    pub fn add_player(&mut self, id: PlayerId, name: &str) -> Result<(), LobbyError> {
        let player = Player::new(id, name, self.config.starting_balance)?;
        if self.player(id).is_some() {
            return Err(LobbyError::AlreadyInLobby(id, self.code.clone()));
        }
        self.players.push(player);
        Ok(())
    }

    /// Removes a member. Their bet, if any, stays in the round.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(index))
    }

    /// Idle → Betting. Returns the new round generation.
    ///
    /// # Errors
    /// [`LobbyError::RoundAlreadyActive`] unless the round is idle.
    pub fn start_round(&mut self) -> Result<u64, LobbyError> {
        self.round
            .start(self.config.betting_seconds)
            .ok_or_else(|| LobbyError::RoundAlreadyActive(self.code.clone()))
    }

    /// Places a bet for `id`, debiting their balance.
    ///
    /// # Errors
    /// [`LobbyError::InvalidBet`] when the round is not betting, the
    /// amount is not a positive integer, the player is unknown, already
    /// bet this round, or cannot cover the amount.
    pub fn place_bet(&mut self, id: PlayerId, amount: BetAmount) -> Result<u64, LobbyError> {
        if !self.round.is_active() {
            return Err(BetRejection::RoundNotActive.into());
        }
        let amount = amount
            .value()
            .filter(|&a| a > 0)
            .and_then(|a| u64::try_from(a).ok())
            .ok_or(BetRejection::NonPositiveAmount)?;
        if self.round.has_bet(id) {
            return Err(BetRejection::AlreadyBet.into());
        }
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(BetRejection::UnknownPlayer)?;
        if player.balance < amount {
            return Err(BetRejection::InsufficientBalance {
                balance: player.balance,
                amount,
            }
            .into());
        }

        player.balance -= amount;
        self.round.record_bet(id, amount);
        Ok(amount)
    }

    /// One countdown step for round `generation`. Returns seconds left.
    ///
    /// # Errors
    /// [`LobbyError::StaleRound`] if `generation` is not the running round.
    pub fn tick(&mut self, generation: u64) -> Result<u32, LobbyError> {
        let current = self.round.generation();
        if generation != current || !self.round.is_active() {
            return Err(LobbyError::StaleRound {
                current,
                got: generation,
            });
        }
        Ok(self.round.count_down())
    }

    /// Betting → Resolving → Idle: rolls, pays winners still present, and
    /// returns what happened. Returns `None` if no round was betting.
    pub fn settle(&mut self, rng: &mut dyn RandomSource) -> Option<Settlement> {
        if !self.round.begin_resolution() {
            return None;
        }

        let resolution = resolve_round(self.round.bets(), self.config.dice_faces, rng);
        let mut unclaimed = 0;
        for (winner, share) in resolution.payouts() {
            match self.players.iter_mut().find(|p| p.id == winner) {
                Some(player) => player.balance += share,
                None => {
                    tracing::warn!(
                        code = %self.code,
                        %winner,
                        share,
                        "winner left before payout, share forfeited"
                    );
                    unclaimed += share;
                }
            }
        }

        self.round.finish(resolution.rolls.clone());
        Some(Settlement {
            resolution,
            unclaimed,
        })
    }

    /// The full state pushed to every member.
    pub fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            code: self.code.clone(),
            players: self.players.iter().map(Player::view).collect(),
            game: self.round.view(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RoundPhase, ScriptedRandom};

    const A: PlayerId = PlayerId(1);
    const B: PlayerId = PlayerId(2);
    const C: PlayerId = PlayerId(3);

    fn lobby_with(players: &[PlayerId]) -> Lobby {
        let mut lobby =
            Lobby::new(LobbyCode::new("TEST"), players[0], "p1", LobbyConfig::default())
                .unwrap();
        for (i, &id) in players.iter().enumerate().skip(1) {
            lobby.add_player(id, &format!("p{}", i + 1)).unwrap();
        }
        lobby
    }

    fn balance(lobby: &Lobby, id: PlayerId) -> u64 {
        lobby.player(id).unwrap().balance
    }

    /// Counts the round down to zero.
    fn run_out_clock(lobby: &mut Lobby) {
        let generation = lobby.round().generation();
        while lobby.tick(generation).unwrap() > 0 {}
    }

    // =====================================================================
    // Membership
    // =====================================================================

    #[test]
    fn test_new_lobby_has_founder_with_starting_balance() {
        let lobby = lobby_with(&[A]);
        assert_eq!(lobby.players().len(), 1);
        assert_eq!(balance(&lobby, A), 1000);
        assert_eq!(lobby.round().phase(), RoundPhase::Idle);
    }

    #[test]
    fn test_new_lobby_rejects_blank_founder_name() {
        let result = Lobby::new(LobbyCode::new("X"), A, "  ", LobbyConfig::default());
        assert!(matches!(result, Err(LobbyError::InvalidName)));
    }

    #[test]
    fn test_add_player_keeps_join_order() {
        let lobby = lobby_with(&[C, A, B]);
        let ids: Vec<PlayerId> = lobby.players().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![C, A, B]);
    }

    #[test]
    fn test_add_player_rejects_duplicate_id() {
        let mut lobby = lobby_with(&[A]);
        assert!(matches!(
            lobby.add_player(A, "again"),
            Err(LobbyError::AlreadyInLobby(..))
        ));
    }

    #[test]
    fn test_remove_player_empties_lobby() {
        let mut lobby = lobby_with(&[A]);
        assert_eq!(lobby.remove_player(A).map(|p| p.id), Some(A));
        assert!(lobby.is_empty());
        assert!(lobby.remove_player(A).is_none());
    }

    // =====================================================================
    // start_round()
    // =====================================================================

    #[test]
    fn test_start_round_opens_betting_window() {
        let mut lobby = lobby_with(&[A]);
        assert_eq!(lobby.start_round().unwrap(), 1);

        let snapshot = lobby.snapshot();
        assert!(snapshot.game.active);
        assert_eq!(snapshot.game.timer, 15);
    }

    #[test]
    fn test_start_round_twice_is_rejected_without_reset() {
        let mut lobby = lobby_with(&[A]);
        let generation = lobby.start_round().unwrap();
        lobby.tick(generation).unwrap();

        assert!(matches!(
            lobby.start_round(),
            Err(LobbyError::RoundAlreadyActive(_))
        ));
        assert_eq!(lobby.round().remaining_seconds(), 14);
        assert_eq!(lobby.round().generation(), generation);
    }

    // =====================================================================
    // place_bet()
    // =====================================================================

    #[test]
    fn test_place_bet_debits_and_records() {
        let mut lobby = lobby_with(&[A]);
        lobby.start_round().unwrap();

        assert_eq!(lobby.place_bet(A, BetAmount::new(200)).unwrap(), 200);
        assert_eq!(balance(&lobby, A), 800);
        assert_eq!(lobby.round().bets().get(&A), Some(&200));
    }

    #[test]
    fn test_place_bet_whole_balance_allowed() {
        let mut lobby = lobby_with(&[A]);
        lobby.start_round().unwrap();
        lobby.place_bet(A, BetAmount::new(1000)).unwrap();
        assert_eq!(balance(&lobby, A), 0);
    }

    #[test]
    fn test_place_bet_rejections_leave_state_untouched() {
        let mut lobby = lobby_with(&[A, B]);

        let idle = lobby.place_bet(A, BetAmount::new(10));
        assert!(matches!(
            idle,
            Err(LobbyError::InvalidBet(BetRejection::RoundNotActive))
        ));

        lobby.start_round().unwrap();
        let before = lobby.snapshot();

        for amount in [BetAmount::new(0), BetAmount::new(-5), BetAmount::invalid()] {
            assert!(matches!(
                lobby.place_bet(A, amount),
                Err(LobbyError::InvalidBet(BetRejection::NonPositiveAmount))
            ));
        }
        assert!(matches!(
            lobby.place_bet(A, BetAmount::new(1001)),
            Err(LobbyError::InvalidBet(BetRejection::InsufficientBalance {
                balance: 1000,
                amount: 1001
            }))
        ));
        assert!(matches!(
            lobby.place_bet(C, BetAmount::new(10)),
            Err(LobbyError::InvalidBet(BetRejection::UnknownPlayer))
        ));

        assert_eq!(lobby.snapshot(), before);
    }

    #[test]
    fn test_place_bet_at_most_once_per_round() {
        let mut lobby = lobby_with(&[A]);
        lobby.start_round().unwrap();
        lobby.place_bet(A, BetAmount::new(100)).unwrap();

        assert!(matches!(
            lobby.place_bet(A, BetAmount::new(50)),
            Err(LobbyError::InvalidBet(BetRejection::AlreadyBet))
        ));
        assert_eq!(balance(&lobby, A), 900);
        assert_eq!(lobby.round().bets().len(), 1);
    }

    // =====================================================================
    // tick()
    // =====================================================================

    #[test]
    fn test_tick_counts_down_to_zero() {
        let mut lobby = lobby_with(&[A]);
        let generation = lobby.start_round().unwrap();
        for expected in (0..15).rev() {
            assert_eq!(lobby.tick(generation).unwrap(), expected);
        }
    }

    #[test]
    fn test_tick_with_old_generation_is_stale() {
        let mut lobby = lobby_with(&[A]);
        let first = lobby.start_round().unwrap();
        run_out_clock(&mut lobby);
        lobby.settle(&mut ScriptedRandom::default()).unwrap();
        let second = lobby.start_round().unwrap();

        assert!(matches!(
            lobby.tick(first),
            Err(LobbyError::StaleRound { current, got }) if current == second && got == first
        ));
        assert_eq!(lobby.round().remaining_seconds(), 15);
    }

    #[test]
    fn test_tick_while_idle_is_stale() {
        let mut lobby = lobby_with(&[A]);
        assert!(matches!(lobby.tick(0), Err(LobbyError::StaleRound { .. })));
    }

    // =====================================================================
    // settle(): round-level scenarios
    // =====================================================================

    #[test]
    fn test_settle_single_winner() {
        let mut lobby = lobby_with(&[A, B]);
        lobby.start_round().unwrap();
        lobby.place_bet(A, BetAmount::new(200)).unwrap();
        lobby.place_bet(B, BetAmount::new(300)).unwrap();
        assert_eq!(balance(&lobby, A), 800);
        assert_eq!(balance(&lobby, B), 700);
        run_out_clock(&mut lobby);

        let settlement = lobby.settle(&mut ScriptedRandom::dice([5, 3])).unwrap();

        assert_eq!(settlement.resolution.winners, vec![A]);
        assert_eq!(settlement.lost(), 0);
        assert_eq!(balance(&lobby, A), 1300);
        assert_eq!(balance(&lobby, B), 700);
        assert_eq!(lobby.total_balance(), 2000);
        assert_eq!(lobby.round().phase(), RoundPhase::Idle);
        assert_eq!(lobby.round().rolls().get(&A), Some(&5));
    }

    #[test]
    fn test_settle_two_way_tie_even_pot() {
        let mut lobby = lobby_with(&[A, B]);
        lobby.start_round().unwrap();
        lobby.place_bet(A, BetAmount::new(50)).unwrap();
        lobby.place_bet(B, BetAmount::new(50)).unwrap();
        run_out_clock(&mut lobby);

        let settlement = lobby.settle(&mut ScriptedRandom::dice([4, 4])).unwrap();

        assert!(settlement.resolution.is_tie());
        assert_eq!(balance(&lobby, A), 1000);
        assert_eq!(balance(&lobby, B), 1000);
    }

    #[test]
    fn test_settle_three_way_tie_loses_one_chip() {
        let mut lobby = lobby_with(&[A, B, C]);
        lobby.start_round().unwrap();
        lobby.place_bet(A, BetAmount::new(34)).unwrap();
        lobby.place_bet(B, BetAmount::new(33)).unwrap();
        lobby.place_bet(C, BetAmount::new(33)).unwrap();
        run_out_clock(&mut lobby);

        let settlement = lobby.settle(&mut ScriptedRandom::dice([6, 6, 6])).unwrap();

        assert_eq!(settlement.resolution.share, 33);
        assert_eq!(settlement.lost(), 1);
        assert_eq!(lobby.total_balance(), 3000 - 1);
    }

    #[test]
    fn test_settle_departed_winner_forfeits_pot() {
        let mut lobby = lobby_with(&[A, B]);
        lobby.start_round().unwrap();
        lobby.place_bet(A, BetAmount::new(100)).unwrap();
        lobby.place_bet(B, BetAmount::new(100)).unwrap();
        lobby.remove_player(B);
        assert!(lobby.round().has_bet(B), "bet survives the disconnect");
        run_out_clock(&mut lobby);

        // A rolls 2, B (gone) rolls 6.
        let settlement = lobby.settle(&mut ScriptedRandom::dice([2, 6])).unwrap();

        assert_eq!(settlement.resolution.winners, vec![B]);
        assert_eq!(settlement.unclaimed, 200);
        assert_eq!(balance(&lobby, A), 900);
    }

    #[test]
    fn test_settle_without_bets_changes_nothing() {
        let mut lobby = lobby_with(&[A, B]);
        lobby.start_round().unwrap();
        run_out_clock(&mut lobby);

        let mut rng = ScriptedRandom::dice([6]);
        let settlement = lobby.settle(&mut rng).unwrap();

        assert!(settlement.resolution.rolls.is_empty());
        assert!(lobby.round().rolls().is_empty());
        assert_eq!(lobby.total_balance(), 2000);
        assert_eq!(rng.remaining(), 1);
    }

    #[test]
    fn test_settle_requires_betting_round() {
        let mut lobby = lobby_with(&[A]);
        assert!(lobby.settle(&mut ScriptedRandom::default()).is_none());
    }

    #[test]
    fn test_snapshot_after_settle_shows_rolls_inactive() {
        let mut lobby = lobby_with(&[A]);
        lobby.start_round().unwrap();
        lobby.place_bet(A, BetAmount::new(10)).unwrap();
        run_out_clock(&mut lobby);
        lobby.settle(&mut ScriptedRandom::dice([3])).unwrap();

        let snapshot = lobby.snapshot();
        assert!(!snapshot.game.active);
        assert_eq!(snapshot.game.timer, 0);
        assert_eq!(snapshot.game.rolls.get(&A), Some(&3));
        assert_eq!(snapshot.game.bets.get(&A), Some(&10));
        assert_eq!(snapshot.player(A).unwrap().balance, 1000);
    }
}
