//! Round resolution: roll the dice, find the high roll, split the pot.
//!
//! [`resolve_round`] is pure apart from its random draws. It never touches
//! balances; the lobby applies [`Resolution::payouts`] to whichever
//! players are still present.

use std::collections::BTreeMap;

use dicebet_protocol::PlayerId;

use crate::RandomSource;

/// The result of resolving one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// One roll per bettor.
    pub rolls: BTreeMap<PlayerId, u8>,
    /// Sum of all bets.
    pub pot: u64,
    /// The highest roll, `None` when nobody bet.
    pub highest_roll: Option<u8>,
    /// Every bettor who rolled `highest_roll`, in id order.
    pub winners: Vec<PlayerId>,
    /// What each winner is credited: `pot / winners.len()`, rounded down.
    pub share: u64,
    /// `pot % winners.len()`. Not paid to anyone.
    pub remainder: u64,
}

impl Resolution {
    /// Credits owed, one entry per winner.
    pub fn payouts(&self) -> impl Iterator<Item = (PlayerId, u64)> + '_ {
        self.winners.iter().map(move |&id| (id, self.share))
    }

    /// `true` when two or more bettors share the high roll.
    pub fn is_tie(&self) -> bool {
        self.winners.len() > 1
    }
}

/// Resolves a round from its bets.
///
/// Draws one roll per bettor in ascending id order, so a fixed sequence
/// of draws always produces the same outcome. With no bets nothing is
/// drawn and nothing is paid.
pub fn resolve_round(
    bets: &BTreeMap<PlayerId, u64>,
    faces: u8,
    rng: &mut dyn RandomSource,
) -> Resolution {
    let rolls: BTreeMap<PlayerId, u8> =
        bets.keys().map(|&id| (id, rng.roll_die(faces))).collect();
    let pot: u64 = bets.values().sum();

    let highest_roll = rolls.values().copied().max();
    let winners: Vec<PlayerId> = match highest_roll {
        Some(high) => rolls
            .iter()
            .filter(|&(_, &roll)| roll == high)
            .map(|(&id, _)| id)
            .collect(),
        None => Vec::new(),
    };

    let (share, remainder) = match winners.len() as u64 {
        0 => (0, 0),
        k => (pot / k, pot % k),
    };

    Resolution {
        rolls,
        pot,
        highest_roll,
        winners,
        share,
        remainder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScriptedRandom, SeededRandom};

    fn bets(entries: &[(u64, u64)]) -> BTreeMap<PlayerId, u64> {
        entries.iter().map(|&(id, amount)| (PlayerId(id), amount)).collect()
    }

    #[test]
    fn test_resolve_single_winner_takes_whole_pot() {
        let mut rng = ScriptedRandom::dice([5, 3]);
        let res = resolve_round(&bets(&[(1, 200), (2, 300)]), 6, &mut rng);

        assert_eq!(res.rolls[&PlayerId(1)], 5);
        assert_eq!(res.rolls[&PlayerId(2)], 3);
        assert_eq!(res.pot, 500);
        assert_eq!(res.highest_roll, Some(5));
        assert_eq!(res.winners, vec![PlayerId(1)]);
        assert_eq!(res.share, 500);
        assert_eq!(res.remainder, 0);
        assert!(!res.is_tie());
    }

    #[test]
    fn test_resolve_two_way_tie_splits_evenly() {
        let mut rng = ScriptedRandom::dice([4, 4]);
        let res = resolve_round(&bets(&[(1, 50), (2, 50)]), 6, &mut rng);

        assert!(res.is_tie());
        assert_eq!(res.share, 50);
        assert_eq!(res.remainder, 0);
        let paid: u64 = res.payouts().map(|(_, amount)| amount).sum();
        assert_eq!(paid, 100);
    }

    #[test]
    fn test_resolve_three_way_tie_loses_remainder() {
        let mut rng = ScriptedRandom::dice([2, 2, 2]);
        let res = resolve_round(&bets(&[(1, 34), (2, 33), (3, 33)]), 6, &mut rng);

        assert_eq!(res.winners.len(), 3);
        assert_eq!(res.share, 33);
        assert_eq!(res.remainder, 1);
        let paid: u64 = res.payouts().map(|(_, amount)| amount).sum();
        assert_eq!(paid + res.remainder, res.pot);
    }

    #[test]
    fn test_resolve_tie_excludes_lower_rolls() {
        let mut rng = ScriptedRandom::dice([6, 1, 6]);
        let res = resolve_round(&bets(&[(1, 10), (2, 10), (3, 10)]), 6, &mut rng);
        assert_eq!(res.winners, vec![PlayerId(1), PlayerId(3)]);
        assert_eq!(res.share, 15);
    }

    #[test]
    fn test_resolve_no_bets_draws_nothing() {
        let mut rng = ScriptedRandom::dice([6]);
        let res = resolve_round(&BTreeMap::new(), 6, &mut rng);

        assert!(res.rolls.is_empty());
        assert_eq!(res.pot, 0);
        assert_eq!(res.highest_roll, None);
        assert!(res.winners.is_empty());
        assert_eq!(res.payouts().count(), 0);
        assert_eq!(rng.remaining(), 1, "no draw may be consumed");
    }

    #[test]
    fn test_resolve_is_deterministic_for_a_seed() {
        let round = bets(&[(1, 10), (2, 20), (3, 30), (4, 40)]);
        let a = resolve_round(&round, 6, &mut SeededRandom::new(99));
        let b = resolve_round(&round, 6, &mut SeededRandom::new(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolve_conserves_pot_for_many_seeds() {
        let round = bets(&[(1, 17), (2, 5), (3, 101), (4, 1), (5, 9)]);
        for seed in 0..200 {
            let res = resolve_round(&round, 6, &mut SeededRandom::new(seed));
            let paid: u64 = res.payouts().map(|(_, amount)| amount).sum();
            assert_eq!(paid + res.remainder, res.pot, "seed {seed}");
            assert!(res.rolls.values().all(|r| (1..=6).contains(r)));
        }
    }
}
