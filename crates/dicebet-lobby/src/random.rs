//! Injectable randomness for dice rolls and lobby codes.
//!
//! Everything random in the game goes through [`RandomSource`], so tests
//! can replay exact rolls with [`ScriptedRandom`] or a fixed seed with
//! [`SeededRandom`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniform random integers.
pub trait RandomSource: Send + 'static {
    /// Returns a value uniformly distributed in `0..upper`.
    ///
    /// Callers never pass `upper == 0`.
    fn below(&mut self, upper: u32) -> u32;

    /// Rolls one die with `faces` sides: uniform in `1..=faces`.
    fn roll_die(&mut self, faces: u8) -> u8 {
        let draw = self.below(u32::from(faces.max(1)));
        // draw < faces <= 255, so the cast cannot truncate.
        draw as u8 + 1
    }
}

/// Produces one independent [`RandomSource`] per consumer.
///
/// The registry takes one for code generation and one per lobby for its
/// dice, so lobbies never share mutable random state.
pub type RandomFactory = Arc<dyn Fn() -> Box<dyn RandomSource> + Send + Sync>;

// ---------------------------------------------------------------------------
// ThreadRandom
// ---------------------------------------------------------------------------

/// Production source backed by the thread-local `rand` generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl ThreadRandom {
    /// A factory handing out `ThreadRandom` sources.
    pub fn factory() -> RandomFactory {
        Arc::new(|| -> Box<dyn RandomSource> { Box::new(ThreadRandom) })
    }
}

impl RandomSource for ThreadRandom {
    fn below(&mut self, upper: u32) -> u32 {
        rand::rng().random_range(0..upper)
    }
}

// ---------------------------------------------------------------------------
// SeededRandom
// ---------------------------------------------------------------------------

/// Reproducible source seeded with a fixed value.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A factory whose n-th source is seeded with `seed + n`.
    pub fn factory(seed: u64) -> RandomFactory {
        let counter = Arc::new(AtomicU64::new(0));
        Arc::new(move || -> Box<dyn RandomSource> {
            let n = counter.fetch_add(1, Ordering::Relaxed);
            Box::new(SeededRandom::new(seed.wrapping_add(n)))
        })
    }
}

impl RandomSource for SeededRandom {
    fn below(&mut self, upper: u32) -> u32 {
        self.rng.random_range(0..upper)
    }
}

// ---------------------------------------------------------------------------
// ScriptedRandom
// ---------------------------------------------------------------------------

/// Replays a fixed sequence of draws, then returns 0 forever.
///
/// Each scripted value is reduced modulo the requested bound.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    draws: VecDeque<u32>,
}

impl ScriptedRandom {
    /// Replays raw `below` results.
    pub fn new(draws: impl IntoIterator<Item = u32>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
        }
    }

    /// Replays die faces: `dice([5, 3])` rolls a 5, then a 3.
    pub fn dice(faces: impl IntoIterator<Item = u8>) -> Self {
        Self::new(faces.into_iter().map(|f| u32::from(f.saturating_sub(1))))
    }

    /// Draws left before the script runs dry.
    pub fn remaining(&self) -> usize {
        self.draws.len()
    }
}

impl RandomSource for ScriptedRandom {
    fn below(&mut self, upper: u32) -> u32 {
        self.draws.pop_front().unwrap_or(0) % upper
    }
}
