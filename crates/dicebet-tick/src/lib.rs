//! Fixed-interval tick scheduler for Dicebet.
//!
//! A betting round counts down in whole seconds. [`TickScheduler`] produces
//! those seconds: each call to [`TickScheduler::wait_for_tick`] sleeps until
//! the next deadline and reports whether the runtime woke up late.
//!
//! # Integration
//!
//! The round scheduler owns one of these per running round:
//!
//! ```ignore
//! let mut ticks = TickScheduler::with_interval(Duration::from_secs(1));
//! loop {
//!     let info = ticks.wait_for_tick().await;
//!     if lobby.tick(generation).await.is_done() {
//!         break;
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the runtime wakes the scheduler late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and resume from now.
    Skip,
    /// Fire up to `max_catchup` missed ticks back to back, then resume
    /// from now. A countdown keeps its wall-clock length this way.
    CatchUp {
        /// Cap on consecutive catch-up ticks.
        max_catchup: u32,
    },
    /// Keep the original cadence; the next tick fires at its originally
    /// scheduled time.
    Drop,
}

impl Default for TickPolicy {
    fn default() -> Self {
        Self::CatchUp { max_catchup: 2 }
    }
}

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Must be non-zero.
    pub interval: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            policy: TickPolicy::default(),
        }
    }
}

impl TickConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Create a config for a specific interval with the default policy.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                "tick interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// The fixed interval this tick represents.
    pub dt: Duration,
    /// `true` if this tick fired noticeably late.
    pub overrun: bool,
    /// How many ticks were skipped due to overrun (0 in normal operation).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick scheduler.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    next_tick: Instant,
    total_overruns: u64,
}

impl TickScheduler {
    /// Create a new scheduler; the first tick is due one interval from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );
        Self {
            next_tick: Instant::now() + config.interval,
            config,
            tick_count: 0,
            total_overruns: 0,
        }
    }

    /// Create a scheduler for a specific interval with the default policy.
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(TickConfig::with_interval(interval))
    }

    /// Wait until the next tick is due.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// deadline untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let next = self.next_tick;
        let interval = self.config.interval;

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        // >10% late counts as an overrun.
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let behind = (late_by.as_nanos() / interval.as_nanos()) as u64;
        let mut ticks_skipped = 0u64;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                ticks_skipped = behind;
                if ticks_skipped > 0 {
                    warn!(
                        tick = self.tick_count,
                        skipped = ticks_skipped,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, skipping ahead"
                    );
                }
                now + interval
            }
            TickPolicy::CatchUp { max_catchup } => {
                ticks_skipped = behind.saturating_sub(u64::from(max_catchup));
                if behind > 0 {
                    warn!(
                        tick = self.tick_count,
                        behind,
                        skipping = ticks_skipped,
                        "tick overrun, catching up"
                    );
                }
                if behind <= u64::from(max_catchup) {
                    next + interval
                } else {
                    now + interval
                }
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping original cadence"
                    );
                }
                next + interval
            }
        };

        if overrun {
            self.total_overruns += 1;
        }

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: interval,
            overrun,
            ticks_skipped,
        }
    }

    /// Number of ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Number of ticks that fired late.
    pub fn total_overruns(&self) -> u64 {
        self.total_overruns
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// The configured overrun policy.
    pub fn policy(&self) -> TickPolicy {
        self.config.policy
    }
}
