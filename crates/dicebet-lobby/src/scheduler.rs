//! Per-round countdown task.
//!
//! A `RoundScheduler` is spawned when a round starts and sends one
//! `Tick` per interval to its lobby until the lobby reports the round
//! resolved. It is keyed by the round's generation, so a scheduler left
//! over from an earlier round can never advance a newer one, and it dies
//! on its own once the lobby's channel closes.

use dicebet_tick::{TickConfig, TickScheduler};
use tokio::task::JoinHandle;

use crate::{LobbyHandle, TickOutcome};

/// Why a round scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    /// The countdown reached zero and the round was settled.
    Resolved,
    /// The round it was counting is no longer the lobby's current round.
    Superseded,
    /// The lobby was destroyed.
    LobbyGone,
}

/// Drives the countdown of one round.
pub struct RoundScheduler {
    lobby: LobbyHandle,
    generation: u64,
    tick: TickConfig,
}

impl RoundScheduler {
    pub fn new(lobby: LobbyHandle, generation: u64, tick: TickConfig) -> Self {
        Self {
            lobby,
            generation,
            tick,
        }
    }

    /// Runs the countdown on its own task.
    pub fn spawn(self) -> JoinHandle<SchedulerExit> {
        tokio::spawn(self.run())
    }

    /// Ticks until the round resolves or the lobby goes away.
    ///
    /// When the runtime wakes us late and the tick policy gives up on
    /// catching up, the skipped seconds are still delivered so the
    /// countdown does not outlast its wall-clock length.
    pub async fn run(self) -> SchedulerExit {
        let code = self.lobby.code().clone();
        let mut ticks = TickScheduler::new(self.tick.clone());
        tracing::debug!(%code, generation = self.generation, "round countdown started");

        loop {
            let info = ticks.wait_for_tick().await;
            if info.overrun {
                tracing::debug!(
                    %code,
                    tick = info.tick,
                    interval_ms = info.dt.as_millis() as u64,
                    skipped = info.ticks_skipped,
                    "countdown woke late"
                );
            }

            for _ in 0..=info.ticks_skipped {
                let outcome = match self.lobby.tick(self.generation).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::debug!(%code, error = %e, "lobby gone, countdown stopped");
                        return SchedulerExit::LobbyGone;
                    }
                };
                match outcome {
                    TickOutcome::Counting(remaining) => {
                        tracing::trace!(%code, remaining, "countdown");
                    }
                    TickOutcome::Resolved => {
                        tracing::debug!(%code, generation = self.generation, "round countdown done");
                        return SchedulerExit::Resolved;
                    }
                    TickOutcome::Stale => {
                        tracing::debug!(
                            %code,
                            generation = self.generation,
                            "round superseded, countdown stopped"
                        );
                        return SchedulerExit::Superseded;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dicebet_protocol::LobbyCode;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::*;
    use crate::actor::LobbyCommand;

    fn fake_lobby() -> (LobbyHandle, mpsc::Receiver<LobbyCommand>) {
        let (tx, rx) = mpsc::channel(8);
        (LobbyHandle::new(LobbyCode::new("TEST"), tx), rx)
    }

    /// Answers ticks as a lobby with `seconds` on the clock would.
    async fn answer_ticks(rx: mpsc::Receiver<LobbyCommand>, seconds: u32) -> u64 {
        answer_ticks_stalling(rx, seconds, 0, Duration::ZERO).await
    }

    /// Like [`answer_ticks`], but sits on tick number `stall_on` for
    /// `stall` before replying.
    async fn answer_ticks_stalling(
        mut rx: mpsc::Receiver<LobbyCommand>,
        mut seconds: u32,
        stall_on: u64,
        stall: Duration,
    ) -> u64 {
        let mut seen = 0;
        while let Some(cmd) = rx.recv().await {
            if let LobbyCommand::Tick { reply, .. } = cmd {
                seen += 1;
                if seen == stall_on {
                    tokio::time::sleep(stall).await;
                }
                seconds -= 1;
                let outcome = if seconds == 0 {
                    TickOutcome::Resolved
                } else {
                    TickOutcome::Counting(seconds)
                };
                let _ = reply.send(outcome);
            }
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_until_resolved() {
        let (handle, rx) = fake_lobby();
        let start = Instant::now();
        let scheduler = RoundScheduler::new(handle, 1, TickConfig::default()).spawn();
        let lobby = tokio::spawn(answer_ticks(rx, 15));

        assert_eq!(scheduler.await.unwrap(), SchedulerExit::Resolved);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert_eq!(lobby.await.unwrap(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_catches_up_after_slow_lobby() {
        let (handle, rx) = fake_lobby();
        let start = Instant::now();
        let scheduler = RoundScheduler::new(handle, 1, TickConfig::default()).spawn();
        let lobby = tokio::spawn(answer_ticks_stalling(
            rx,
            15,
            2,
            Duration::from_millis(3500),
        ));

        // Ticks 3 to 5 fire back to back once the lobby answers, so the
        // round keeps its length.
        assert_eq!(scheduler.await.unwrap(), SchedulerExit::Resolved);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert_eq!(lobby.await.unwrap(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_stops_when_lobby_closes() {
        let (handle, rx) = fake_lobby();
        let scheduler = RoundScheduler::new(handle, 1, TickConfig::default()).spawn();
        drop(rx);

        assert_eq!(scheduler.await.unwrap(), SchedulerExit::LobbyGone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_stops_on_stale_generation() {
        let (handle, mut rx) = fake_lobby();
        let scheduler = RoundScheduler::new(handle, 3, TickConfig::default()).spawn();

        match rx.recv().await {
            Some(LobbyCommand::Tick { generation, reply }) => {
                assert_eq!(generation, 3);
                let _ = reply.send(TickOutcome::Stale);
            }
            _ => panic!("expected a tick"),
        }

        assert_eq!(scheduler.await.unwrap(), SchedulerExit::Superseded);
    }
}
