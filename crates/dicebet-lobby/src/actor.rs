//! Lobby actor: an isolated Tokio task that owns one [`Lobby`].
//!
//! Every mutation of a lobby (joins, leaves, bets, countdown ticks) is a
//! command on the actor's channel, so they are applied one at a time and
//! two lobbies never wait on each other. After each change the actor
//! pushes a full snapshot to every member's outbound channel.

use std::collections::HashMap;

use dicebet_protocol::{BetAmount, LobbyCode, LobbySnapshot, PlayerId, ServerEvent};
use dicebet_tick::TickConfig;
use dicebet_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::{Lobby, LobbyError, RandomSource, RoundScheduler};

/// Channel sender for delivering events to one connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// What a countdown tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The round is still betting; seconds left.
    Counting(u32),
    /// The clock hit zero and the round was settled.
    Resolved,
    /// The tick belonged to a round that is no longer running.
    Stale,
}

impl TickOutcome {
    /// `true` once the countdown that produced this tick should stop.
    pub fn is_done(self) -> bool {
        !matches!(self, Self::Counting(_))
    }
}

/// Commands sent to a lobby actor through its channel.
pub(crate) enum LobbyCommand {
    Join {
        player: PlayerId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },
    /// Replies with the number of members left.
    Leave {
        player: PlayerId,
        reply: oneshot::Sender<Result<usize, LobbyError>>,
    },
    StartRound {
        reply: oneshot::Sender<Result<u64, LobbyError>>,
    },
    PlaceBet {
        player: PlayerId,
        amount: BetAmount,
        reply: oneshot::Sender<Result<u64, LobbyError>>,
    },
    Tick {
        generation: u64,
        reply: oneshot::Sender<TickOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<LobbySnapshot>,
    },
    Shutdown,
}

/// Handle to a running lobby actor.
///
/// Cheap to clone. The registry holds one per lobby; each running round's
/// scheduler holds another.
#[derive(Debug, Clone)]
pub struct LobbyHandle {
    code: LobbyCode,
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    pub(crate) fn new(code: LobbyCode, sender: mpsc::Sender<LobbyCommand>) -> Self {
        Self { code, sender }
    }

    /// The lobby's code.
    pub fn code(&self) -> &LobbyCode {
        &self.code
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends a command and waits for its reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LobbyCommand,
    ) -> Result<T, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| LobbyError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.code.clone()))
    }

    /// Adds a member; they receive snapshots on `sender` from now on.
    pub async fn join(
        &self,
        player: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), LobbyError> {
        self.request(|reply| LobbyCommand::Join {
            player,
            name,
            sender,
            reply,
        })
        .await?
    }

    /// Removes a member. Returns how many are left; at zero the actor stops.
    pub async fn leave(&self, player: PlayerId) -> Result<usize, LobbyError> {
        self.request(|reply| LobbyCommand::Leave { player, reply })
            .await?
    }

    /// Starts a round. Returns its generation.
    pub async fn start_round(&self) -> Result<u64, LobbyError> {
        self.request(|reply| LobbyCommand::StartRound { reply }).await?
    }

    /// Places a bet. Returns the amount debited.
    pub async fn place_bet(
        &self,
        player: PlayerId,
        amount: BetAmount,
    ) -> Result<u64, LobbyError> {
        self.request(|reply| LobbyCommand::PlaceBet {
            player,
            amount,
            reply,
        })
        .await?
    }

    /// Advances round `generation` by one tick.
    pub async fn tick(&self, generation: u64) -> Result<TickOutcome, LobbyError> {
        self.request(|reply| LobbyCommand::Tick { generation, reply })
            .await
    }

    /// The current full state.
    pub async fn snapshot(&self) -> Result<LobbySnapshot, LobbyError> {
        self.request(|reply| LobbyCommand::Snapshot { reply }).await
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.sender
            .send(LobbyCommand::Shutdown)
            .await
            .map_err(|_| LobbyError::Unavailable(self.code.clone()))
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct LobbyActor {
    lobby: Lobby,
    /// Per-member outbound channels: the lobby's broadcast topic.
    senders: HashMap<PlayerId, PlayerSender>,
    dice: Box<dyn RandomSource>,
    tick: TickConfig,
    receiver: mpsc::Receiver<LobbyCommand>,
    /// Our own channel, for handing to round schedulers. Weak so that the
    /// actor alone never keeps itself alive.
    commands: mpsc::WeakSender<LobbyCommand>,
}

impl LobbyActor {
    /// Runs the actor loop until shutdown or the last member leaves.
    async fn run(mut self) {
        let code = self.lobby.code().clone();
        tracing::info!(%code, "lobby actor started");
        self.broadcast();

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                LobbyCommand::Join {
                    player,
                    name,
                    sender,
                    reply,
                } => {
                    let _ = reply.send(self.handle_join(player, &name, sender));
                }
                LobbyCommand::Leave { player, reply } => {
                    let result = self.handle_leave(player);
                    let empty = self.lobby.is_empty();
                    let _ = reply.send(result);
                    if empty {
                        break;
                    }
                }
                LobbyCommand::StartRound { reply } => {
                    let _ = reply.send(self.handle_start_round());
                }
                LobbyCommand::PlaceBet {
                    player,
                    amount,
                    reply,
                } => {
                    let _ = reply.send(self.handle_place_bet(player, amount));
                }
                LobbyCommand::Tick { generation, reply } => {
                    let _ = reply.send(self.handle_tick(generation));
                }
                LobbyCommand::Snapshot { reply } => {
                    let _ = reply.send(self.lobby.snapshot());
                }
                LobbyCommand::Shutdown => {
                    tracing::info!(%code, "lobby shutting down");
                    break;
                }
            }
        }

        tracing::info!(%code, "lobby actor stopped");
    }

    fn handle_join(
        &mut self,
        player: PlayerId,
        name: &str,
        sender: PlayerSender,
    ) -> Result<(), LobbyError> {
        self.lobby.add_player(player, name)?;
        self.senders.insert(player, sender);
        tracing::info!(
            code = %self.lobby.code(),
            %player,
            players = self.lobby.players().len(),
            "player joined"
        );
        self.broadcast();
        Ok(())
    }

    fn handle_leave(&mut self, player: PlayerId) -> Result<usize, LobbyError> {
        self.senders.remove(&player);
        if self.lobby.remove_player(player).is_none() {
            return Err(LobbyError::NotInLobby(ConnectionId::new(player.0)));
        }

        let remaining = self.lobby.players().len();
        tracing::info!(
            code = %self.lobby.code(),
            %player,
            players = remaining,
            bet_stays = self.lobby.round().has_bet(player),
            "player left"
        );
        if remaining > 0 {
            self.broadcast();
        }
        Ok(remaining)
    }

    fn handle_start_round(&mut self) -> Result<u64, LobbyError> {
        let generation = self.lobby.start_round()?;
        tracing::info!(
            code = %self.lobby.code(),
            generation,
            seconds = self.lobby.round().remaining_seconds(),
            "round started"
        );
        self.broadcast();

        match self.commands.upgrade() {
            Some(sender) => {
                let handle = LobbyHandle::new(self.lobby.code().clone(), sender);
                RoundScheduler::new(handle, generation, self.tick.clone()).spawn();
            }
            // Unreachable while we are still receiving commands.
            None => tracing::error!(
                code = %self.lobby.code(),
                "lobby channel gone, round cannot count down"
            ),
        }
        Ok(generation)
    }

    fn handle_place_bet(
        &mut self,
        player: PlayerId,
        amount: BetAmount,
    ) -> Result<u64, LobbyError> {
        let debited = self.lobby.place_bet(player, amount)?;
        tracing::debug!(
            code = %self.lobby.code(),
            %player,
            amount = debited,
            pot = self.lobby.round().pot(),
            "bet placed"
        );
        self.broadcast();
        Ok(debited)
    }

    fn handle_tick(&mut self, generation: u64) -> TickOutcome {
        let remaining = match self.lobby.tick(generation) {
            Ok(remaining) => remaining,
            Err(e) => {
                tracing::debug!(code = %self.lobby.code(), error = %e, "dropping tick");
                return TickOutcome::Stale;
            }
        };
        self.broadcast();
        if remaining > 0 {
            return TickOutcome::Counting(remaining);
        }

        if let Some(settlement) = self.lobby.settle(self.dice.as_mut()) {
            let res = &settlement.resolution;
            tracing::info!(
                code = %self.lobby.code(),
                generation,
                pot = res.pot,
                highest_roll = ?res.highest_roll,
                winners = res.winners.len(),
                share = res.share,
                remainder = res.remainder,
                unclaimed = settlement.unclaimed,
                "round resolved"
            );
        }
        self.broadcast();
        TickOutcome::Resolved
    }

    /// Pushes the current snapshot to every member. Members whose
    /// receiver is gone are skipped; their disconnect is on its way.
    fn broadcast(&self) {
        let event = ServerEvent::UpdateLobbyState(self.lobby.snapshot());
        for sender in self.senders.values() {
            let _ = sender.send(event.clone());
        }
    }
}

/// Spawns an actor for `lobby` and returns a handle to it.
///
/// `founder` is the outbound channel of the lobby's first member; the
/// actor greets them with the initial snapshot.
pub(crate) fn spawn_lobby(
    lobby: Lobby,
    founder: PlayerSender,
    dice: Box<dyn RandomSource>,
    tick: TickConfig,
    channel_size: usize,
) -> LobbyHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let code = lobby.code().clone();

    let senders = lobby
        .players()
        .first()
        .map(|p| HashMap::from([(p.id, founder)]))
        .unwrap_or_default();

    let actor = LobbyActor {
        lobby,
        senders,
        dice,
        tick,
        receiver: rx,
        commands: tx.downgrade(),
    };

    tokio::spawn(actor.run());

    LobbyHandle::new(code, tx)
}
