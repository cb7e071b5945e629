/*
 *  Relays, a realtime multiplayer server for Super Tic-Tac-Toe.
 *  Copyright (C) 2025 ToTheAnd
 *
 *  Relays is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  Relays is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with Relays. If not, see <https://www.gnu.org/licenses/>.
 */

//! One task per match. The command channel is what serializes access to
//! the match state: two matches progress in parallel, two commands for
//! the same match never do. Broadcasts go out in the order the commands
//! were applied, which is all the cross-peer ordering the protocol
//! promises.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use cogs::Move;
use cranks::{Difficulty, Engine, SearchCtl};

use crate::error::ServerError;
use crate::fanout::FanOut;
use crate::participant::{Participant, computer_id};
use crate::results;
use crate::state::MatchState;
use crate::store::UserStore;
use crate::wire::{Mode, ServerFrame, WireGameState};
use crate::{MatchId, ServerConfig};

/// Mailbox depth per match; commands queue behind the executor.
const COMMAND_BUFFER: usize = 64;

pub enum Command {
    Join { user_id: String, reply: oneshot::Sender<Result<Participant, ServerError>> },
    Move { player_id: String, mv: Move, reply: oneshot::Sender<Result<(), ServerError>> },
    /// A computed computer reply re-entering the move path. `at_move`
    /// pins the state the search ran against; a stale reply is dropped.
    EngineMove { mv: Move, at_move: u32 },
    Reset { user_id: String, reply: oneshot::Sender<Result<(), ServerError>> },
    Leave { user_id: String },
    Probe { reply: oneshot::Sender<MatchProbe> },
    Shutdown,
}

/// A point-in-time view of a match, for the reaper, matchmaking status
/// checks and tests.
#[derive(Debug, Clone)]
pub struct MatchProbe {
    pub players: usize,
    pub watchers: u32,
    pub mode: Mode,
    pub difficulty: Option<Difficulty>,
    pub terminal_for: Option<Duration>,
    pub game_state: WireGameState,
}

impl MatchProbe {
    pub fn is_terminal(&self) -> bool {
        self.terminal_for.is_some()
    }
}

/// Cheap address of a match actor. Dropping every handle (and the
/// registry entry) shuts the actor down.
#[derive(Clone)]
pub struct MatchHandle {
    id: MatchId,
    tx: mpsc::Sender<Command>,
    reset_gate: Arc<AtomicBool>,
}

impl MatchHandle {
    pub fn id(&self) -> MatchId {
        self.id
    }

    pub async fn join(&self, user_id: impl Into<String>) -> Result<Participant, ServerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Join { user_id: user_id.into(), reply }).await?;
        rx.await.map_err(|_| ServerError::game_not_found())?
    }

    pub async fn make_move(
        &self,
        player_id: impl Into<String>,
        mv: Move,
    ) -> Result<(), ServerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Move { player_id: player_id.into(), mv, reply }).await?;
        rx.await.map_err(|_| ServerError::game_not_found())?
    }

    /// At most one reset is in flight per match: the gate spans the whole
    /// round-trip, so the loser of a race gets `Conflict` instead of
    /// resetting a board that was just reset.
    pub async fn reset(&self, user_id: impl Into<String>) -> Result<(), ServerError> {
        if self.reset_gate.swap(true, Ordering::AcqRel) {
            return Err(ServerError::Conflict);
        }
        let result = self.reset_inner(user_id.into()).await;
        self.reset_gate.store(false, Ordering::Release);
        result
    }

    async fn reset_inner(&self, user_id: String) -> Result<(), ServerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { user_id, reply }).await?;
        rx.await.map_err(|_| ServerError::game_not_found())?
    }

    pub async fn leave(&self, user_id: impl Into<String>) {
        let _ = self.send(Command::Leave { user_id: user_id.into() }).await;
    }

    pub async fn probe(&self) -> Option<MatchProbe> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Probe { reply }).await.ok()?;
        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }

    async fn send(&self, command: Command) -> Result<(), ServerError> {
        self.tx.send(command).await.map_err(|_| ServerError::game_not_found())
    }
}

pub(crate) struct ActorDeps {
    pub fanout: Arc<FanOut>,
    pub store: Arc<dyn UserStore>,
    pub config: Arc<ServerConfig>,
}

pub(crate) fn spawn_match(state: MatchState, deps: ActorDeps) -> MatchHandle {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let handle = MatchHandle {
        id: state.id,
        tx: tx.clone(),
        reset_gate: Arc::new(AtomicBool::new(false)),
    };
    let actor = MatchActor { state, deps, tx, engine_stop: None };
    tokio::spawn(actor.run(rx));
    handle
}

struct MatchActor {
    state: MatchState,
    deps: ActorDeps,
    /// Own sender, for the scheduled computer reply to come back through.
    tx: mpsc::Sender<Command>,
    /// Stop flag of the most recently scheduled search.
    engine_stop: Option<Arc<AtomicBool>>,
}

impl MatchActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        debug!(match_id = %self.state.id, mode = %self.state.mode, "match actor started");
        while let Some(command) = rx.recv().await {
            match command {
                Command::Join { user_id, reply } => {
                    let result = self.handle_join(user_id).await;
                    let _ = reply.send(result);
                }
                Command::Move { player_id, mv, reply } => {
                    let result = self.handle_move(&player_id, mv).await;
                    let _ = reply.send(result);
                }
                Command::EngineMove { mv, at_move } => {
                    self.handle_engine_move(mv, at_move).await;
                }
                Command::Reset { user_id, reply } => {
                    let result = self.handle_reset(&user_id);
                    let _ = reply.send(result);
                }
                Command::Leave { user_id } => self.handle_leave(&user_id),
                Command::Probe { reply } => {
                    let _ = reply.send(self.probe());
                }
                Command::Shutdown => break,
            }
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(stop) = self.engine_stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
        self.deps.fanout.broadcast(
            self.state.id,
            &ServerFrame::Error { message: "Game closed".to_string() },
            None,
        );
        self.deps.fanout.close_room(self.state.id);
        debug!(match_id = %self.state.id, "match actor stopped");
    }

    async fn handle_join(&mut self, user_id: String) -> Result<Participant, ServerError> {
        let name = self.display_name(&user_id).await;
        let joiner = self.state.join(&user_id, name);
        info!(match_id = %self.state.id, user_id = %joiner.id, role = %joiner.role, "joined");
        self.broadcast(self.player_joined_frame(&joiner));
        if self.state.mode == Mode::Ai {
            // announce the computer seat too, so late joiners see both players
            let bot_id = computer_id(self.state.id);
            if joiner.id != bot_id {
                if let Some(bot) = self.state.participant(&bot_id).cloned() {
                    self.broadcast(self.player_joined_frame(&bot));
                }
            }
        }
        Ok(joiner)
    }

    async fn handle_move(&mut self, player_id: &str, mv: Move) -> Result<(), ServerError> {
        let outcome = self.state.make_move(player_id, mv, Instant::now())?;
        debug!(match_id = %self.state.id, player_id, %mv, move_count = self.state.move_count, "move applied");
        self.broadcast(ServerFrame::GameUpdate {
            game_id: self.state.id.to_string(),
            user_id: player_id.to_string(),
            game_state: self.state.game_state(),
        });
        if outcome.record_results {
            self.record_results();
        }
        if outcome.schedule_reply {
            self.schedule_engine_reply();
        }
        Ok(())
    }

    async fn handle_engine_move(&mut self, mv: Move, at_move: u32) {
        if self.state.move_count != at_move || self.state.winner.is_some() {
            debug!(match_id = %self.state.id, "dropping stale computer reply");
            return;
        }
        let bot = computer_id(self.state.id);
        if let Err(err) = self.handle_move(&bot, mv).await {
            warn!(match_id = %self.state.id, %err, "computer reply rejected");
        }
    }

    fn handle_reset(&mut self, user_id: &str) -> Result<(), ServerError> {
        self.state.reset(user_id)?;
        // a reply computed for the old board must not land on the new one
        if let Some(stop) = self.engine_stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
        info!(match_id = %self.state.id, user_id, "game reset");
        self.broadcast(ServerFrame::GameReset {
            game_id: self.state.id.to_string(),
            message: "Game reset successfully".to_string(),
            game_state: self.state.game_state(),
        });
        Ok(())
    }

    fn handle_leave(&mut self, user_id: &str) {
        if self.state.leave(user_id).is_some() {
            info!(match_id = %self.state.id, user_id, "left");
            self.broadcast(ServerFrame::WatchersUpdate {
                game_id: self.state.id.to_string(),
                watchers_count: self.state.watchers,
            });
        }
    }

    fn probe(&self) -> MatchProbe {
        MatchProbe {
            players: self.state.player_count(),
            watchers: self.state.watchers,
            mode: self.state.mode,
            difficulty: self.state.difficulty,
            terminal_for: self.state.terminal_at.map(|at| at.elapsed()),
            game_state: self.state.game_state(),
        }
    }

    /// Compute the computer's answer off the executor: a short delay, then
    /// the engine in a blocking task under its deadline. The result
    /// re-enters through the mailbox like any other move.
    fn schedule_engine_reply(&mut self) {
        let board = self.state.board;
        let active = self.state.active;
        let difficulty = self.state.difficulty.unwrap_or_default();
        let depth = self.deps.config.search_depth;
        let delay = self.deps.config.reply_delay;
        let budget = self.deps.config.search_deadline;
        let at_move = self.state.move_count;
        let stop = Arc::new(AtomicBool::new(false));
        self.engine_stop = Some(stop.clone());
        let tx = self.tx.clone();
        let match_id = self.state.id;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let ctl = SearchCtl::new(stop, Instant::now() + budget);
            let picked = tokio::task::spawn_blocking(move || {
                let mut rng = rand::rng();
                Engine::new(difficulty).with_depth(depth).choose_move(&board, active, &ctl, &mut rng)
            })
            .await;
            match picked {
                Ok(Some(mv)) => {
                    let _ = tx.send(Command::EngineMove { mv, at_move }).await;
                }
                Ok(None) => debug!(%match_id, "computer had no move to make"),
                Err(err) => warn!(%match_id, %err, "computer search panicked"),
            }
        });
    }

    /// Post-game accounting runs detached so a slow store never blocks
    /// the executor; failures are logged and swallowed.
    fn record_results(&self) {
        let Some(report) = results::MatchReport::from_state(&self.state) else {
            return;
        };
        let store = self.deps.store.clone();
        info!(match_id = %self.state.id, winner = ?self.state.winner, "match finished");
        tokio::spawn(async move {
            results::record(store, report).await;
        });
    }

    fn player_joined_frame(&self, participant: &Participant) -> ServerFrame {
        ServerFrame::PlayerJoined {
            game_id: self.state.id.to_string(),
            user_id: participant.id.clone(),
            symbol: participant.mark,
            status: participant.role,
            watchers_count: self.state.watchers,
            mode: self.state.mode,
            ai_difficulty: self.state.difficulty,
            game_state: self.state.game_state(),
        }
    }

    fn broadcast(&self, frame: ServerFrame) {
        self.deps.fanout.broadcast(self.state.id, &frame, None);
    }

    async fn display_name(&self, user_id: &str) -> String {
        match self.deps.store.user_name(user_id).await {
            Ok(Some(name)) => name,
            Ok(None) => "Unknown".to_string(),
            Err(err) => {
                warn!(match_id = %self.state.id, user_id, %err, "name lookup failed");
                "Unknown".to_string()
            }
        }
    }
}
