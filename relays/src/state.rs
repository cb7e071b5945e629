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

//! The authoritative per-match state machine. Everything here is plain
//! synchronous state manipulation; the owning actor (see `actor`) is what
//! serializes access and talks to the outside world.

use std::time::Instant;

use cogs::{ActiveBoard, Mark, MetaBoard, Move, Winner};
use cranks::Difficulty;

use crate::error::ServerError;
use crate::participant::{Participant, Resolution, Role, computer_id, computer_participant};
use crate::wire::{Mode, WireGameState, WirePlayer};
use crate::MatchId;

/// What a successfully applied move obliges the caller to do next.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct MoveOutcome {
    /// The match just reached its terminal state and, being human vs.
    /// human, its result must be recorded exactly once.
    pub record_results: bool,
    /// It is now the computer's turn; a reply wants scheduling.
    pub schedule_reply: bool,
}

#[derive(Debug)]
pub struct MatchState {
    pub id: MatchId,
    pub mode: Mode,
    pub difficulty: Option<Difficulty>,
    pub board: MetaBoard,
    pub active: ActiveBoard,
    pub current: Option<Mark>,
    pub winner: Option<Winner>,
    pub move_count: u32,
    pub watchers: u32,
    pub participants: Vec<Participant>,
    pub last_move_at: Option<Instant>,
    pub created_at: Instant,
    pub terminal_at: Option<Instant>,
    results_recorded: bool,
}

impl MatchState {
    pub fn new(id: MatchId, mode: Mode, difficulty: Option<Difficulty>) -> Self {
        Self {
            id,
            mode,
            difficulty: if mode == Mode::Ai { difficulty.or(Some(Difficulty::default())) } else { None },
            board: MetaBoard::empty(),
            active: ActiveBoard::Any,
            current: None,
            winner: None,
            move_count: 0,
            watchers: 0,
            participants: Vec::new(),
            last_move_at: None,
            created_at: Instant::now(),
            terminal_at: None,
            results_recorded: false,
        }
    }

    /// A matchmade game: both players seated, X to move.
    pub fn prepopulated(id: MatchId, players: [(String, String); 2]) -> Self {
        let mut this = Self::new(id, Mode::Remote, None);
        for (order, (user_id, name)) in players.into_iter().enumerate() {
            this.participants.push(Participant {
                id: user_id,
                name,
                mark: Some(if order == 0 { Mark::X } else { Mark::O }),
                role: Role::Player,
                join_order: order as u32,
            });
        }
        this.current = Some(Mark::X);
        this
    }

    pub fn player_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_player()).count()
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == user_id)
    }

    /// Who is behind `player_id`: a seated participant, the synthesised
    /// computer player of this match, or nobody.
    pub fn resolve(&self, player_id: &str) -> Resolution {
        if let Some(p) = self.participant(player_id) {
            return Resolution::Found(p.clone());
        }
        if self.mode == Mode::Ai && player_id == computer_id(self.id) {
            return Resolution::Synthesised(computer_participant(self.id));
        }
        Resolution::Missing
    }

    /// Seat or re-seat a user. Joining is infallible: once the player
    /// seats are taken the user becomes a watcher. Re-joining returns the
    /// existing participant and changes nothing, in particular it does not
    /// count watchers twice.
    pub fn join(&mut self, user_id: &str, name: String) -> Participant {
        if let Some(existing) = self.participant(user_id) {
            return existing.clone();
        }
        let computer = computer_id(self.id);
        let seated = if self.mode == Mode::Ai && self.participant(&computer).is_none() {
            // first human in: seat them as X and the computer as O
            let human = Participant {
                id: user_id.to_string(),
                name,
                mark: Some(Mark::X),
                role: Role::Player,
                join_order: 0,
            };
            self.participants.push(human.clone());
            self.participants.push(computer_participant(self.id));
            human
        } else if self.mode == Mode::Remote && self.player_count() < 2 {
            let mark = if self.player_count() == 0 { Mark::X } else { Mark::O };
            let player = Participant {
                id: user_id.to_string(),
                name,
                mark: Some(mark),
                role: Role::Player,
                join_order: self.participants.len() as u32,
            };
            self.participants.push(player.clone());
            player
        } else {
            let watcher = Participant {
                id: user_id.to_string(),
                name,
                mark: None,
                role: Role::Watcher,
                join_order: self.participants.len() as u32,
            };
            self.watchers += 1;
            self.participants.push(watcher.clone());
            watcher
        };
        if seated.is_player() && self.current.is_none() {
            self.current = Some(Mark::X);
        }
        seated
    }

    /// Apply one move: rules validation, turn and role checks, then the
    /// board update, winner detection and the next active-board
    /// constraint, all in one step.
    pub fn make_move(
        &mut self,
        player_id: &str,
        mv: Move,
        now: Instant,
    ) -> Result<MoveOutcome, ServerError> {
        self.board.validate_move(self.active, self.winner, mv)?;
        let (participant, synthetic) = match self.resolve(player_id) {
            Resolution::Found(p) => (p, false),
            Resolution::Synthesised(p) => (p, true),
            Resolution::Missing => return Err(ServerError::player_not_found()),
        };
        if participant.role == Role::Watcher {
            return Err(ServerError::Forbidden("Watcher cannot make moves".to_string()));
        }
        let Some(mark) = participant.mark else {
            return Err(ServerError::Forbidden("Watcher cannot make moves".to_string()));
        };
        // the computer's id is proof enough that it is its own move
        if !synthetic && self.current != Some(mark) {
            return Err(ServerError::InvalidMove("Not your turn".to_string()));
        }

        self.board.apply(mark, mv);
        self.current = Some(mark.other());
        self.move_count += 1;
        self.last_move_at = Some(now);
        self.winner = self.board.meta_winner();
        self.active = if self.winner.is_some() {
            ActiveBoard::Any
        } else {
            self.board.next_active_board(mv.cell)
        };

        let mut outcome = MoveOutcome::default();
        if self.winner.is_some() {
            if self.terminal_at.is_none() {
                self.terminal_at = Some(now);
            }
            if !self.results_recorded {
                self.results_recorded = true;
                outcome.record_results = self.mode == Mode::Remote;
            }
        } else if self.mode == Mode::Ai && self.current == Some(Mark::O) {
            outcome.schedule_reply = true;
        }
        Ok(outcome)
    }

    /// Wipe the board for a rematch. Participants and the watcher count
    /// survive; a decisive previous winner opens the next game.
    pub fn reset(&mut self, user_id: &str) -> Result<(), ServerError> {
        let requester_is_player = self.participant(user_id).is_some_and(Participant::is_player);
        if !requester_is_player {
            return Err(ServerError::Forbidden("Only players can reset the game".to_string()));
        }
        let next_current = self.winner.and_then(Winner::mark).unwrap_or(Mark::X);
        self.board = MetaBoard::empty();
        self.active = ActiveBoard::Any;
        self.winner = None;
        self.move_count = 0;
        self.last_move_at = None;
        self.terminal_at = None;
        self.results_recorded = false;
        self.current = Some(next_current);
        Ok(())
    }

    /// Drop a participant. Watchers decrement the watcher counter; the
    /// caller is responsible for noticing when no players are left.
    pub fn leave(&mut self, user_id: &str) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| p.id == user_id)?;
        let gone = self.participants.remove(idx);
        if gone.role == Role::Watcher {
            self.watchers = self.watchers.saturating_sub(1);
        }
        Some(gone)
    }

    pub fn game_state(&self) -> WireGameState {
        WireGameState {
            players: self
                .participants
                .iter()
                .map(|p| WirePlayer {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    symbol: p.mark,
                    status: p.role,
                    join_order: p.join_order,
                })
                .collect(),
            global_board: self.board.cells(),
            active_board: self.active.index().map(|b| b.get()),
            move_count: self.move_count,
            winner: self.winner,
            current_player: self.current,
        }
    }
}
