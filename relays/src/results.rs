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

//! Post-game accounting. Only human-vs-human matches reach this module;
//! computer games never touch user stats. Everything here is best-effort:
//! a store failure is logged and the match stays finished.

use std::sync::Arc;

use tracing::{debug, error};

use cogs::{Mark, Winner};

use crate::state::MatchState;
use crate::store::{GameOutcome, GameRecord, UserStore};
use crate::wire::Mode;

/// Snapshot of everything scoring needs, detached from the live state.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub players: Vec<(String, Mark)>,
    pub winner: Winner,
    pub x_boards: u32,
    pub o_boards: u32,
    pub move_count: u32,
}

impl MatchReport {
    /// `None` unless the match is a finished human-vs-human game.
    pub fn from_state(state: &MatchState) -> Option<Self> {
        if state.mode != Mode::Remote {
            return None;
        }
        let winner = state.winner?;
        let players = state
            .participants
            .iter()
            .filter(|p| p.is_player())
            .filter_map(|p| Some((p.id.clone(), p.mark?)))
            .collect();
        Some(Self {
            players,
            winner,
            x_boards: state.board.won_count(Mark::X),
            o_boards: state.board.won_count(Mark::O),
            move_count: state.move_count,
        })
    }

    fn outcome_for(&self, mark: Mark) -> GameOutcome {
        match self.winner.mark() {
            None => GameOutcome::Draw,
            Some(winning) if winning == mark => GameOutcome::Win,
            Some(_) => GameOutcome::Loss,
        }
    }

    /// Sub-boards won by `mark` minus sub-boards won by the opponent.
    fn margin_for(&self, mark: Mark) -> i32 {
        let (own, theirs) = match mark {
            Mark::X => (self.x_boards, self.o_boards),
            Mark::O => (self.o_boards, self.x_boards),
        };
        own as i32 - theirs as i32
    }

    /// The game never tracks its start time, so the reported duration is
    /// the long-standing five-seconds-per-move approximation.
    fn duration_seconds(&self) -> u32 {
        self.move_count * 5
    }
}

/// Points awarded for one player's result, shaded by how lopsided the
/// sub-board count was: dominant wins earn extra, narrow losses cost less.
pub fn points_for(outcome: GameOutcome, margin: i32) -> i32 {
    match outcome {
        GameOutcome::Win => {
            let bonus = if margin >= 5 {
                10
            } else if margin >= 3 {
                5
            } else {
                0
            };
            25 + bonus
        }
        GameOutcome::Loss => {
            let rebate = if margin >= -1 {
                5
            } else if margin >= -2 {
                3
            } else {
                0
            };
            -10 + rebate
        }
        GameOutcome::Draw => 5,
    }
}

/// Write one record per known player. Unknown users (no row in the user
/// store) are skipped, exactly like a guest account would be.
pub async fn record(store: Arc<dyn UserStore>, report: MatchReport) {
    for (user_id, mark) in &report.players {
        match store.user_name(user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(user_id, "skipping result for unknown user");
                continue;
            }
            Err(err) => {
                error!(user_id, %err, "result lookup failed");
                continue;
            }
        }
        let outcome = report.outcome_for(*mark);
        let points = points_for(outcome, report.margin_for(*mark));
        let opponent_name = match report.players.iter().find(|(id, _)| id != user_id) {
            Some((opponent_id, _)) => {
                Some(store.user_name(opponent_id).await.ok().flatten().unwrap_or_else(|| "Unknown".to_string()))
            }
            None => None,
        };
        let entry = GameRecord {
            user_id: user_id.clone(),
            outcome,
            opponent_name,
            duration_seconds: report.duration_seconds(),
            points_delta: points,
        };
        if let Err(err) = store.append_result(entry).await {
            error!(user_id, %err, "failed to append game result");
        }
        if let Err(err) = store.bump_stats(user_id, outcome, points).await {
            error!(user_id, %err, "failed to bump user stats");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_bonuses_scale_with_margin() {
        assert_eq!(points_for(GameOutcome::Win, 1), 25);
        assert_eq!(points_for(GameOutcome::Win, 3), 30);
        assert_eq!(points_for(GameOutcome::Win, 4), 30);
        assert_eq!(points_for(GameOutcome::Win, 5), 35);
        assert_eq!(points_for(GameOutcome::Win, 9), 35);
    }

    #[test]
    fn narrow_losses_are_softened() {
        assert_eq!(points_for(GameOutcome::Loss, -1), -5);
        assert_eq!(points_for(GameOutcome::Loss, -2), -7);
        assert_eq!(points_for(GameOutcome::Loss, -5), -10);
        assert_eq!(points_for(GameOutcome::Draw, 0), 5);
    }
}
