/*
 *  Cranks, a computer opponent for Super Tic-Tac-Toe.
 *  Copyright (C) 2025 ToTheAnd
 *
 *  Cranks is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  Cranks is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with Cranks. If not, see <https://www.gnu.org/licenses/>.
 */

//! The computer player. Difficulty blends three move sources: uniformly
//! random moves, a short tactical priority chain, and a depth-limited
//! minimax with alpha-beta pruning. Searches are cooperatively
//! cancellable so that match teardown never leaks CPU.

mod search;
mod tactics;

use rand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use cogs::{ActiveBoard, Mark, MetaBoard, Move};

pub use search::{Score, SearchCtl};

/// Engine strength. `Easy` and `Medium` trade tactical play against
/// random moves; `Hard` falls through to the minimax search.
#[derive(
    Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// A configured computer player for one side.
#[derive(Debug, Clone)]
pub struct Engine {
    difficulty: Difficulty,
    mark: Mark,
    depth: u32,
}

impl Engine {
    /// Search depth below the root on `Hard`.
    pub const DEFAULT_DEPTH: u32 = 2;

    /// The server-side opponent always plays O; the human takes X.
    pub fn new(difficulty: Difficulty) -> Self {
        Self::for_mark(difficulty, Mark::O)
    }

    pub fn for_mark(difficulty: Difficulty, mark: Mark) -> Self {
        Self { difficulty, mark, depth: Self::DEFAULT_DEPTH }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn mark(&self) -> Mark {
        self.mark
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Pick the engine's next move, `None` when there is none to make.
    /// On cancellation or an expired deadline this degrades to the best
    /// move found so far and ultimately to the first legal move; it never
    /// blocks past the next cooperative checkpoint.
    pub fn choose_move<R: Rng>(
        &self,
        board: &MetaBoard,
        active: ActiveBoard,
        ctl: &SearchCtl,
        rng: &mut R,
    ) -> Option<Move> {
        let moves = board.legal_moves(active);
        if moves.is_empty() {
            return None;
        }
        let mv = match self.difficulty {
            Difficulty::Easy => self
                .maybe_tactical(board, &moves, 0.3, rng)
                .unwrap_or_else(|| moves[rng.random_range(0..moves.len())]),
            Difficulty::Medium => self
                .maybe_tactical(board, &moves, 0.7, rng)
                .unwrap_or_else(|| moves[rng.random_range(0..moves.len())]),
            Difficulty::Hard => tactics::tactical_move(board, &moves, self.mark)
                .or_else(|| search::best_move(board, active, self.mark, self.depth, ctl))
                .unwrap_or(moves[0]),
        };
        Some(mv)
    }

    fn maybe_tactical<R: Rng>(
        &self,
        board: &MetaBoard,
        moves: &[Move],
        tactical_chance: f64,
        rng: &mut R,
    ) -> Option<Move> {
        if rng.random_bool(tactical_chance) {
            tactics::tactical_move(board, moves, self.mark)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::{Duration, Instant};

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use cogs::SubBoardIdx;

    #[test]
    fn difficulty_spellings() {
        assert_eq!(Difficulty::from_str("hard").unwrap(), Difficulty::Hard);
        assert_eq!(Difficulty::from_str("EASY").unwrap(), Difficulty::Easy);
        assert!(Difficulty::from_str("impossible").is_err());
        assert_eq!(serde_json::to_string(&Difficulty::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn all_difficulties_stay_legal() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = MetaBoard::empty();
        board.apply(Mark::X, Move::from_bb_idx(4 * 9 + 4));
        let active = ActiveBoard::Only(SubBoardIdx::unchecked(4));
        let ctl = SearchCtl::with_deadline(Instant::now() + Duration::from_secs(1));
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            for _ in 0..20 {
                let engine = Engine::new(difficulty);
                let mv = engine.choose_move(&board, active, &ctl, &mut rng).unwrap();
                assert!(board.validate_move(active, None, mv).is_ok(), "{difficulty}: {mv}");
            }
        }
    }

    #[test]
    fn no_moves_yields_none() {
        let mut rng = StdRng::seed_from_u64(0);
        let text = "xxx......".repeat(5) + &"ooo......".repeat(4);
        let board = MetaBoard::from_text(&text).unwrap();
        assert!(board.is_full());
        let ctl = SearchCtl::unbounded();
        assert!(Engine::new(Difficulty::Hard).choose_move(&board, ActiveBoard::Any, &ctl, &mut rng).is_none());
    }
}
