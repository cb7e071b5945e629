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

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cogs::board::LINES;
use cogs::{ActiveBoard, Mark, MetaBoard, Move};

/// Evaluation score from the engine's point of view. Terminal positions
/// score `±(100 + remaining depth)` so that faster wins and slower losses
/// are preferred.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[must_use]
pub struct Score(pub i32);

const SCORE_MIN: Score = Score(i32::MIN + 1);
const SCORE_MAX: Score = Score(i32::MAX);

/// Cooperative cancellation for a single search: an external stop flag
/// plus a wall-clock deadline, polled between child expansions.
#[derive(Debug, Clone)]
pub struct SearchCtl {
    stop: Arc<AtomicBool>,
    deadline: Instant,
}

impl SearchCtl {
    /// Control block around an externally owned stop flag, so the owner
    /// can cancel the search after handing the control block away.
    pub fn new(stop: Arc<AtomicBool>, deadline: Instant) -> Self {
        Self { stop, deadline }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::new(Arc::new(AtomicBool::new(false)), deadline)
    }

    pub fn after(budget: Duration) -> Self {
        Self::with_deadline(Instant::now() + budget)
    }

    /// No deadline worth speaking of; cancellation only via the stop flag.
    pub fn unbounded() -> Self {
        Self::after(Duration::from_secs(60 * 60))
    }

    /// Shared handle that lets another thread cancel this search.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed) || Instant::now() >= self.deadline
    }
}

/// Depth-limited minimax with alpha-beta pruning. Returns the best root
/// move found before cancellation, which is the first legal move if not
/// even one child was fully evaluated. `None` only without legal moves.
pub(crate) fn best_move(
    board: &MetaBoard,
    active: ActiveBoard,
    engine: Mark,
    depth: u32,
    ctl: &SearchCtl,
) -> Option<Move> {
    let moves = board.legal_moves(active);
    let mut best = *moves.first()?;
    let mut best_score = SCORE_MIN;
    let mut alpha = SCORE_MIN;
    for &mv in &moves {
        if ctl.should_stop() {
            break;
        }
        let (child, child_active) = play(board, engine, mv);
        let score = minimax(&child, child_active, depth, false, alpha, SCORE_MAX, engine, ctl);
        if ctl.should_stop() {
            break; // the subtree was cut short, its score is not trustworthy
        }
        if score > best_score {
            best_score = score;
            best = mv;
            alpha = alpha.max(score);
        }
    }
    Some(best)
}

fn play(board: &MetaBoard, mark: Mark, mv: Move) -> (MetaBoard, ActiveBoard) {
    let mut child = *board;
    child.apply(mark, mv);
    (child, child.next_active_board(mv.cell))
}

#[expect(clippy::too_many_arguments)]
fn minimax(
    board: &MetaBoard,
    active: ActiveBoard,
    depth: u32,
    maximizing: bool,
    mut alpha: Score,
    mut beta: Score,
    engine: Mark,
    ctl: &SearchCtl,
) -> Score {
    if let Some(winner) = board.meta_winner() {
        return match winner.mark() {
            Some(mark) if mark == engine => Score(100 + depth as i32),
            Some(_) => Score(-100 - depth as i32),
            None => Score(0),
        };
    }
    if depth == 0 {
        return evaluate(board, engine);
    }
    let moves = board.legal_moves(active);
    debug_assert!(!moves.is_empty(), "undecided position without moves: {board}");
    let to_move = if maximizing { engine } else { engine.other() };
    let mut value = if maximizing { SCORE_MIN } else { SCORE_MAX };
    for &mv in &moves {
        if ctl.should_stop() {
            break;
        }
        let (child, child_active) = play(board, to_move, mv);
        let score = minimax(&child, child_active, depth - 1, !maximizing, alpha, beta, engine, ctl);
        if maximizing {
            value = value.max(score);
            alpha = alpha.max(score);
        } else {
            value = value.min(score);
            beta = beta.min(score);
        }
        if beta <= alpha {
            break;
        }
    }
    value
}

/// Pattern heuristic for non-terminal leaves: for every three-in-a-row
/// pattern of every sub-board, an uncontested pair counts 20, a lone
/// uncontested stone counts 2, with the sign of whoever holds it.
fn evaluate(board: &MetaBoard, engine: Mark) -> Score {
    let mut total = 0;
    for sub in cogs::SubBoardIdx::iter() {
        let own = board.sub_board(engine, sub);
        let their = board.sub_board(engine.other(), sub);
        for &line in &LINES {
            let own_held = (own & line).count_ones();
            let their_held = (their & line).count_ones();
            total += match (own_held, their_held) {
                (2, 0) => 20,
                (1, 0) => 2,
                (0, 2) => -20,
                (0, 1) => -2,
                _ => 0,
            };
        }
    }
    Score(total)
}
