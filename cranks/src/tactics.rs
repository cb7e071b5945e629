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

use cogs::{Mark, MetaBoard, Move};

/// The fixed-priority tactical chain: complete an own sub-board, block the
/// opponent from completing one, take a center, take a corner. Within one
/// priority the first candidate in move order wins.
pub(crate) fn tactical_move(board: &MetaBoard, moves: &[Move], mark: Mark) -> Option<Move> {
    moves
        .iter()
        .copied()
        .find(|&mv| board.completes_sub_board(mark, mv))
        .or_else(|| moves.iter().copied().find(|&mv| board.completes_sub_board(mark.other(), mv)))
        .or_else(|| moves.iter().copied().find(|mv| mv.cell.is_center()))
        .or_else(|| moves.iter().copied().find(|mv| mv.cell.is_corner()))
}
