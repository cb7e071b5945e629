/*
 *  Cogs, the board logic of a realtime Super Tic-Tac-Toe server.
 *  Copyright (C) 2025 ToTheAnd
 *
 *  Cogs is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  Cogs is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with Cogs. If not, see <https://www.gnu.org/licenses/>.
 */

use std::fmt;
use std::fmt::{Display, Formatter};

use arrayvec::ArrayVec;
use rand::Rng;
use thiserror::Error;

use crate::square::{CellIdx, Move, SubBoardIdx};
use crate::{Mark, Winner};

#[cfg(test)]
mod board_tests;

/// Why a move was rejected by the rules.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum RulesError {
    #[error("the game is already over")]
    GameOver,
    #[error("cell is already occupied")]
    CellOccupied,
    #[error("move must be played in sub-board {0}")]
    WrongSubBoard(SubBoardIdx),
}

#[derive(Debug, Error)]
pub enum ParseBoardError {
    #[error("board text must contain exactly 81 cells, got {0}")]
    BadLength(usize),
    #[error("unexpected board character {0:?}")]
    BadChar(char),
}

/// The sub-board the next move must land in.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
#[must_use]
pub enum ActiveBoard {
    /// Unconstrained: any open sub-board is playable.
    #[default]
    Any,
    Only(SubBoardIdx),
}

impl ActiveBoard {
    pub fn index(self) -> Option<SubBoardIdx> {
        match self {
            ActiveBoard::Any => None,
            ActiveBoard::Only(board) => Some(board),
        }
    }
}

impl Display for ActiveBoard {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ActiveBoard::Any => write!(f, "any"),
            ActiveBoard::Only(board) => write!(f, "{board}"),
        }
    }
}

/// All cells of one sub-board as a 9-bit mask, bit `i` = cell `i`.
pub type SubBits = u16;

const SUB_BOARD_MASK: SubBits = 0x1ff;

/// The 8 three-in-a-row patterns of a 3x3 board: rows, columns, diagonals.
pub const LINES: [SubBits; 8] = [
    0b000_000_111,
    0b000_111_000,
    0b111_000_000,
    0b001_001_001,
    0b010_010_010,
    0b100_100_100,
    0b100_010_001,
    0b001_010_100,
];

/// The full meta-board. Bits 0..81 of each player bitboard are cells in
/// board-major order; bits 81..90 flag sub-boards won by that player.
/// `open` holds the squares where a stone can still be placed, which is
/// not the same as the empty squares: a decided sub-board is closed.
///
/// A decisively won sub-board has all nine of its cells filled with the
/// winner's mark. That keeps the cell array presented to clients in sync
/// with the sub-board verdict without a second lookup table.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[must_use]
pub struct MetaBoard {
    colors: [u128; 2],
    open: u128,
}

const CELLS_MASK: u128 = (1 << 81) - 1;

impl Default for MetaBoard {
    fn default() -> Self {
        Self { colors: [0; 2], open: CELLS_MASK }
    }
}

impl MetaBoard {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse 81 characters, board-major: `.` or space for empty, `x`/`o`
    /// stones (case-insensitive). Sub-board verdicts are recomputed.
    pub fn from_text(text: &str) -> Result<Self, ParseBoardError> {
        let mut this = Self::empty();
        let mut count = 0;
        for (idx, c) in text.chars().enumerate() {
            let mark = match c {
                '.' | ' ' => None,
                'x' | 'X' => Some(Mark::X),
                'o' | 'O' => Some(Mark::O),
                _ => return Err(ParseBoardError::BadChar(c)),
            };
            if let Some(mark) = mark {
                if idx < 81 {
                    let bit = 1u128 << idx;
                    this.colors[mark.bb_idx()] |= bit;
                    this.open &= !bit;
                }
            }
            count = idx + 1;
        }
        if count != 81 {
            return Err(ParseBoardError::BadLength(count));
        }
        for board in SubBoardIdx::iter() {
            for mark in [Mark::X, Mark::O] {
                if LINES.iter().any(|&line| this.sub_board(mark, board) & line == line) {
                    this.close_won(mark, board);
                }
            }
        }
        Ok(this)
    }

    pub fn cell(&self, board: SubBoardIdx, cell: CellIdx) -> Option<Mark> {
        let bit = 1u128 << (board.index() * 9 + cell.index());
        if self.colors[Mark::X.bb_idx()] & bit != 0 {
            Some(Mark::X)
        } else if self.colors[Mark::O.bb_idx()] & bit != 0 {
            Some(Mark::O)
        } else {
            None
        }
    }

    pub fn is_occupied(&self, mv: Move) -> bool {
        (self.colors[0] | self.colors[1]) & (1u128 << mv.bb_idx()) != 0
    }

    pub fn occupied_count(&self) -> u32 {
        ((self.colors[0] | self.colors[1]) & CELLS_MASK).count_ones()
    }

    /// One player's stones on one sub-board.
    pub fn sub_board(&self, mark: Mark, board: SubBoardIdx) -> SubBits {
        ((self.colors[mark.bb_idx()] >> (board.index() * 9)) as SubBits) & SUB_BOARD_MASK
    }

    pub fn occupied_sub_board(&self, board: SubBoardIdx) -> SubBits {
        (((self.colors[0] | self.colors[1]) >> (board.index() * 9)) as SubBits) & SUB_BOARD_MASK
    }

    pub fn open_sub_board(&self, board: SubBoardIdx) -> SubBits {
        ((self.open >> (board.index() * 9)) as SubBits) & SUB_BOARD_MASK
    }

    pub fn is_sub_board_won(&self, mark: Mark, board: SubBoardIdx) -> bool {
        self.colors[mark.bb_idx()] & (1u128 << (81 + board.index())) != 0
    }

    pub fn is_sub_board_open(&self, board: SubBoardIdx) -> bool {
        self.open_sub_board(board) != 0
    }

    pub fn is_full(&self) -> bool {
        self.open == 0
    }

    /// How many sub-boards `mark` has decisively won.
    pub fn won_count(&self, mark: Mark) -> u32 {
        (self.colors[mark.bb_idx()] >> 81).count_ones()
    }

    /// Verdict of a single sub-board: a decisive winner, a tie once all
    /// nine cells are set without a line, or `None` while still live.
    pub fn local_winner(&self, board: SubBoardIdx) -> Option<Winner> {
        if self.is_sub_board_won(Mark::X, board) {
            Some(Winner::X)
        } else if self.is_sub_board_won(Mark::O, board) {
            Some(Winner::O)
        } else if self.occupied_sub_board(board) == SUB_BOARD_MASK {
            Some(Winner::Tie)
        } else {
            None
        }
    }

    /// Verdict of the whole game, by count of won sub-boards: undecided
    /// while any sub-board is still live, then a strict majority of won
    /// sub-boards wins and an equal count is a tie.
    pub fn meta_winner(&self) -> Option<Winner> {
        let mut x = 0u32;
        let mut o = 0u32;
        for board in SubBoardIdx::iter() {
            match self.local_winner(board)? {
                Winner::X => x += 1,
                Winner::O => o += 1,
                Winner::Tie => (),
            }
        }
        Some(if x > o {
            Winner::X
        } else if o > x {
            Winner::O
        } else {
            Winner::Tie
        })
    }

    /// Where the move after one played on `last_cell` must go: the
    /// sub-board with the same index, relaxed to `Any` once that
    /// sub-board is closed.
    pub fn next_active_board(&self, last_cell: CellIdx) -> ActiveBoard {
        let target = last_cell.sends_to();
        if self.is_sub_board_open(target) { ActiveBoard::Only(target) } else { ActiveBoard::Any }
    }

    pub fn validate_move(
        &self,
        active: ActiveBoard,
        winner: Option<Winner>,
        mv: Move,
    ) -> Result<(), RulesError> {
        if winner.is_some() {
            return Err(RulesError::GameOver);
        }
        if self.is_occupied(mv) {
            return Err(RulesError::CellOccupied);
        }
        if let ActiveBoard::Only(required) = active {
            if mv.board != required {
                return Err(RulesError::WrongSubBoard(required));
            }
        }
        Ok(())
    }

    /// Place `mark` on the board. The caller must have validated the move.
    /// A move that completes a line closes its sub-board and fills it with
    /// the winner's mark.
    pub fn apply(&mut self, mark: Mark, mv: Move) {
        debug_assert!(!self.is_occupied(mv), "{self} {mv}");
        let bit = 1u128 << mv.bb_idx();
        self.colors[mark.bb_idx()] |= bit;
        self.open &= !bit;
        if Self::wins_through(self.sub_board(mark, mv.board), mv.cell) {
            self.close_won(mark, mv.board);
        }
    }

    /// Would placing `mark` on `mv` complete a line in that sub-board?
    pub fn completes_sub_board(&self, mark: Mark, mv: Move) -> bool {
        let bits = self.sub_board(mark, mv.board) | (1 << mv.cell.index());
        Self::wins_through(bits, mv.cell)
    }

    /// Does `bits` contain a completed line through `cell`? The two
    /// diagonals are checked unconditionally; a hit there without the
    /// cell being on it still means the board is won, just elsewhere.
    fn wins_through(bits: SubBits, cell: CellIdx) -> bool {
        let row = 0b111 << (3 * cell.row());
        let column = 0b001_001_001 << cell.column();
        if bits & row == row || bits & column == column {
            return true;
        }
        const DIAG: SubBits = 0b100_010_001;
        const ANTI_DIAG: SubBits = 0b001_010_100;
        bits & DIAG == DIAG || bits & ANTI_DIAG == ANTI_DIAG
    }

    fn close_won(&mut self, mark: Mark, board: SubBoardIdx) {
        let fill = (SUB_BOARD_MASK as u128) << (board.index() * 9);
        self.colors[mark.bb_idx()] |= fill | (1u128 << (81 + board.index()));
        self.colors[mark.other().bb_idx()] &= !fill;
        self.open &= !fill;
        debug_assert!(self.is_sub_board_won(mark, board));
        debug_assert!(!self.is_sub_board_open(board));
    }

    /// All moves allowed under the active-board constraint.
    pub fn legal_moves(&self, active: ActiveBoard) -> ArrayVec<Move, 81> {
        let mut moves = ArrayVec::new();
        match active {
            ActiveBoard::Only(board) => {
                let mut bits = self.open_sub_board(board);
                while bits != 0 {
                    let cell = CellIdx::unchecked(bits.trailing_zeros() as u8);
                    moves.push(Move::new(board, cell));
                    bits &= bits - 1;
                }
            }
            ActiveBoard::Any => {
                let mut bits = self.open;
                while bits != 0 {
                    moves.push(Move::from_bb_idx(bits.trailing_zeros() as usize));
                    bits &= bits - 1;
                }
            }
        }
        moves
    }

    pub fn random_move<R: Rng>(&self, active: ActiveBoard, rng: &mut R) -> Option<Move> {
        let moves = self.legal_moves(active);
        if moves.is_empty() { None } else { Some(moves[rng.random_range(0..moves.len())]) }
    }

    /// The 9x9 cell array in the shape clients see.
    pub fn cells(&self) -> [[Option<Mark>; 9]; 9] {
        let mut out = [[None; 9]; 9];
        for board in SubBoardIdx::iter() {
            for cell in CellIdx::iter() {
                out[board.index()][cell.index()] = self.cell(board, cell);
            }
        }
        out
    }
}

impl Display for MetaBoard {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for board in SubBoardIdx::iter() {
            for cell in CellIdx::iter() {
                let c = match self.cell(board, cell) {
                    Some(Mark::X) => 'x',
                    Some(Mark::O) => 'o',
                    None => '.',
                };
                write!(f, "{c}")?;
            }
            if board.index() != 8 {
                write!(f, "/")?;
            }
        }
        Ok(())
    }
}
