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

/// Index of one of the nine sub-boards, row-major over the meta-board.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct SubBoardIdx(u8);

/// Index of a cell within a sub-board, row-major.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct CellIdx(u8);

impl SubBoardIdx {
    pub const COUNT: usize = 9;

    pub fn new(idx: u8) -> Option<Self> {
        (idx < 9).then_some(Self(idx))
    }

    pub fn unchecked(idx: u8) -> Self {
        debug_assert!(idx < 9);
        Self(idx)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn iter() -> impl Iterator<Item = Self> {
        (0..9).map(Self)
    }
}

impl CellIdx {
    pub fn new(idx: u8) -> Option<Self> {
        (idx < 9).then_some(Self(idx))
    }

    pub fn unchecked(idx: u8) -> Self {
        debug_assert!(idx < 9);
        Self(idx)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn row(self) -> u8 {
        self.0 / 3
    }

    pub fn column(self) -> u8 {
        self.0 % 3
    }

    /// The sub-board the *next* move is sent to when this cell is played.
    pub fn sends_to(self) -> SubBoardIdx {
        SubBoardIdx(self.0)
    }

    pub fn is_center(self) -> bool {
        self.0 == 4
    }

    pub fn is_corner(self) -> bool {
        matches!(self.0, 0 | 2 | 6 | 8)
    }

    pub fn iter() -> impl Iterator<Item = Self> {
        (0..9).map(Self)
    }
}

impl Display for SubBoardIdx {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for CellIdx {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A move: place the active player's mark on `cell` of sub-board `board`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[must_use]
pub struct Move {
    pub board: SubBoardIdx,
    pub cell: CellIdx,
}

impl Move {
    pub fn new(board: SubBoardIdx, cell: CellIdx) -> Self {
        Self { board, cell }
    }

    /// Bit index in board-major order, 0..81.
    pub fn bb_idx(self) -> usize {
        self.board.index() * 9 + self.cell.index()
    }

    pub fn from_bb_idx(idx: usize) -> Self {
        debug_assert!(idx < 81);
        Self { board: SubBoardIdx((idx / 9) as u8), cell: CellIdx((idx % 9) as u8) }
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.board, self.cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bb_idx_roundtrip() {
        for idx in 0..81 {
            let mv = Move::from_bb_idx(idx);
            assert_eq!(mv.bb_idx(), idx);
        }
        assert!(SubBoardIdx::new(9).is_none());
        assert!(CellIdx::new(42).is_none());
    }

    #[test]
    fn cell_classification() {
        assert!(CellIdx::unchecked(4).is_center());
        for c in [0u8, 2, 6, 8] {
            assert!(CellIdx::unchecked(c).is_corner());
        }
        assert!(!CellIdx::unchecked(1).is_corner());
        assert_eq!(CellIdx::unchecked(7).sends_to(), SubBoardIdx::unchecked(7));
    }
}
