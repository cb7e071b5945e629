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

//! Rules of Super Tic-Tac-Toe (also known as Ultimate Tic-Tac-Toe):
//! a 3x3 meta-board whose squares are themselves 3x3 tic-tac-toe boards.
//! Each move is constrained to the sub-board named by the previous move's
//! cell index, unless that sub-board is already closed.
//!
//! This crate is purely the game model; it knows nothing about sessions,
//! sockets or persistence.

pub mod board;
pub mod square;

use std::ops::Not;

use serde::{Deserialize, Serialize};

pub use board::{ActiveBoard, MetaBoard, ParseBoardError, RulesError};
pub use square::{CellIdx, Move, SubBoardIdx};

/// A player's stone. Unlike [`Winner`], a tie is not representable:
/// cells only ever hold an actual stone.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, derive_more::Display)]
#[must_use]
pub enum Mark {
    #[default]
    X = 0,
    O = 1,
}

impl Mark {
    pub fn other(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub(crate) fn bb_idx(self) -> usize {
        self as usize
    }
}

impl Not for Mark {
    type Output = Self;

    fn not(self) -> Self::Output {
        self.other()
    }
}

/// The verdict of a decided sub-board or a finished game.
/// Serialized as `"X"`, `"O"` or `"T"` on the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, derive_more::Display)]
#[must_use]
pub enum Winner {
    X,
    O,
    #[serde(rename = "T")]
    #[display("T")]
    Tie,
}

impl Winner {
    /// The winning mark, or `None` for a tie.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Winner::X => Some(Mark::X),
            Winner::O => Some(Mark::O),
            Winner::Tie => None,
        }
    }
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

#[cfg(test)]
mod mark_tests {
    use super::*;

    #[test]
    fn wire_spelling() {
        assert_eq!(serde_json::to_string(&Mark::X).unwrap(), "\"X\"");
        assert_eq!(serde_json::to_string(&Winner::O).unwrap(), "\"O\"");
        assert_eq!(serde_json::to_string(&Winner::Tie).unwrap(), "\"T\"");
        let back: Winner = serde_json::from_str("\"T\"").unwrap();
        assert_eq!(back, Winner::Tie);
    }

    #[test]
    fn other_flips() {
        assert_eq!(Mark::X.other(), Mark::O);
        assert_eq!(!Mark::O, Mark::X);
        assert_eq!(Winner::from(Mark::X).mark(), Some(Mark::X));
        assert_eq!(Winner::Tie.mark(), None);
    }
}
