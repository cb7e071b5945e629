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

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::board::{ActiveBoard, MetaBoard, RulesError};
use crate::square::{CellIdx, Move, SubBoardIdx};
use crate::{Mark, Winner};

fn mv(board: u8, cell: u8) -> Move {
    Move::new(SubBoardIdx::new(board).unwrap(), CellIdx::new(cell).unwrap())
}

/// A full 3x3 board with no three-in-a-row for either player.
const TIE_SUB_BOARD: &str = "xoxxoooxx";

#[test]
fn column_win_closes_and_fills_sub_board() {
    let mut board = MetaBoard::empty();
    board.apply(Mark::X, mv(0, 0));
    board.apply(Mark::O, mv(0, 1));
    board.apply(Mark::X, mv(0, 3));
    board.apply(Mark::O, mv(0, 2));
    assert_eq!(board.local_winner(SubBoardIdx::unchecked(0)), None);
    board.apply(Mark::X, mv(0, 6));

    assert_eq!(board.local_winner(SubBoardIdx::unchecked(0)), Some(Winner::X));
    assert!(!board.is_sub_board_open(SubBoardIdx::unchecked(0)));
    // the whole sub-board now reads as the winner's mark, O's stones included
    for cell in CellIdx::iter() {
        assert_eq!(board.cell(SubBoardIdx::unchecked(0), cell), Some(Mark::X));
    }
    assert_eq!(board.won_count(Mark::X), 1);
    assert_eq!(board.won_count(Mark::O), 0);
}

#[test]
fn full_sub_board_without_line_is_a_tie() {
    let text = format!("{TIE_SUB_BOARD}{}", ".".repeat(72));
    let board = MetaBoard::from_text(&text).unwrap();
    assert_eq!(board.local_winner(SubBoardIdx::unchecked(0)), Some(Winner::Tie));
    assert!(!board.is_sub_board_open(SubBoardIdx::unchecked(0)));
    // tied boards keep their stones
    assert_eq!(board.cell(SubBoardIdx::unchecked(0), CellIdx::unchecked(1)), Some(Mark::O));
    assert_eq!(board.meta_winner(), None);
}

#[test]
fn meta_winner_requires_all_sub_boards_decided() {
    // five boards for x, three for o, one still live
    let mut text = String::new();
    for _ in 0..5 {
        text.push_str("xxx......");
    }
    for _ in 0..3 {
        text.push_str("ooo......");
    }
    text.push_str(".........");
    let board = MetaBoard::from_text(&text).unwrap();
    assert_eq!(board.won_count(Mark::X), 5);
    assert_eq!(board.meta_winner(), None);

    // deciding the last board decides the game by majority
    text.truncate(72);
    text.push_str(TIE_SUB_BOARD);
    let board = MetaBoard::from_text(&text).unwrap();
    assert_eq!(board.meta_winner(), Some(Winner::X));
}

#[test]
fn equal_sub_board_counts_tie_the_game() {
    let mut text = String::new();
    for _ in 0..4 {
        text.push_str("xxx......");
    }
    for _ in 0..4 {
        text.push_str("ooo......");
    }
    text.push_str(TIE_SUB_BOARD);
    let board = MetaBoard::from_text(&text).unwrap();
    assert_eq!(board.meta_winner(), Some(Winner::Tie));
}

#[test]
fn active_board_follows_the_last_cell() {
    let mut board = MetaBoard::empty();
    board.apply(Mark::X, mv(4, 0));
    let active = board.next_active_board(CellIdx::unchecked(0));
    assert_eq!(active, ActiveBoard::Only(SubBoardIdx::unchecked(0)));

    // playing outside the active sub-board is rejected, an empty target cell
    // notwithstanding
    assert_eq!(
        board.validate_move(active, None, mv(5, 0)),
        Err(RulesError::WrongSubBoard(SubBoardIdx::unchecked(0)))
    );
    assert_eq!(board.validate_move(active, None, mv(0, 8)), Ok(()));
}

#[test]
fn active_board_relaxes_once_the_target_is_closed() {
    let mut board = MetaBoard::empty();
    board.apply(Mark::X, mv(0, 0));
    board.apply(Mark::X, mv(0, 4));
    board.apply(Mark::X, mv(0, 8));
    assert!(!board.is_sub_board_open(SubBoardIdx::unchecked(0)));

    // a move whose cell index points at the closed board frees the opponent
    assert_eq!(board.next_active_board(CellIdx::unchecked(0)), ActiveBoard::Any);
    let moves = board.legal_moves(ActiveBoard::Any);
    assert_eq!(moves.len(), 81 - 9);
    assert!(moves.iter().all(|m| m.board != SubBoardIdx::unchecked(0)));
}

#[test]
fn occupied_and_game_over_rejections() {
    let mut board = MetaBoard::empty();
    board.apply(Mark::X, mv(4, 4));
    assert_eq!(
        board.validate_move(ActiveBoard::Any, None, mv(4, 4)),
        Err(RulesError::CellOccupied)
    );
    assert_eq!(
        board.validate_move(ActiveBoard::Any, Some(Winner::X), mv(3, 3)),
        Err(RulesError::GameOver)
    );
}

#[test]
fn legal_moves_confined_to_active_sub_board() {
    let mut board = MetaBoard::empty();
    board.apply(Mark::X, mv(4, 4));
    let moves = board.legal_moves(ActiveBoard::Only(SubBoardIdx::unchecked(4)));
    assert_eq!(moves.len(), 8);
    assert!(moves.iter().all(|m| m.board == SubBoardIdx::unchecked(4)));
    assert_eq!(board.legal_moves(ActiveBoard::Any).len(), 80);
}

#[test]
fn from_text_rejects_malformed_input() {
    assert!(MetaBoard::from_text("x").is_err());
    assert!(MetaBoard::from_text(&"q".repeat(81)).is_err());
    let board = MetaBoard::from_text(&".".repeat(81)).unwrap();
    assert_eq!(board, MetaBoard::empty());
}

proptest! {
    /// Random playouts uphold the board invariants: a move always lands on
    /// an empty cell of an open sub-board, the winner appears exactly when
    /// every sub-board is decided, and the stone count never falls behind
    /// the ply count.
    #[test]
    fn random_playouts_respect_invariants(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut board = MetaBoard::empty();
        let mut active = ActiveBoard::Any;
        let mut mark = Mark::X;
        let mut plies = 0u32;
        while board.meta_winner().is_none() {
            let mv = board.random_move(active, &mut rng).expect("undecided game must have moves");
            prop_assert!(board.validate_move(active, None, mv).is_ok());
            prop_assert!(!board.is_occupied(mv));
            board.apply(mark, mv);
            active = board.next_active_board(mv.cell);
            mark = mark.other();
            plies += 1;
            prop_assert!(board.occupied_count() >= plies);
            prop_assert!(plies <= 81);
        }
        prop_assert!(board.is_full());
        let winner = board.meta_winner();
        prop_assert_eq!(board.meta_winner(), winner);
        let (x, o) = (board.won_count(Mark::X), board.won_count(Mark::O));
        match winner.unwrap() {
            Winner::X => prop_assert!(x > o),
            Winner::O => prop_assert!(o > x),
            Winner::Tie => prop_assert_eq!(x, o),
        }
    }
}
