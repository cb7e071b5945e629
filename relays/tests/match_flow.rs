//! End-to-end flows through the match actor: joining, the active-board
//! constraint, full games, resets and result accounting.

mod common;

use std::time::Duration;

use cogs::{CellIdx, Mark, Move, SubBoardIdx, Winner};
use relays::ServerError;
use relays::participant::Role;
use relays::store::GameOutcome;
use relays::wire::{Mode, ServerFrame};

use common::{attach_peer, frame_matching, next_frame, play_out, test_app};

fn mv(board: u8, cell: u8) -> Move {
    Move::new(SubBoardIdx::new(board).unwrap(), CellIdx::new(cell).unwrap())
}

#[tokio::test]
async fn join_assigns_seats_and_broadcasts() {
    let (app, store) = test_app();
    store.insert_user("alice", "Alice");
    let handle = app.registry.create(Mode::Remote, None);
    let mut rx = attach_peer(&app, handle.id(), "alice");

    let alice = handle.join("alice").await.unwrap();
    assert_eq!(alice.mark, Some(Mark::X));
    assert_eq!(alice.role, Role::Player);
    assert_eq!(alice.name, "Alice");

    match next_frame(&mut rx).await {
        ServerFrame::PlayerJoined { user_id, symbol, status, watchers_count, mode, .. } => {
            assert_eq!(user_id, "alice");
            assert_eq!(symbol, Some(Mark::X));
            assert_eq!(status, Role::Player);
            assert_eq!(watchers_count, 0);
            assert_eq!(mode, Mode::Remote);
        }
        other => panic!("expected player_joined, got {other:?}"),
    }

    // an unknown user still joins, with a placeholder name
    let bob = handle.join("bob").await.unwrap();
    assert_eq!(bob.mark, Some(Mark::O));
    assert_eq!(bob.name, "Unknown");

    // joining twice changes nothing
    let again = handle.join("alice").await.unwrap();
    assert_eq!(again, alice);
    let probe = handle.probe().await.unwrap();
    assert_eq!(probe.players, 2);
    assert_eq!(probe.watchers, 0);
}

#[tokio::test]
async fn third_join_becomes_watcher_once() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    handle.join("alice").await.unwrap();
    handle.join("bob").await.unwrap();

    let carol = handle.join("carol").await.unwrap();
    assert_eq!(carol.role, Role::Watcher);
    assert_eq!(carol.mark, None);

    handle.join("carol").await.unwrap();
    let probe = handle.probe().await.unwrap();
    assert_eq!(probe.watchers, 1, "re-join must not double-count watchers");
}

#[tokio::test]
async fn moves_respect_turns_and_the_active_board() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    handle.join("alice").await.unwrap();
    handle.join("bob").await.unwrap();

    // not bob's turn yet
    let err = handle.make_move("bob", mv(4, 4)).await.unwrap_err();
    assert_eq!(err, ServerError::InvalidMove("Not your turn".to_string()));

    handle.make_move("alice", mv(4, 0)).await.unwrap();

    // the cell index of the last move pins the next sub-board
    let err = handle.make_move("bob", mv(5, 0)).await.unwrap_err();
    assert_eq!(err, ServerError::InvalidMove("Move must be played in sub-board 0".to_string()));
    handle.make_move("bob", mv(0, 4)).await.unwrap();

    let err = handle.make_move("alice", mv(4, 0)).await.unwrap_err();
    assert_eq!(err, ServerError::InvalidMove("Cell already occupied".to_string()));
}

#[tokio::test]
async fn every_peer_sees_updates_in_applied_order() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    let mut rx_a = attach_peer(&app, handle.id(), "alice");
    let mut rx_b = attach_peer(&app, handle.id(), "bob");
    handle.join("alice").await.unwrap();
    handle.join("bob").await.unwrap();

    handle.make_move("alice", mv(4, 4)).await.unwrap();
    handle.make_move("bob", mv(4, 0)).await.unwrap();
    handle.make_move("alice", mv(0, 2)).await.unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        let mut seen = Vec::new();
        while seen.len() < 3 {
            if let ServerFrame::GameUpdate { game_state, .. } = next_frame(rx).await {
                seen.push(game_state.move_count);
            }
        }
        // each connection sees the applied sequence as a prefix, in order
        assert_eq!(seen, vec![1, 2, 3]);
    }
}

#[tokio::test]
async fn a_full_game_reaches_a_terminal_state_and_stays_there() {
    let (app, store) = test_app();
    store.insert_user("alice", "Alice");
    store.insert_user("bob", "Bob");
    let handle = app.registry.create(Mode::Remote, None);
    handle.join("alice").await.unwrap();
    handle.join("bob").await.unwrap();

    let plies = play_out(&handle, "alice", "bob").await;

    let probe = handle.probe().await.unwrap();
    let state = &probe.game_state;
    assert!(state.winner.is_some());
    assert_eq!(state.move_count, plies);
    assert_eq!(state.active_board, None);
    assert!(probe.is_terminal());

    // no move gets past a decided game
    let err = handle.make_move("alice", mv(0, 0)).await.unwrap_err();
    assert_eq!(err, ServerError::AlreadyTerminal);

    // the result sink runs exactly once, for both seated players
    let results = wait_for_results(&store, 2).await;
    assert_eq!(results.len(), 2);
    let winner = state.winner.unwrap();
    for record in &results {
        let mark = if record.user_id == "alice" { Mark::X } else { Mark::O };
        let expected = match winner {
            Winner::Tie => GameOutcome::Draw,
            _ if winner.mark() == Some(mark) => GameOutcome::Win,
            _ => GameOutcome::Loss,
        };
        assert_eq!(record.outcome, expected);
        assert_eq!(record.duration_seconds, plies * 5);
        assert!(record.opponent_name.is_some());
    }
}

async fn wait_for_results(
    store: &relays::store::MemoryStore,
    count: usize,
) -> Vec<relays::store::GameRecord> {
    for _ in 0..100 {
        let results = store.results();
        if results.len() >= count {
            return results;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("results never recorded");
}

#[tokio::test]
async fn reset_restores_a_fresh_board_and_keeps_the_room() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    let mut rx = attach_peer(&app, handle.id(), "alice");
    handle.join("alice").await.unwrap();
    handle.join("bob").await.unwrap();
    handle.join("carol").await.unwrap();
    handle.make_move("alice", mv(4, 4)).await.unwrap();

    let err = handle.reset("carol").await.unwrap_err();
    assert!(matches!(err, ServerError::Forbidden(_)));

    handle.reset("alice").await.unwrap();
    let frame = frame_matching(&mut rx, Duration::from_secs(2), |f| {
        matches!(f, ServerFrame::GameReset { .. })
    })
    .await;
    let ServerFrame::GameReset { message, game_state, .. } = frame else { unreachable!() };
    assert_eq!(message, "Game reset successfully");
    assert_eq!(game_state.move_count, 0);
    assert_eq!(game_state.winner, None);
    assert_eq!(game_state.current_player, Some(Mark::X));
    assert_eq!(game_state.players.len(), 3);

    let probe = handle.probe().await.unwrap();
    assert_eq!(probe.watchers, 1);
}

#[tokio::test]
async fn concurrent_resets_conflict() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    handle.join("alice").await.unwrap();
    handle.join("bob").await.unwrap();
    handle.make_move("alice", mv(4, 4)).await.unwrap();

    let (first, second) = tokio::join!(handle.reset("alice"), handle.reset("alice"));
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| r == &Err(ServerError::Conflict)));

    // once the first reset finished, another one is allowed again
    handle.reset("bob").await.unwrap();
}

#[tokio::test]
async fn leaving_updates_watchers_and_reaper_takes_empty_matches() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    handle.join("alice").await.unwrap();
    handle.join("bob").await.unwrap();
    handle.join("carol").await.unwrap();

    handle.leave("carol").await;
    let probe = handle.probe().await.unwrap();
    assert_eq!(probe.watchers, 0);
    assert_eq!(probe.players, 2);

    handle.leave("alice").await;
    handle.leave("bob").await;
    let probe = handle.probe().await.unwrap();
    assert_eq!(probe.players, 0);

    let reaped = relays::reaper::sweep_matches(&app.registry, Duration::from_secs(3600)).await;
    assert_eq!(reaped, 1);
    assert!(app.registry.get(&handle.id()).is_none());
}
