//! Fan-out behavior: heartbeats, eviction, connection caps, duplicate
//! supersession and per-connection delivery.

mod common;

use std::time::{Duration, Instant};

use cogs::{CellIdx, Move, SubBoardIdx};
use relays::ServerError;
use relays::wire::{Mode, ServerFrame};

use common::{attach_peer, frame_matching, next_frame, test_app, test_app_with, test_config};

fn mv(board: u8, cell: u8) -> Move {
    Move::new(SubBoardIdx::new(board).unwrap(), CellIdx::new(cell).unwrap())
}

#[tokio::test]
async fn heartbeat_pings_live_peers() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    let mut rx = attach_peer(&app, handle.id(), "alice");

    app.fanout.heartbeat_sweep(Instant::now());
    let frame = next_frame(&mut rx).await;
    assert!(matches!(frame, ServerFrame::Ping { .. }), "expected a ping, got {frame:?}");
    assert_eq!(app.fanout.connection_count(handle.id()), 1);
}

#[tokio::test]
async fn silent_peers_are_evicted_but_watchers_stay_counted() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    handle.join("alice").await.unwrap();
    handle.join("bob").await.unwrap();
    handle.join("carol").await.unwrap(); // a watcher
    let mut rx_alice = attach_peer(&app, handle.id(), "alice");
    let _rx_carol = attach_peer(&app, handle.id(), "carol");

    // past the pong timeout; alice answered recently, carol never did
    tokio::time::sleep(Duration::from_millis(130)).await;
    app.fanout.record_pong(handle.id(), "alice");
    let evicted = app.fanout.heartbeat_sweep(Instant::now());
    assert_eq!(evicted, 1);
    assert_eq!(app.fanout.connection_count(handle.id()), 1);

    // a broadcast after eviction reaches the survivor only
    let sent = app.fanout.broadcast(
        handle.id(),
        &ServerFrame::Error { message: "hello".to_string() },
        None,
    );
    assert_eq!(sent, 1);
    let frame = frame_matching(&mut rx_alice, Duration::from_secs(1), |f| {
        matches!(f, ServerFrame::Error { .. })
    })
    .await;
    assert!(matches!(frame, ServerFrame::Error { message } if message == "hello"));

    // eviction is transport-level: only an explicit leave touches the
    // watcher counter
    let probe = handle.probe().await.unwrap();
    assert_eq!(probe.watchers, 1);
    handle.leave("carol").await;
    let probe = handle.probe().await.unwrap();
    assert_eq!(probe.watchers, 0);
}

#[tokio::test]
async fn the_connection_cap_refuses_extra_peers() {
    let mut config = test_config();
    config.max_connections_per_match = 2;
    let (app, _) = test_app_with(config);
    let handle = app.registry.create(Mode::Remote, None);

    let _rx_a = attach_peer(&app, handle.id(), "a");
    let _rx_b = attach_peer(&app, handle.id(), "b");
    let (tx, _rx_c) = app.fanout.channel();
    let err = app.fanout.attach(handle.id(), "c", tx).unwrap_err();
    assert_eq!(err, ServerError::CapacityExceeded);

    // a duplicate of a connected peer is not an extra peer
    let (tx, _rx_a2) = app.fanout.channel();
    app.fanout.attach(handle.id(), "a", tx).unwrap();
    assert_eq!(app.fanout.connection_count(handle.id()), 2);
}

#[tokio::test]
async fn duplicate_attach_supersedes_the_old_connection() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    let mut rx_old = attach_peer(&app, handle.id(), "alice");
    let mut rx_new = attach_peer(&app, handle.id(), "alice");

    // the old queue's sender is gone: it drains to a close
    assert!(rx_old.recv().await.is_none());

    app.fanout.broadcast(handle.id(), &ServerFrame::Error { message: "hi".to_string() }, None);
    let frame = next_frame(&mut rx_new).await;
    assert!(matches!(frame, ServerFrame::Error { .. }));
}

#[tokio::test]
async fn a_peer_with_a_full_queue_is_dropped_as_dead() {
    let mut config = test_config();
    config.send_buffer = 2;
    let (app, _) = test_app_with(config);
    let handle = app.registry.create(Mode::Remote, None);
    // never drained: two frames fit, the third overflows
    let _rx = attach_peer(&app, handle.id(), "sluggish");

    let frame = ServerFrame::Error { message: "x".to_string() };
    assert_eq!(app.fanout.broadcast(handle.id(), &frame, None), 1);
    assert_eq!(app.fanout.broadcast(handle.id(), &frame, None), 1);
    assert_eq!(app.fanout.broadcast(handle.id(), &frame, None), 0);
    assert_eq!(app.fanout.connection_count(handle.id()), 0);
}

#[tokio::test]
async fn send_to_reaches_exactly_one_peer() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    let mut rx_a = attach_peer(&app, handle.id(), "a");
    let mut rx_b = attach_peer(&app, handle.id(), "b");

    let frame = ServerFrame::Error { message: "just you".to_string() };
    assert!(app.fanout.send_to(handle.id(), "a", frame.clone()));
    assert!(!app.fanout.send_to(handle.id(), "nobody", frame));
    assert!(matches!(next_frame(&mut rx_a).await, ServerFrame::Error { .. }));
    assert!(
        tokio::time::timeout(Duration::from_millis(50), rx_b.recv()).await.is_err(),
        "send_to leaked to another peer"
    );
}

#[tokio::test]
async fn broadcast_can_exclude_a_peer() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    let mut rx_a = attach_peer(&app, handle.id(), "a");
    let mut rx_b = attach_peer(&app, handle.id(), "b");

    let frame = ServerFrame::Error { message: "for b only".to_string() };
    assert_eq!(app.fanout.broadcast(handle.id(), &frame, Some("a")), 1);
    let frame = next_frame(&mut rx_b).await;
    assert!(matches!(frame, ServerFrame::Error { .. }));
    // nothing for the excluded peer
    assert!(
        tokio::time::timeout(Duration::from_millis(50), rx_a.recv()).await.is_err(),
        "excluded peer received the frame"
    );
}

#[tokio::test]
async fn session_frames_arrive_in_submission_order() {
    let (app, _) = test_app();
    let handle = app.registry.create(Mode::Remote, None);
    handle.join("alice").await.unwrap();
    handle.join("bob").await.unwrap();
    let mut rx = attach_peer(&app, handle.id(), "alice");

    handle.make_move("alice", mv(4, 4)).await.unwrap();
    handle.make_move("bob", mv(4, 0)).await.unwrap();

    let mut counts = Vec::new();
    while counts.len() < 2 {
        if let ServerFrame::GameUpdate { game_state, .. } = next_frame(&mut rx).await {
            counts.push(game_state.move_count);
        }
    }
    assert_eq!(counts, vec![1, 2]);
}
