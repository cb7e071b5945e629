#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::time::timeout;

use cogs::{ActiveBoard, Mark, MetaBoard};
use relays::actor::MatchHandle;
use relays::store::MemoryStore;
use relays::wire::ServerFrame;
use relays::{AppState, MatchId, ServerConfig};

/// Production defaults with every timer dialed down to test speed.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        heartbeat_interval: Duration::from_millis(40),
        pong_timeout: Duration::from_millis(100),
        reply_delay: Duration::from_millis(30),
        search_deadline: Duration::from_millis(500),
        ..ServerConfig::default()
    }
}

pub fn test_app() -> (AppState, Arc<MemoryStore>) {
    test_app_with(test_config())
}

pub fn test_app_with(config: ServerConfig) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (AppState::new(config, store.clone()), store)
}

/// Hook a synthetic peer into the fan-out layer, standing in for a
/// websocket writer.
pub fn attach_peer(
    app: &AppState,
    match_id: MatchId,
    user_id: &str,
) -> mpsc::Receiver<ServerFrame> {
    let (tx, rx) = app.fanout.channel();
    app.fanout.attach(match_id, user_id, tx).expect("attach failed");
    rx
}

pub async fn next_frame(rx: &mut mpsc::Receiver<ServerFrame>) -> ServerFrame {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("connection closed")
}

/// Read frames until one matches, failing after `deadline`.
pub async fn frame_matching(
    rx: &mut mpsc::Receiver<ServerFrame>,
    deadline: Duration,
    mut pred: impl FnMut(&ServerFrame) -> bool,
) -> ServerFrame {
    let step = async {
        loop {
            if let Some(frame) = rx.recv().await {
                if pred(&frame) {
                    return frame;
                }
            } else {
                panic!("connection closed before the expected frame");
            }
        }
    };
    timeout(deadline, step).await.expect("expected frame never arrived")
}

/// Drive a seeded random game through the actor until it is decided.
/// Returns the number of plies played.
pub async fn play_out(handle: &MatchHandle, x_player: &str, o_player: &str) -> u32 {
    let mut board = MetaBoard::empty();
    let mut active = ActiveBoard::Any;
    let mut current = Mark::X;
    let mut rng = StdRng::seed_from_u64(42);
    let mut plies = 0;
    while board.meta_winner().is_none() {
        let mv = board.random_move(active, &mut rng).expect("live game without moves");
        let mover = if current == Mark::X { x_player } else { o_player };
        handle.make_move(mover, mv).await.expect("legal move rejected");
        board.apply(current, mv);
        active = board.next_active_board(mv.cell);
        current = current.other();
        plies += 1;
    }
    plies
}
