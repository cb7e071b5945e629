/*
 *  Relays, a realtime multiplayer server for Super Tic-Tac-Toe.
 *  Copyright (C) 2025 ToTheAnd
 *
 *  Relays is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  Relays is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with Relays. If not, see <https://www.gnu.org/licenses/>.
 */

//! WebSocket plumbing: one reader loop and one writer task per client.
//! The writer drains the connection's fan-out queue, which is what keeps
//! per-connection delivery FIFO; the reader parses frames and forwards
//! them to the match actor. Rejections go back on this client's own
//! queue and nowhere else.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use cogs::{CellIdx, Move, SubBoardIdx};

use crate::actor::MatchHandle;
use crate::wire::{ClientFrame, ServerFrame};
use crate::{AppState, MatchId};

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub game_id: String,
    pub user_id: String,
}

pub async fn ws_connect(
    State(app): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| client_session(app, params, socket))
}

async fn client_session(app: AppState, params: ConnectParams, socket: WebSocket) {
    let Ok(match_id) = params.game_id.parse::<MatchId>() else {
        reject(socket, "Game not found").await;
        return;
    };
    let Some(handle) = app.registry.get(&match_id) else {
        reject(socket, "Game not found").await;
        return;
    };

    let (tx, rx) = app.fanout.channel();
    if let Err(err) = app.fanout.attach(match_id, &params.user_id, tx.clone()) {
        reject(socket, &err.to_string()).await;
        return;
    }
    info!(%match_id, user_id = %params.user_id, "websocket session started");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_frames(sink, rx));
    read_frames(&app, &handle, match_id, &params.user_id, &tx, stream).await;

    // reader is done: unhook the peer, let the writer drain out, and tell
    // the room who is still watching
    app.fanout.detach(match_id, &params.user_id);
    drop(tx);
    let _ = writer.await;
    info!(%match_id, user_id = %params.user_id, "websocket session ended");
    if app.fanout.connection_count(match_id) > 0 {
        if let Some(probe) = handle.probe().await {
            app.fanout.broadcast(
                match_id,
                &ServerFrame::WatchersUpdate {
                    game_id: match_id.to_string(),
                    watchers_count: probe.watchers,
                },
                None,
            );
        }
    }
}

/// An unknown match still gets a proper answer: accept, explain, close.
async fn reject(mut socket: WebSocket, message: &str) {
    let frame = ServerFrame::Error { message: message.to_string() };
    if let Ok(text) = serde_json::to_string(&frame) {
        let _ = socket.send(Message::Text(text.into())).await;
    }
    let _ = socket.close().await;
}

async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerFrame>,
) {
    while let Some(frame) = rx.recv().await {
        let Ok(text) = serde_json::to_string(&frame) else {
            continue;
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_frames(
    app: &AppState,
    handle: &MatchHandle,
    match_id: MatchId,
    user_id: &str,
    tx: &mpsc::Sender<ServerFrame>,
    mut stream: SplitStream<WebSocket>,
) {
    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // transport-level ping/pong is the socket library's business
            _ => continue,
        };
        let frame = match serde_json::from_str::<ClientFrame>(text.as_str()) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%match_id, user_id, %err, "unparseable frame");
                let _ = tx.send(ServerFrame::Error { message: "Invalid action".to_string() }).await;
                continue;
            }
        };
        match frame {
            ClientFrame::Ping { timestamp } => {
                let _ = tx.send(ServerFrame::Pong { timestamp }).await;
            }
            ClientFrame::Pong { .. } => {
                app.fanout.record_pong(match_id, user_id);
            }
            ClientFrame::JoinGame => {
                if let Err(err) = handle.join(user_id).await {
                    let _ = tx.send(ServerFrame::Error { message: err.to_string() }).await;
                }
            }
            ClientFrame::MakeMove { player_id, global_board_index, local_board_index } => {
                let parsed = SubBoardIdx::new(global_board_index)
                    .zip(CellIdx::new(local_board_index))
                    .map(|(board, cell)| Move::new(board, cell));
                let Some(mv) = parsed else {
                    let _ = tx
                        .send(ServerFrame::Error { message: "Invalid move".to_string() })
                        .await;
                    continue;
                };
                if let Err(err) = handle.make_move(player_id, mv).await {
                    let _ = tx.send(ServerFrame::Error { message: err.to_string() }).await;
                }
            }
            ClientFrame::ResetGame => {
                if let Err(err) = handle.reset(user_id).await {
                    let _ = tx.send(ServerFrame::Error { message: err.to_string() }).await;
                }
            }
            ClientFrame::Leave { user_id: leaving } => {
                let leaving = leaving.unwrap_or_else(|| user_id.to_string());
                handle.leave(leaving).await;
            }
        }
    }
}
