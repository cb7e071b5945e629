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

//! The small HTTP surface around the WebSocket: match creation, resets
//! and matchmaking. Response envelopes mirror what existing clients
//! expect, `detail` for errors included.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use cranks::Difficulty;

use crate::error::ServerError;
use crate::queue::{EnqueueOutcome, QueueStatus};
use crate::wire::Mode;
use crate::ws;
use crate::{AppState, MatchId};

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/create-game", post(create_game))
        .route("/reset-game", post(reset_game))
        .route("/matchmaking/join", post(join_matchmaking))
        .route("/matchmaking/leave", post(leave_matchmaking))
        .route("/matchmaking/status", get(matchmaking_status))
        .route("/ws/connect", get(ws::ws_connect))
        .with_state(app)
}

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub ai_difficulty: Option<Difficulty>,
}

fn default_mode() -> Mode {
    Mode::Remote
}

#[derive(Debug, Serialize)]
pub struct CreateGameResponse {
    pub game_id: String,
    pub mode: Mode,
    pub ai_difficulty: Option<Difficulty>,
}

async fn create_game(
    State(app): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Json<CreateGameResponse> {
    let difficulty = match request.mode {
        Mode::Ai => Some(request.ai_difficulty.unwrap_or_default()),
        Mode::Remote => None,
    };
    let handle = app.registry.create(request.mode, difficulty);
    Json(CreateGameResponse {
        game_id: handle.id().to_string(),
        mode: request.mode,
        ai_difficulty: difficulty,
    })
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub game_id: String,
    pub user_id: String,
}

async fn reset_game(
    State(app): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<Value>, ServerError> {
    let id = parse_match_id(&request.game_id)?;
    let handle = app.registry.get(&id).ok_or_else(ServerError::game_not_found)?;
    handle.reset(request.user_id).await?;
    Ok(Json(json!({ "success": true, "message": "Game reset successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// Matchmaking answers, shared by the join and status endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchmakingReply {
    Matched { game_id: MatchId },
    Queued { position: usize, queue_size: usize, wait_seconds: f64, average_wait_seconds: f64 },
    NotQueued,
}

impl MatchmakingReply {
    fn into_json(self) -> Value {
        match self {
            Self::Matched { game_id } => {
                json!({ "status": "matched", "game_id": game_id.to_string() })
            }
            Self::Queued { position, queue_size, wait_seconds, average_wait_seconds } => json!({
                "status": "queued",
                "position": position,
                "queue_size": queue_size,
                "wait_time_seconds": round_tenths(wait_seconds),
                "average_wait_time": round_tenths(average_wait_seconds),
            }),
            Self::NotQueued => json!({ "status": "not_queued" }),
        }
    }
}

fn round_tenths(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}

/// Enqueue a user; when this arrival completes a pair, the match is
/// created on the spot and both sides see it as `Matched`.
pub async fn enqueue_user(app: &AppState, user_id: &str) -> Result<MatchmakingReply, ServerError> {
    match app.queue.enqueue(user_id) {
        EnqueueOutcome::Paired { game_id, players } => {
            app.registry.create_prepopulated(game_id, players).await?;
            Ok(MatchmakingReply::Matched { game_id })
        }
        EnqueueOutcome::Queued { position, queue_size, waited } => Ok(MatchmakingReply::Queued {
            position,
            queue_size,
            wait_seconds: waited.as_secs_f64(),
            average_wait_seconds: waited.as_secs_f64(),
        }),
    }
}

/// The status endpoint's view. A matched record pointing at a finished or
/// vanished game is discarded and reported as not queued.
pub async fn matchmaking_reply(app: &AppState, user_id: &str) -> MatchmakingReply {
    match app.queue.status(user_id) {
        QueueStatus::Queued { position, queue_size, waited, average_wait } => {
            MatchmakingReply::Queued {
                position,
                queue_size,
                wait_seconds: waited.as_secs_f64(),
                average_wait_seconds: average_wait.as_secs_f64(),
            }
        }
        QueueStatus::Matched { game_id } => {
            let live = match app.registry.get(&game_id) {
                Some(handle) => match handle.probe().await {
                    Some(probe) => !probe.is_terminal(),
                    None => false,
                },
                None => false,
            };
            if live {
                MatchmakingReply::Matched { game_id }
            } else {
                app.queue.discard(game_id);
                MatchmakingReply::NotQueued
            }
        }
        QueueStatus::NotQueued => MatchmakingReply::NotQueued,
    }
}

async fn join_matchmaking(
    State(app): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ServerError> {
    let user_id = validate_user_id(&query.user_id)?;
    let reply = enqueue_user(&app, user_id).await?;
    Ok(Json(reply.into_json()))
}

async fn leave_matchmaking(
    State(app): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ServerError> {
    let user_id = validate_user_id(&query.user_id)?;
    let removed = app.queue.leave(user_id);
    Ok(Json(json!({ "status": if removed { "removed" } else { "not_in_queue" } })))
}

async fn matchmaking_status(
    State(app): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ServerError> {
    let user_id = validate_user_id(&query.user_id)?;
    Ok(Json(matchmaking_reply(&app, user_id).await.into_json()))
}

pub(crate) fn parse_match_id(raw: &str) -> Result<MatchId, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::game_not_found())
}

fn validate_user_id(raw: &str) -> Result<&str, ServerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 128 {
        return Err(ServerError::InvalidMove(
            "user_id must be between 1 and 128 characters".to_string(),
        ));
    }
    Ok(trimmed)
}
