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

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use cogs::RulesError;

use crate::store::StoreError;

/// Everything an operation can be rejected or fail with. Client-triggered
/// rejections travel back to the originating peer only, as an `error`
/// frame or an HTTP status; they are never broadcast.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidMove(String),
    #[error("Game already won")]
    AlreadyTerminal,
    #[error("Game reset is already in progress")]
    Conflict,
    #[error("Connection limit reached for this game")]
    CapacityExceeded,
    #[error("The operation timed out")]
    Timeout,
    #[error("Peer disconnected")]
    TransportClosed,
    #[error("Transient storage failure: {0}")]
    StorageTransient(String),
}

impl ServerError {
    pub fn game_not_found() -> Self {
        Self::NotFound("Game not found".to_string())
    }

    pub fn player_not_found() -> Self {
        Self::NotFound("Player not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidMove(_) | Self::AlreadyTerminal => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::CapacityExceeded => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::TransportClosed | Self::StorageTransient(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<RulesError> for ServerError {
    fn from(err: RulesError) -> Self {
        match err {
            RulesError::GameOver => Self::AlreadyTerminal,
            RulesError::CellOccupied => Self::InvalidMove("Cell already occupied".to_string()),
            RulesError::WrongSubBoard(board) => {
                Self::InvalidMove(format!("Move must be played in sub-board {board}"))
            }
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(msg) => Self::StorageTransient(msg),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
