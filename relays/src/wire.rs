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

//! JSON frames exchanged with clients. Field spellings are part of the
//! protocol; the mix of camelCase ids and snake_case bodies is what
//! clients in the wild already speak, so it stays.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use cogs::{Mark, Winner};
use cranks::Difficulty;

use crate::participant::Role;

/// Match flavor: two humans, or one human against the engine.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Human vs. human.
    Remote,
    /// Human vs. computer.
    Ai,
}

/// Wall clock as fractional seconds since the epoch, the format carried
/// by ping/pong frames.
pub fn epoch_seconds() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    JoinGame,
    MakeMove {
        #[serde(rename = "playerId")]
        player_id: String,
        global_board_index: u8,
        local_board_index: u8,
    },
    ResetGame,
    Leave {
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
    Ping {
        timestamp: f64,
    },
    Pong {
        timestamp: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    PlayerJoined {
        #[serde(rename = "gameId")]
        game_id: String,
        #[serde(rename = "userId")]
        user_id: String,
        symbol: Option<Mark>,
        status: Role,
        watchers_count: u32,
        mode: Mode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ai_difficulty: Option<Difficulty>,
        game_state: WireGameState,
    },
    GameUpdate {
        #[serde(rename = "gameId")]
        game_id: String,
        #[serde(rename = "userId")]
        user_id: String,
        game_state: WireGameState,
    },
    GameReset {
        #[serde(rename = "gameId")]
        game_id: String,
        message: String,
        game_state: WireGameState,
    },
    WatchersUpdate {
        #[serde(rename = "gameId")]
        game_id: String,
        watchers_count: u32,
    },
    Error {
        message: String,
    },
    Ping {
        timestamp: f64,
    },
    Pong {
        timestamp: f64,
    },
}

/// The authoritative match state as clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireGameState {
    pub players: Vec<WirePlayer>,
    /// Nine sub-boards of nine cells each, row-major.
    pub global_board: [[Option<Mark>; 9]; 9],
    pub active_board: Option<u8>,
    pub move_count: u32,
    pub winner: Option<Winner>,
    pub current_player: Option<Mark>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct WirePlayer {
    pub id: String,
    pub name: String,
    pub symbol: Option<Mark>,
    pub status: Role,
    pub join_order: u32,
}
