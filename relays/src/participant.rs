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

use serde::{Deserialize, Serialize};

use cogs::Mark;

use crate::MatchId;

/// Display name used for the computer player.
pub const COMPUTER_NAME: &str = "AI (Bot)";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Player,
    Watcher,
}

/// A user or the computer, attached to one match.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Participant {
    pub id: String,
    pub name: String,
    /// Set exactly for the two `Player` roles.
    pub mark: Option<Mark>,
    pub role: Role,
    pub join_order: u32,
}

impl Participant {
    pub fn is_player(&self) -> bool {
        self.role == Role::Player
    }
}

/// The computer participant of a match has an id derived from the match
/// id, so it needs no storage to be recognised.
pub fn computer_id(match_id: MatchId) -> String {
    format!("ai_{match_id}")
}

/// Result of looking a mover up: a known participant, the synthesised
/// computer player, or nobody.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Participant),
    Synthesised(Participant),
    Missing,
}

/// The synthesised computer participant, used both at join time and as a
/// fallback when a computer move arrives for a match that never stored it.
pub fn computer_participant(match_id: MatchId) -> Participant {
    Participant {
        id: computer_id(match_id),
        name: COMPUTER_NAME.to_string(),
        mark: Some(Mark::O),
        role: Role::Player,
        join_order: 1,
    }
}
