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

//! The external user/stats store, seen through a narrow trait. The match
//! subsystem only ever needs three operations, all best-effort from its
//! point of view: name lookup, appending a finished-game record and
//! bumping aggregate counters.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Retryable failure; gameplay continues without the write.
    #[error("{0}")]
    Transient(String),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, derive_more::Display)]
pub enum GameOutcome {
    #[display("WIN")]
    Win,
    #[display("LOSS")]
    Loss,
    #[display("DRAW")]
    Draw,
}

/// One finished game from one player's point of view.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub user_id: String,
    pub outcome: GameOutcome,
    pub opponent_name: Option<String>,
    pub duration_seconds: u32,
    pub points_delta: i32,
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Display name of a known user, `None` for strangers.
    async fn user_name(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    async fn append_result(&self, record: GameRecord) -> Result<(), StoreError>;

    async fn bump_stats(
        &self,
        user_id: &str,
        outcome: GameOutcome,
        points_delta: i32,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub name: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub points: i64,
}

/// In-process store used as the default backend and by the tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, UserProfile>,
    results: Mutex<Vec<GameRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user_id: impl Into<String>, name: impl Into<String>) {
        self.users.insert(user_id.into(), UserProfile { name: name.into(), ..Default::default() });
    }

    pub fn profile(&self, user_id: &str) -> Option<UserProfile> {
        self.users.get(user_id).map(|entry| entry.value().clone())
    }

    pub fn results(&self) -> Vec<GameRecord> {
        self.results.lock().expect("results lock poisoned").clone()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user_name(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.users.get(user_id).map(|entry| entry.name.clone()))
    }

    async fn append_result(&self, record: GameRecord) -> Result<(), StoreError> {
        self.results.lock().expect("results lock poisoned").push(record);
        Ok(())
    }

    async fn bump_stats(
        &self,
        user_id: &str,
        outcome: GameOutcome,
        points_delta: i32,
    ) -> Result<(), StoreError> {
        let mut profile = self.users.entry(user_id.to_string()).or_default();
        match outcome {
            GameOutcome::Win => profile.wins += 1,
            GameOutcome::Loss => profile.losses += 1,
            GameOutcome::Draw => profile.draws += 1,
        }
        profile.points += i64::from(points_delta);
        Ok(())
    }
}
