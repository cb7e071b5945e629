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

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;
use uuid::Uuid;

use cranks::Difficulty;

use crate::actor::{ActorDeps, MatchHandle, spawn_match};
use crate::error::ServerError;
use crate::fanout::FanOut;
use crate::state::MatchState;
use crate::store::UserStore;
use crate::wire::Mode;
use crate::{MatchId, ServerConfig};

/// The single shared map of live matches. Exactly one actor exists per
/// match id; every lookup hands out another address of the same actor.
pub struct Registry {
    matches: DashMap<MatchId, MatchHandle>,
    fanout: Arc<FanOut>,
    store: Arc<dyn UserStore>,
    config: Arc<ServerConfig>,
}

impl Registry {
    pub fn new(fanout: Arc<FanOut>, store: Arc<dyn UserStore>, config: Arc<ServerConfig>) -> Self {
        Self { matches: DashMap::new(), fanout, store, config }
    }

    fn deps(&self) -> ActorDeps {
        ActorDeps {
            fanout: self.fanout.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }

    pub fn create(&self, mode: Mode, difficulty: Option<Difficulty>) -> MatchHandle {
        let id = Uuid::new_v4();
        let handle = spawn_match(MatchState::new(id, mode, difficulty), self.deps());
        self.matches.insert(id, handle.clone());
        info!(match_id = %id, %mode, "match created");
        handle
    }

    /// Matchmaking entry point: both seats filled, X to move. Fails when
    /// the id is already taken.
    pub async fn create_prepopulated(
        &self,
        id: MatchId,
        players: [String; 2],
    ) -> Result<MatchHandle, ServerError> {
        let mut seated = players.map(|user_id| (user_id, String::new()));
        for (user_id, name) in &mut seated {
            *name = match self.store.user_name(user_id).await {
                Ok(Some(found)) => found,
                _ => "Unknown".to_string(),
            };
        }
        let handle = spawn_match(MatchState::prepopulated(id, seated), self.deps());
        let inserted = match self.matches.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(handle.clone());
                true
            }
        };
        if !inserted {
            handle.shutdown().await;
            return Err(ServerError::Conflict);
        }
        info!(match_id = %id, "matchmade game created");
        Ok(handle)
    }

    pub fn get(&self, id: &MatchId) -> Option<MatchHandle> {
        self.matches.get(id).map(|entry| entry.value().clone())
    }

    pub async fn remove(&self, id: &MatchId) {
        if let Some((_, handle)) = self.matches.remove(id) {
            handle.shutdown().await;
            info!(match_id = %id, "match removed");
        }
    }

    pub fn ids(&self) -> Vec<MatchId> {
        self.matches.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
