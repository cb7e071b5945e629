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

//! The server glues four moving parts together: a registry of match
//! actors (one task per match, all state mutation funneled through its
//! command channel), a fan-out layer that owns the per-match client
//! connections and their heartbeats, a FIFO matchmaking queue, and a
//! reaper that sweeps idle matches and stale queue entries. Clients talk
//! JSON frames over a WebSocket; a small HTTP surface covers match
//! creation, resets and matchmaking.

pub mod actor;
pub mod error;
pub mod fanout;
pub mod http;
pub mod participant;
pub mod queue;
pub mod reaper;
pub mod registry;
pub mod results;
pub mod state;
pub mod store;
pub mod wire;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::fanout::FanOut;
use crate::queue::Matchmaker;
use crate::registry::Registry;
use crate::store::UserStore;

pub use error::ServerError;

pub type MatchId = Uuid;

/// Tunables with their production defaults. Tests dial the timers down.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How often the fan-out layer pings every connection.
    pub heartbeat_interval: Duration,
    /// A connection whose last pong is older than this is considered dead.
    pub pong_timeout: Duration,
    pub max_connections_per_match: usize,
    /// Outbound frames buffered per connection before the peer counts as dead.
    pub send_buffer: usize,
    /// Pause before the computer opponent answers.
    pub reply_delay: Duration,
    pub search_deadline: Duration,
    pub search_depth: u32,
    /// Queue entries and matched records older than this are dropped.
    pub queue_max_age: Duration,
    pub queue_sweep_interval: Duration,
    pub match_sweep_interval: Duration,
    /// How long a finished match lingers before the reaper takes it.
    pub terminal_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(90),
            max_connections_per_match: 100,
            send_buffer: 64,
            reply_delay: Duration::from_millis(500),
            search_deadline: Duration::from_secs(3),
            search_depth: cranks::Engine::DEFAULT_DEPTH,
            queue_max_age: Duration::from_secs(10 * 60),
            queue_sweep_interval: Duration::from_secs(5 * 60),
            match_sweep_interval: Duration::from_secs(30 * 60),
            terminal_grace: Duration::from_secs(60 * 60),
        }
    }
}

/// Everything a request handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn UserStore>,
    pub fanout: Arc<FanOut>,
    pub registry: Arc<Registry>,
    pub queue: Arc<Matchmaker>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn UserStore>) -> Self {
        let config = Arc::new(config);
        let fanout = Arc::new(FanOut::new(config.clone()));
        let registry =
            Arc::new(Registry::new(fanout.clone(), store.clone(), config.clone()));
        let queue = Arc::new(Matchmaker::new());
        Self { config, store, fanout, registry, queue }
    }

    /// Start the heartbeat driver and both reaper cadences.
    pub fn spawn_background_tasks(&self) {
        tokio::spawn(self.fanout.clone().run_heartbeat());
        tokio::spawn(reaper::run_match_sweep(self.registry.clone(), self.config.clone()));
        tokio::spawn(reaper::run_queue_sweep(self.queue.clone(), self.config.clone()));
    }
}
