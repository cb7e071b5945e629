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

//! Periodic cleanup. Matches are probed through their own executors, so
//! reaping interleaves with live games without extra locking; the queue
//! sweep runs on its own, faster cadence.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::queue::Matchmaker;
use crate::registry::Registry;
use crate::ServerConfig;

pub async fn run_match_sweep(registry: Arc<Registry>, config: Arc<ServerConfig>) {
    let mut ticker = tokio::time::interval(config.match_sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let reaped = sweep_matches(&registry, config.terminal_grace).await;
        if reaped > 0 {
            info!(reaped, remaining = registry.len(), "match sweep");
        }
    }
}

/// Destroy matches that are finished for longer than `terminal_grace` or
/// have no player participants left. Returns how many were destroyed.
pub async fn sweep_matches(registry: &Registry, terminal_grace: Duration) -> usize {
    let mut reaped = 0;
    for id in registry.ids() {
        let Some(handle) = registry.get(&id) else {
            continue;
        };
        let expired = match handle.probe().await {
            // an unresponsive actor has crashed; its entry goes too
            None => true,
            Some(probe) => {
                probe.players == 0
                    || probe.terminal_for.is_some_and(|elapsed| elapsed > terminal_grace)
            }
        };
        if expired {
            registry.remove(&id).await;
            reaped += 1;
        }
    }
    reaped
}

pub async fn run_queue_sweep(queue: Arc<Matchmaker>, config: Arc<ServerConfig>) {
    let mut ticker = tokio::time::interval(config.queue_sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        queue.reap(config.queue_max_age);
    }
}
