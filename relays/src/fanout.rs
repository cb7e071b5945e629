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

//! Per-match connection bookkeeping and broadcast. Every connection owns
//! a bounded outbound queue drained by its socket writer; a peer whose
//! queue overflows or whose sender is gone is detached on the spot, so a
//! slow client never stalls the rest of the room. Delivery per connection
//! is FIFO; across connections nothing is promised.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::wire::{ServerFrame, epoch_seconds};
use crate::{MatchId, ServerConfig};

/// Sending half of one client's outbound queue.
pub type PeerSender = mpsc::Sender<ServerFrame>;

/// A connected peer with its heartbeat bookkeeping.
#[derive(Debug)]
struct Connection {
    tx: PeerSender,
    connected_at: Instant,
    last_ping: Instant,
    last_pong: Instant,
    ping_count: u32,
    missed_pongs: u32,
}

impl Connection {
    fn new(tx: PeerSender) -> Self {
        let now = Instant::now();
        Self { tx, connected_at: now, last_ping: now, last_pong: now, ping_count: 0, missed_pongs: 0 }
    }
}

pub struct FanOut {
    rooms: DashMap<MatchId, HashMap<String, Connection>>,
    config: Arc<ServerConfig>,
}

impl FanOut {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { rooms: DashMap::new(), config }
    }

    /// A fresh outbound queue of the configured depth; hand the sender to
    /// [`attach`](Self::attach) and drain the receiver into the socket.
    pub fn channel(&self) -> (PeerSender, mpsc::Receiver<ServerFrame>) {
        mpsc::channel(self.config.send_buffer)
    }

    /// Register a peer. Refused above the per-match cap; a second
    /// connection for the same participant supersedes the first, whose
    /// queue is dropped and whose writer thereby winds down.
    pub fn attach(
        &self,
        match_id: MatchId,
        user_id: &str,
        tx: PeerSender,
    ) -> Result<(), ServerError> {
        let mut room = self.rooms.entry(match_id).or_default();
        if !room.contains_key(user_id) && room.len() >= self.config.max_connections_per_match {
            warn!(%match_id, user_id, "connection refused, room is full");
            return Err(ServerError::CapacityExceeded);
        }
        if room.insert(user_id.to_string(), Connection::new(tx)).is_some() {
            debug!(%match_id, user_id, "superseded duplicate connection");
        }
        info!(%match_id, user_id, peers = room.len(), "peer attached");
        Ok(())
    }

    pub fn detach(&self, match_id: MatchId, user_id: &str) -> bool {
        let removed = match self.rooms.get_mut(&match_id) {
            Some(mut room) => room.remove(user_id),
            None => None,
        };
        match removed {
            Some(conn) => {
                info!(%match_id, user_id, session = ?conn.connected_at.elapsed(), "peer detached");
                self.rooms.remove_if(&match_id, |_, room| room.is_empty());
                true
            }
            None => false,
        }
    }

    /// Queue `frame` for every healthy peer of the match, minus `except`.
    /// Peers whose queue is closed or full are treated as dead and
    /// detached. Returns how many peers the frame was queued for.
    pub fn broadcast(&self, match_id: MatchId, frame: &ServerFrame, except: Option<&str>) -> usize {
        let mut dead = Vec::new();
        let mut sent = 0;
        if let Some(room) = self.rooms.get(&match_id) {
            for (user_id, conn) in room.iter() {
                if except == Some(user_id.as_str()) {
                    continue;
                }
                match conn.tx.try_send(frame.clone()) {
                    Ok(()) => sent += 1,
                    Err(_) => dead.push(user_id.clone()),
                }
            }
        }
        for user_id in dead {
            warn!(%match_id, user_id, "dropping unresponsive peer");
            self.detach(match_id, &user_id);
        }
        sent
    }

    /// Queue a frame for one peer; a failure detaches them.
    pub fn send_to(&self, match_id: MatchId, user_id: &str, frame: ServerFrame) -> bool {
        let ok = match self.rooms.get(&match_id) {
            Some(room) => match room.get(user_id) {
                Some(conn) => conn.tx.try_send(frame).is_ok(),
                None => return false,
            },
            None => return false,
        };
        if !ok {
            self.detach(match_id, user_id);
        }
        ok
    }

    pub fn record_pong(&self, match_id: MatchId, user_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(&match_id) {
            if let Some(conn) = room.get_mut(user_id) {
                conn.last_pong = Instant::now();
                conn.missed_pongs = 0;
            }
        }
    }

    pub fn connection_count(&self, match_id: MatchId) -> usize {
        self.rooms.get(&match_id).map_or(0, |room| room.len())
    }

    pub fn close_room(&self, match_id: MatchId) {
        self.rooms.remove(&match_id);
    }

    /// The heartbeat driver: on every tick, evict peers that went quiet
    /// and ping the rest.
    pub async fn run_heartbeat(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.heartbeat_sweep(Instant::now());
        }
    }

    /// One heartbeat round, separated out for the tests.
    pub fn heartbeat_sweep(&self, now: Instant) -> usize {
        let mut stale = Vec::new();
        for mut room in self.rooms.iter_mut() {
            let match_id = *room.key();
            for (user_id, conn) in room.value_mut().iter_mut() {
                let quiet_for = now.saturating_duration_since(conn.last_pong);
                if conn.missed_pongs >= 3 || quiet_for > self.config.pong_timeout {
                    info!(%match_id, user_id, ?quiet_for, pings = conn.ping_count,
                        since_ping = ?now.saturating_duration_since(conn.last_ping),
                        "evicting silent peer");
                    stale.push((match_id, user_id.clone()));
                    continue;
                }
                let ping = ServerFrame::Ping { timestamp: epoch_seconds() };
                if conn.tx.try_send(ping).is_ok() {
                    conn.last_ping = now;
                    conn.ping_count += 1;
                } else {
                    conn.missed_pongs += 1;
                }
            }
        }
        let evicted = stale.len();
        for (match_id, user_id) in stale {
            self.detach(match_id, &user_id);
        }
        evicted
    }

}
