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

//! FIFO matchmaking. All operations are short and run under one lock;
//! pairing only picks the opponent and the match id — actually creating
//! the match happens in the caller, after the lock is long gone.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use uuid::Uuid;

use crate::MatchId;

#[derive(Debug, Clone)]
struct QueueEntry {
    user_id: String,
    joined_at: Instant,
}

#[derive(Debug, Clone)]
struct MatchedPair {
    players: [String; 2],
    created_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<QueueEntry>,
    matched: HashMap<MatchId, MatchedPair>,
}

/// What an enqueue attempt produced. An already-queued user gets their
/// current queue view back, not a second slot.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EnqueueOutcome {
    Queued { position: usize, queue_size: usize, waited: Duration },
    Paired { game_id: MatchId, players: [String; 2] },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum QueueStatus {
    Queued { position: usize, queue_size: usize, waited: Duration, average_wait: Duration },
    Matched { game_id: MatchId },
    NotQueued,
}

#[derive(Debug, Default)]
pub struct Matchmaker {
    inner: Mutex<Inner>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("matchmaking lock poisoned")
    }

    /// Join the queue: pair with the head if someone is waiting, append
    /// otherwise. Stale matched records of this user are purged first, so
    /// a finished game never shadows a fresh attempt.
    pub fn enqueue(&self, user_id: &str) -> EnqueueOutcome {
        let mut inner = self.lock();
        inner.matched.retain(|_, pair| !pair.players.iter().any(|p| p == user_id));

        if let Some(position) = inner.queue.iter().position(|e| e.user_id == user_id) {
            let waited = inner.queue[position].joined_at.elapsed();
            debug!(user_id, position, "already queued");
            return EnqueueOutcome::Queued { position, queue_size: inner.queue.len(), waited };
        }

        if let Some(head) = inner.queue.pop_front() {
            let game_id = Uuid::new_v4();
            let players = [head.user_id, user_id.to_string()];
            inner
                .matched
                .insert(game_id, MatchedPair { players: players.clone(), created_at: Instant::now() });
            info!(%game_id, first = %players[0], second = %players[1],
                waited = ?head.joined_at.elapsed(), "paired");
            return EnqueueOutcome::Paired { game_id, players };
        }

        inner.queue.push_back(QueueEntry { user_id: user_id.to_string(), joined_at: Instant::now() });
        let queue_size = inner.queue.len();
        debug!(user_id, position = queue_size - 1, "queued");
        EnqueueOutcome::Queued { position: queue_size - 1, queue_size, waited: Duration::ZERO }
    }

    pub fn leave(&self, user_id: &str) -> bool {
        let mut inner = self.lock();
        let before = inner.queue.len();
        inner.queue.retain(|e| e.user_id != user_id);
        before != inner.queue.len()
    }

    /// The user's view of the queue. A `Matched` answer only says a pair
    /// record exists; whether the match is still alive is for the caller
    /// to verify (and to [`discard`](Self::discard) when it is not).
    pub fn status(&self, user_id: &str) -> QueueStatus {
        let inner = self.lock();
        if let Some(position) = inner.queue.iter().position(|e| e.user_id == user_id) {
            let waited = inner.queue[position].joined_at.elapsed();
            let average_wait = average(&inner.queue);
            return QueueStatus::Queued {
                position,
                queue_size: inner.queue.len(),
                waited,
                average_wait,
            };
        }
        for (game_id, pair) in &inner.matched {
            if pair.players.iter().any(|p| p == user_id) {
                return QueueStatus::Matched { game_id: *game_id };
            }
        }
        QueueStatus::NotQueued
    }

    /// Forget a matched record, typically because the game it points at
    /// is gone or finished.
    pub fn discard(&self, game_id: MatchId) {
        self.lock().matched.remove(&game_id);
    }

    /// Drop queue entries and matched records older than `max_age`.
    /// Returns `(queue entries, matched records)` removed.
    pub fn reap(&self, max_age: Duration) -> (usize, usize) {
        let mut inner = self.lock();
        let before_queue = inner.queue.len();
        inner.queue.retain(|e| e.joined_at.elapsed() <= max_age);
        let before_matched = inner.matched.len();
        inner.matched.retain(|_, pair| pair.created_at.elapsed() <= max_age);
        let reaped = (before_queue - inner.queue.len(), before_matched - inner.matched.len());
        if reaped != (0, 0) {
            info!(queue = reaped.0, matched = reaped.1, "matchmaking cleanup");
        }
        reaped
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }
}

fn average(queue: &VecDeque<QueueEntry>) -> Duration {
    if queue.is_empty() {
        return Duration::ZERO;
    }
    let total: Duration = queue.iter().map(|e| e.joined_at.elapsed()).sum();
    total / queue.len() as u32
}
