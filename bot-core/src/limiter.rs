// Copyright 2025 Felipe Torres González
//
//    Licensed under the Apache License, Version 2.0 (the "License");
//    you may not use this file except in compliance with the License.
//    You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
//    Unless required by applicable law or agreed to in writing, software
//    distributed under the License is distributed on an "AS IS" BASIS,
//    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//    See the License for the specific language governing permissions and
//    limitations under the License.

//! Per-user token bucket rate limiter.
//!
//! # Description
//!
//! Each chat gets its own bucket of `capacity` tokens, created on first use. Processing an update consumes a
//! token. Tokens come back lazily: one per `refill_every` elapsed since the last refill, computed when the
//! bucket is checked. There are no timers per bucket; a periodic [RateLimiter::sweep] drops buckets of chats
//! that were idle for longer than `idle_ttl` so the map doesn't grow forever.
//!
//! A `capacity` or `refill_every` of zero disables the limiter.

use std::collections::HashMap;
use std::time::Duration;
use teloxide::types::ChatId;
use tokio::{
    sync::{Mutex, watch},
    time::Instant,
};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    pub capacity: u32,
    pub refill_every: Duration,
    pub idle_ttl: Duration,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        LimiterSettings {
            capacity: 10,
            refill_every: Duration::from_secs(1),
            idle_ttl: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Bucket {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    /// Add the tokens earned since the last refill. The fraction of an interval that didn't complete yet is
    /// kept for the next refill.
    fn refill(&mut self, settings: &LimiterSettings, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let intervals = elapsed.as_nanos() / settings.refill_every.as_nanos();

        if intervals == 0 {
            return;
        }

        let missing = settings.capacity - self.tokens;
        if intervals >= missing as u128 {
            self.tokens = settings.capacity;
            self.last_refill = now;
        } else {
            let intervals = intervals as u32;
            self.tokens += intervals;
            self.last_refill += settings.refill_every * intervals;
        }
    }

    /// Time until the next token shows up.
    fn next_token_in(&self, settings: &LimiterSettings, now: Instant) -> Duration {
        (self.last_refill + settings.refill_every).saturating_duration_since(now)
    }
}

pub struct RateLimiter {
    settings: LimiterSettings,
    buckets: Mutex<HashMap<ChatId, Bucket>>,
}

impl RateLimiter {
    pub fn new(settings: LimiterSettings) -> Self {
        RateLimiter {
            settings,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn disabled(&self) -> bool {
        self.settings.capacity == 0 || self.settings.refill_every.is_zero()
    }

    /// Admission check. Consumes a token when one is available.
    pub async fn allow(&self, key: ChatId) -> bool {
        if self.disabled() {
            return true;
        }

        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        // Check and create under the same lock, so racing callers share a single bucket.
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| Bucket::full(self.settings.capacity, now));
        bucket.refill(&self.settings, now);
        bucket.last_seen = now;

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            trace!("Token granted to {key}, {} left", bucket.tokens);
            true
        } else {
            false
        }
    }

    /// Blocking flavour of [RateLimiter::allow].
    ///
    /// # Description
    ///
    /// Waits until a token is available for `key`. Returns `false` if `shutdown` fires before that.
    pub async fn wait(&self, key: ChatId, mut shutdown: watch::Receiver<bool>) -> bool {
        loop {
            if *shutdown.borrow() {
                return false;
            }

            let pause = {
                if self.disabled() {
                    return true;
                }
                let now = Instant::now();
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(key)
                    .or_insert_with(|| Bucket::full(self.settings.capacity, now));
                bucket.refill(&self.settings, now);
                bucket.last_seen = now;

                if bucket.tokens > 0 {
                    bucket.tokens -= 1;
                    return true;
                }
                bucket.next_token_in(&self.settings, now)
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Drop the buckets of chats that were idle for longer than `idle_ttl`. Returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, b| now.saturating_duration_since(b.last_seen) <= self.settings.idle_ttl);
        let dropped = before - buckets.len();

        if dropped > 0 {
            debug!("Dropped {dropped} idle rate limiter buckets");
        }

        dropped
    }

    pub async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.lock().await.is_empty()
    }
}
