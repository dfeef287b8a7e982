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

//! Counters of the update pipeline.
//!
//! # Description
//!
//! A single [Metrics] instance is built by the entry point of the application and shared (`Arc`) between
//! the poller, the queue and the consumers. The health endpoint publishes a [MetricsSnapshot].

use serde::Serialize;
use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct Metrics {
    polled_updates: AtomicU64,
    poll_errors: AtomicU64,
    processed_updates: AtomicU64,
    dropped_updates: AtomicU64,
    rate_limited: AtomicU64,
    panics: AtomicU64,
    last_poll_ok: Mutex<Option<Instant>>,
}

/// Point in time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub polled_updates: u64,
    pub poll_errors: u64,
    pub processed_updates: u64,
    pub dropped_updates: u64,
    pub rate_limited: u64,
    pub panics: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn update_polled(&self, count: u64) {
        self.polled_updates.fetch_add(count, Ordering::Relaxed);
        if let Ok(mut last) = self.last_poll_ok.lock() {
            *last = Some(Instant::now());
        }
    }

    pub fn poll_failed(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_processed(&self) {
        self.processed_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_dropped(&self) {
        self.dropped_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn panic_caught(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Time elapsed since the last successful poll. `None` if no poll succeeded yet.
    pub fn since_last_poll(&self) -> Option<Duration> {
        self.last_poll_ok
            .lock()
            .ok()
            .and_then(|last| last.map(|t| t.elapsed()))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            polled_updates: self.polled_updates.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            processed_updates: self.processed_updates.load(Ordering::Relaxed),
            dropped_updates: self.dropped_updates.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
        }
    }
}
