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

//! Health endpoint.
//!
//! # Description
//!
//! `GET /health` reports the counters of the update pipeline along with the size of the in-memory tables.
//! The bot is considered unhealthy when the poller didn't complete a poll for longer than the configured
//! threshold. In that case the endpoint answers with `503 Service Unavailable`, so the orchestrator can
//! restart the process.

use crate::State;
use axum::{
    Json, Router,
    extract::State as Extract,
    http::StatusCode,
    routing::get,
};
use bot_core::{Metrics, MetricsSnapshot, RateLimiter, StateStore};
use serde::Serialize;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

#[derive(Clone)]
pub struct HealthState {
    store: Arc<StateStore<State>>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<Metrics>,
    started: Instant,
    stale_after: Duration,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub conversations: usize,
    pub limiter_buckets: usize,
    /// Seconds since the last successful poll. `None` before the first one.
    pub last_poll_secs: Option<u64>,
    pub metrics: MetricsSnapshot,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

impl HealthState {
    pub fn new(
        store: Arc<StateStore<State>>,
        limiter: Arc<RateLimiter>,
        metrics: Arc<Metrics>,
        stale_after: Duration,
    ) -> Self {
        HealthState {
            store,
            limiter,
            metrics,
            started: Instant::now(),
            stale_after,
        }
    }

    pub async fn report(&self) -> HealthReport {
        let last_poll = self.metrics.since_last_poll();
        // Before the first poll, the bot gets the threshold counted from the start up.
        let silence = last_poll.unwrap_or_else(|| self.started.elapsed());

        HealthReport {
            status: if silence >= self.stale_after { "stale" } else { "ok" },
            conversations: self.store.len().await,
            limiter_buckets: self.limiter.len().await,
            last_poll_secs: last_poll.map(|d| d.as_secs()),
            metrics: self.metrics.snapshot(),
        }
    }
}

pub async fn health(Extract(state): Extract<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.report().await;

    let code = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(report))
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}
