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

//! Consumer side of the update queue.
//!
//! # Description
//!
//! The [Engine] processes one update at a time per consumer task:
//!
//! 1. Admission check against the [RateLimiter]. Rejected updates are dropped: they are neither queued nor
//!    retried, and the user gets no answer.
//! 2. Load the state of the conversation from the [StateStore].
//! 3. Hand the state and the update to the [Conversation], which computes the next state.
//! 4. Write the next state back.
//!
//! Steps 2 to 4 are never interleaved with another update of the same chat: every chat is bound to a single
//! consumer by the [crate::UpdateQueue].
//!
//! The whole sequence runs inside [recovery::try_recover], so a panic only loses the update that caused it.

use crate::{Conversation, InboundUpdate, Metrics, RateLimiter, StateStore, recovery};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc::Receiver, watch};
use tracing::{debug, info, instrument, warn};

/// Name of the service used to tag the panics caught by the engine.
const SERVICE: &str = "update-engine";

pub struct Engine<C: Conversation> {
    conversation: C,
    store: Arc<StateStore<C::State>>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<Metrics>,
    admission_timeout: Duration,
}

impl<C: Conversation> Engine<C> {
    pub fn new(
        conversation: C,
        store: Arc<StateStore<C::State>>,
        limiter: Arc<RateLimiter>,
        metrics: Arc<Metrics>,
        admission_timeout: Duration,
    ) -> Self {
        Engine {
            conversation,
            store,
            limiter,
            metrics,
            admission_timeout,
        }
    }

    pub fn store(&self) -> &Arc<StateStore<C::State>> {
        &self.store
    }

    /// Process a single update.
    pub async fn process(&self, update: InboundUpdate) {
        let chat_id = update.chat_id();

        let outcome = recovery::try_recover(SERVICE, async {
            if !self.admit(&update).await {
                return;
            }

            let state = self.store.get_or_create(chat_id).await;
            let next = self.conversation.transition(state, &update).await;
            self.store.set(chat_id, next).await;
            self.metrics.update_processed();
        })
        .await;

        if outcome.is_err() {
            self.metrics.panic_caught();
        }
    }

    async fn admit(&self, update: &InboundUpdate) -> bool {
        let chat_id = update.chat_id();

        match tokio::time::timeout(self.admission_timeout, self.limiter.allow(chat_id)).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Rate limit exceeded by chat {chat_id}, dropping update {}", update.id);
                self.metrics.update_rate_limited();
                false
            }
            Err(_) => {
                warn!("Rate limiter didn't answer in time, admitting update {}", update.id);
                true
            }
        }
    }

    /// Drain `rx` until it closes or `shutdown` is signalled.
    #[instrument(name = "Update consumer", skip_all, fields(worker = worker))]
    pub async fn run(
        self: Arc<Self>,
        worker: usize,
        mut rx: Receiver<InboundUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let update = tokio::select! {
                update = rx.recv() => update,
                _ = shutdown.changed() => break,
            };

            match update {
                Some(update) => {
                    debug!("Processing update {}", update.id);
                    self.process(update).await;
                }
                None => break,
            }
        }

        info!("Consumer stopped");
    }
}

/// Periodic eviction of idle conversations and rate limiter buckets.
#[instrument(name = "Sweeper", skip_all)]
pub async fn sweeper<S>(
    store: Arc<StateStore<S>>,
    limiter: Arc<RateLimiter>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    S: Clone + Default + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let conversations = store.sweep().await;
                let buckets = limiter.sweep().await;
                debug!("Sweep done: {conversations} conversations and {buckets} buckets evicted");
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LimiterSettings, UpdateQueue, store::DEFAULT_STATE_TTL};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use teloxide::types::{ChatId, MessageId};

    /// Conversation that appends the text of each update to the state, and panics on demand.
    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<(Vec<String>, String)>>,
    }

    impl Conversation for Echo {
        type State = Vec<String>;

        async fn transition(&self, mut state: Vec<String>, update: &InboundUpdate) -> Vec<String> {
            let text = match &update.kind {
                crate::UpdateKind::Text(msg) => msg.text.clone(),
                crate::UpdateKind::Callback(press) => press.data.clone(),
            };
            if text == "boom" {
                panic!("conversation exploded");
            }
            self.seen
                .lock()
                .expect("poisoned")
                .push((state.clone(), text.clone()));
            state.push(text);
            state
        }
    }

    fn text(id: u32, chat: i64, text: &str) -> InboundUpdate {
        InboundUpdate::text(id, ChatId(chat), MessageId(id as i32), text)
    }

    fn engine(capacity: u32) -> Engine<Echo> {
        Engine::new(
            Echo::default(),
            Arc::new(StateStore::new(DEFAULT_STATE_TTL)),
            Arc::new(RateLimiter::new(LimiterSettings {
                capacity,
                refill_every: Duration::from_secs(60),
                idle_ttl: Duration::from_secs(600),
            })),
            Arc::new(Metrics::new()),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn stored_state_is_the_last_transition() {
        let engine = engine(100);
        for (id, word) in ["a", "b", "c"].into_iter().enumerate() {
            engine.process(text(id as u32, 1, word)).await;
        }
        engine.process(text(10, 2, "other chat")).await;

        assert_eq!(
            engine.store().get_or_create(ChatId(1)).await,
            vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]
        );
        assert_eq!(engine.store().len().await, 2);
        // Each transition saw the state written by the previous one.
        let seen = engine.conversation.seen.lock().expect("poisoned").clone();
        assert_eq!(seen[2], (vec!["a".to_owned(), "b".to_owned()], "c".to_owned()));
    }

    #[tokio::test]
    async fn rate_limited_updates_are_dropped() {
        let engine = engine(2);
        for id in 0..4 {
            engine.process(text(id, 1, "spam")).await;
        }

        assert_eq!(engine.store().get_or_create(ChatId(1)).await.len(), 2);
        assert_eq!(engine.metrics.snapshot().rate_limited, 2);
        assert_eq!(engine.metrics.snapshot().processed_updates, 2);
    }

    #[tokio::test]
    async fn panics_leave_the_previous_state() {
        let engine = engine(100);
        engine.process(text(1, 1, "a")).await;
        engine.process(text(2, 1, "boom")).await;
        engine.process(text(3, 1, "b")).await;

        assert_eq!(
            engine.store().get_or_create(ChatId(1)).await,
            vec!["a".to_owned(), "b".to_owned()]
        );
        assert_eq!(engine.metrics.snapshot().panics, 1);
    }

    #[tokio::test]
    async fn consumers_drain_the_queue_until_shutdown() {
        let engine = Arc::new(engine(100));
        let metrics = Arc::new(Metrics::new());
        let (queue, receivers) = UpdateQueue::new(2, 8, metrics);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks = Vec::new();
        for (worker, rx) in receivers.into_iter().enumerate() {
            tasks.push(tokio::spawn(engine.clone().run(worker, rx, shutdown_rx.clone())));
        }

        for id in 0..4 {
            assert!(queue.push(text(id, 1, &id.to_string())));
            assert!(queue.push(text(id + 10, 2, &id.to_string())));
        }
        drop(queue);

        for task in tasks {
            task.await.expect("Consumer task failed");
        }
        drop(shutdown_tx);

        let expected: Vec<String> = (0..4).map(|i| i.to_string()).collect();
        assert_eq!(engine.store().get_or_create(ChatId(1)).await, expected);
        assert_eq!(engine.store().get_or_create(ChatId(2)).await, expected);
    }
}
