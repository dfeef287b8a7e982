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

//! Long polling loop.
//!
//! # Description
//!
//! The poller requests the updates newer than its offset. When a batch is received, the offset moves past the
//! greatest update ID of the batch, so the same updates are not requested again; this is a cursor, not an
//! acknowledgement per update. When the request fails, the offset is left untouched and the request is
//! retried after a delay computed by the [Backoff].
//!
//! Errors never stop the loop. Only the shutdown signal does.

use crate::{Backoff, Metrics, Polled, TransportError, UpdateQueue, UpdateSource};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

pub struct Poller<U> {
    source: Arc<U>,
    backoff: Backoff,
    offset: u32,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl<U: UpdateSource> Poller<U> {
    pub fn new(source: Arc<U>, backoff: Backoff, timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Poller {
            source,
            backoff,
            offset: 0,
            timeout,
            metrics,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Run a single poll and push the result into the queue.
    ///
    /// # Description
    ///
    /// Returns how many updates were accepted by the queue. On error, the backoff is **not** applied here.
    pub async fn poll_once(&mut self, queue: &UpdateQueue) -> Result<usize, TransportError> {
        let batch = self.source.poll_updates(self.offset, self.timeout).await?;
        Ok(self.accept(batch, queue))
    }

    fn accept(&mut self, batch: Vec<Polled>, queue: &UpdateQueue) -> usize {
        self.backoff.reset();
        self.metrics.update_polled(batch.len() as u64);

        if let Some(last) = batch.iter().map(|p| p.update_id).max() {
            self.offset = self.offset.max(last.saturating_add(1));
        }

        let mut accepted = 0;
        for polled in batch {
            match polled.update {
                Some(update) => {
                    if queue.push(update) {
                        accepted += 1;
                    }
                }
                None => debug!("Skipping unsupported update {}", polled.update_id),
            }
        }

        accepted
    }

    /// Poll until `shutdown` is signalled.
    #[instrument(name = "Update poller", skip_all)]
    pub async fn run(mut self, queue: UpdateQueue, mut shutdown: watch::Receiver<bool>) {
        info!("Update poller started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                result = self.source.poll_updates(self.offset, self.timeout) => result,
                _ = shutdown.changed() => break,
            };

            match result {
                Ok(batch) => {
                    let received = batch.len();
                    let accepted = self.accept(batch, &queue);
                    if received > 0 {
                        debug!("Received {received} updates, {accepted} enqueued");
                    }
                }
                Err(e) => {
                    self.metrics.poll_failed();
                    let delay = self.backoff.next();
                    warn!(
                        "Failed to poll updates (attempt {}): {e}. Retrying in {delay:?}",
                        self.backoff.attempts()
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }

        info!("Update poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackoffSettings, InboundUpdate};
    use pretty_assertions::assert_eq;
    use std::{collections::VecDeque, sync::Mutex};
    use teloxide::types::{ChatId, MessageId};

    /// Scripted source: pops one answer per call and records the requested offsets.
    struct ScriptedSource {
        answers: Mutex<VecDeque<Result<Vec<Polled>, TransportError>>>,
        offsets: Mutex<Vec<u32>>,
    }

    impl ScriptedSource {
        fn new(answers: Vec<Result<Vec<Polled>, TransportError>>) -> Self {
            ScriptedSource {
                answers: Mutex::new(answers.into()),
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<u32> {
            self.offsets.lock().expect("poisoned").clone()
        }
    }

    impl UpdateSource for ScriptedSource {
        async fn poll_updates(
            &self,
            offset: u32,
            _timeout: Duration,
        ) -> Result<Vec<Polled>, TransportError> {
            self.offsets.lock().expect("poisoned").push(offset);
            let answer = self.answers.lock().expect("poisoned").pop_front();
            match answer {
                Some(answer) => answer,
                // Out of script: behave like an idle long poll.
                None => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn polled(id: u32, chat: i64) -> Polled {
        Polled {
            update_id: id,
            update: Some(InboundUpdate::text(
                id,
                ChatId(chat),
                MessageId(1),
                "hi",
            )),
        }
    }

    fn poller(source: Arc<ScriptedSource>, metrics: Arc<Metrics>) -> Poller<ScriptedSource> {
        Poller::new(
            source,
            Backoff::new(BackoffSettings {
                base: Duration::from_millis(100),
                multiplier: 2.0,
                max_delay: Duration::from_secs(1),
                max_attempts: 3,
            }),
            Duration::from_secs(30),
            metrics,
        )
    }

    #[tokio::test]
    async fn offset_moves_past_the_greatest_id() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![polled(7, 1), polled(5, 2), polled(9, 1)]),
            Ok(vec![]),
        ]));
        let metrics = Arc::new(Metrics::new());
        let (queue, mut receivers) = UpdateQueue::new(1, 16, metrics.clone());
        let mut poller = poller(source.clone(), metrics.clone());

        assert_eq!(poller.poll_once(&queue).await, Ok(3));
        assert_eq!(poller.offset(), 10);
        // An empty batch leaves the offset alone.
        assert_eq!(poller.poll_once(&queue).await, Ok(0));
        assert_eq!(poller.offset(), 10);
        assert_eq!(source.offsets(), vec![0, 10]);

        let rx = &mut receivers[0];
        let ids: Vec<u32> = (0..3).filter_map(|_| rx.try_recv().ok().map(|u| u.id)).collect();
        assert_eq!(ids, vec![7, 5, 9]);
        assert_eq!(metrics.snapshot().polled_updates, 3);
    }

    #[tokio::test]
    async fn unsupported_updates_advance_the_offset_only() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![
            polled(3, 1),
            Polled {
                update_id: 4,
                update: None,
            },
        ])]));
        let metrics = Arc::new(Metrics::new());
        let (queue, _receivers) = UpdateQueue::new(1, 16, metrics.clone());
        let mut poller = poller(source, metrics);

        assert_eq!(poller.poll_once(&queue).await, Ok(1));
        assert_eq!(poller.offset(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_retry_the_same_offset() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![polled(1, 1)]),
            Err(TransportError::Network("connection reset".to_owned())),
            Err(TransportError::Network("connection reset".to_owned())),
            Ok(vec![polled(2, 1)]),
        ]));
        let metrics = Arc::new(Metrics::new());
        let (queue, mut receivers) = UpdateQueue::new(1, 16, metrics.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(poller(source.clone(), metrics.clone()).run(queue, shutdown_rx));

        let rx = &mut receivers[0];
        assert_eq!(rx.recv().await.map(|u| u.id), Some(1));
        assert_eq!(rx.recv().await.map(|u| u.id), Some(2));

        shutdown_tx.send(true).expect("Failed to signal shutdown");
        task.await.expect("Poller task failed");

        assert_eq!(&source.offsets()[..4], &[0, 2, 2, 2]);
        assert_eq!(metrics.snapshot().poll_errors, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_pending_poll() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let metrics = Arc::new(Metrics::new());
        let (queue, _receivers) = UpdateQueue::new(1, 16, metrics.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(poller(source, metrics).run(queue, shutdown_rx));
        tokio::task::yield_now().await;
        shutdown_tx.send(true).expect("Failed to signal shutdown");

        task.await.expect("Poller task failed");
    }
}
