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

//! Bounded queue between the poller and the consumers.
//!
//! # Description
//!
//! The queue is split in as many shards as consumers. Updates of a chat always land in the same shard, so
//! they are processed in the order the poller received them, whatever the number of consumers.
//!
//! Pushing never blocks: stalling the poller would delay the updates of every user, not only those of the
//! user that floods the bot. When a shard is full the update is dropped.

use crate::{InboundUpdate, Metrics};
use std::sync::Arc;
use teloxide::types::ChatId;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tracing::warn;

#[derive(Clone)]
pub struct UpdateQueue {
    shards: Vec<Sender<InboundUpdate>>,
    metrics: Arc<Metrics>,
}

impl UpdateQueue {
    /// Build a queue with `workers` shards of `capacity` updates each.
    ///
    /// # Description
    ///
    /// Returns the producer side, and a receiver per shard that shall be handed to a consumer.
    pub fn new(
        workers: usize,
        capacity: usize,
        metrics: Arc<Metrics>,
    ) -> (Self, Vec<Receiver<InboundUpdate>>) {
        let (shards, receivers): (Vec<_>, Vec<_>) = (0..workers.max(1))
            .map(|_| mpsc::channel(capacity.max(1)))
            .unzip();

        (UpdateQueue { shards, metrics }, receivers)
    }

    fn shard(&self, chat_id: ChatId) -> &Sender<InboundUpdate> {
        let index = chat_id.0.unsigned_abs() % self.shards.len() as u64;
        &self.shards[index as usize]
    }

    /// Enqueue an update. Returns `false` when it was dropped.
    pub fn push(&self, update: InboundUpdate) -> bool {
        let chat_id = update.chat_id();

        match self.shard(chat_id).try_send(update) {
            Ok(()) => true,
            Err(TrySendError::Full(update)) => {
                warn!(
                    "Queue full, dropping update {} from chat {chat_id}",
                    update.id
                );
                self.metrics.update_dropped();
                false
            }
            Err(TrySendError::Closed(update)) => {
                warn!(
                    "Consumer gone, dropping update {} from chat {chat_id}",
                    update.id
                );
                self.metrics.update_dropped();
                false
            }
        }
    }
}
