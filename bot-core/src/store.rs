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

//! Store of the conversation state of each chat.
//!
//! # Description
//!
//! The store keeps in the main memory the current state of the conversation of each chat with the bot, along
//! with some bookkeeping: when the entry was created and when it was used for the last time.
//!
//! # Main features
//!
//! - The store is _async-ready_ which means it allows being shared across multiple tasks. Concurrent readers
//!   are supported, but only a writer is allowed per shard at a time. The internal HashMap is sharded to
//!   minimize contention.
//! - Readers get a copy of the state. Mutating it has no effect until it is written back using
//!   [StateStore::set], which replaces the stored state as a whole.
//! - Entries that were idle for longer than the TTL are evicted by [StateStore::sweep].
//!
//! # Implementation
//!
//! [whirlwind::ShardMap] is the choice for the concurrent HashMap with sharding. It does not allow iterating
//! over the entries, which is needed by the sweep. To cope with that, a [HashSet] keeps the list of keys.
//!
//! Every write locks the key index before touching the map, and keeps it locked until the map is updated.
//! Thus the index and the map always agree, and the sweep checks and evicts an entry without a write of the
//! same chat slipping in between. Reads don't take the index lock.

use std::collections::HashSet;
use std::time::Duration;
use teloxide::types::ChatId;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, trace};
use whirlwind::ShardMap;

/// Default idle time after which a conversation is forgotten.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
struct Entry<S> {
    state: S,
    created_at: Instant,
    last_seen: Instant,
}

impl<S> Entry<S> {
    fn new(state: S) -> Self {
        let now = Instant::now();
        Entry {
            state,
            created_at: now,
            last_seen: now,
        }
    }
}

pub struct StateStore<S> {
    data: ShardMap<ChatId, Entry<S>>,
    keys: Mutex<HashSet<ChatId>>,
    ttl: Duration,
}

impl<S> StateStore<S>
where
    S: Clone + Default + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        StateStore {
            data: ShardMap::new(),
            keys: Mutex::new(HashSet::new()),
            ttl,
        }
    }

    pub fn with_shards(ttl: Duration, shards: usize) -> Self {
        StateStore {
            data: ShardMap::with_shards(shards),
            keys: Mutex::new(HashSet::new()),
            ttl,
        }
    }

    /// Current state of the conversation, or the default state if the chat is new.
    pub async fn get_or_create(&self, key: ChatId) -> S {
        if let Some(entry) = self.data.get(&key).await {
            return entry.state.clone();
        }

        let mut keys = self.keys.lock().await;
        // A write may have landed while waiting for the index.
        if let Some(entry) = self.data.get(&key).await {
            return entry.state.clone();
        }

        trace!("New conversation for {key}");
        let state = S::default();
        self.data.insert(key, Entry::new(state.clone())).await;
        keys.insert(key);

        state
    }

    /// Replace the state of a conversation.
    pub async fn set(&self, key: ChatId, state: S) {
        let mut keys = self.keys.lock().await;

        if let Some(mut entry) = self.data.get_mut(&key).await {
            entry.state = state;
            entry.last_seen = Instant::now();
            return;
        }

        self.data.insert(key, Entry::new(state)).await;
        keys.insert(key);
    }

    pub async fn delete(&self, key: ChatId) {
        let mut keys = self.keys.lock().await;
        self.data.remove(&key).await;
        keys.remove(&key);
    }

    /// Time since the conversation was created, if it exists.
    pub async fn age(&self, key: ChatId) -> Option<Duration> {
        self.data
            .get(&key)
            .await
            .map(|entry| entry.created_at.elapsed())
    }

    /// Evict the conversations that were idle for longer than the TTL. Returns how many were evicted.
    ///
    /// # Description
    ///
    /// Writes are blocked while the sweep runs.
    pub async fn sweep(&self) -> usize {
        let mut keys = self.keys.lock().await;
        let now = Instant::now();
        let candidates: Vec<ChatId> = keys.iter().copied().collect();
        let mut evicted = 0;

        for key in candidates {
            let expired = match self.data.get(&key).await {
                Some(entry) => now.saturating_duration_since(entry.last_seen) > self.ttl,
                None => true,
            };

            if expired {
                self.data.remove(&key).await;
                keys.remove(&key);
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!("Evicted {evicted} idle conversations");
        }

        evicted
    }

    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    enum Flow {
        #[default]
        Idle,
        Collecting {
            fields: Vec<String>,
        },
    }

    #[tokio::test]
    async fn new_chats_start_idle() {
        let store = StateStore::<Flow>::new(DEFAULT_STATE_TTL);
        assert_eq!(store.get_or_create(ChatId(1)).await, Flow::Idle);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn reads_see_the_last_write() {
        let store = StateStore::<Flow>::new(DEFAULT_STATE_TTL);
        let state = Flow::Collecting {
            fields: vec!["Ivan Petrov".to_owned()],
        };
        store.set(ChatId(1), state.clone()).await;
        assert_eq!(store.get_or_create(ChatId(1)).await, state);
    }

    #[tokio::test]
    async fn local_copies_do_not_alias_the_store() {
        let store = StateStore::<Flow>::new(DEFAULT_STATE_TTL);
        store
            .set(
                ChatId(1),
                Flow::Collecting {
                    fields: vec!["a".to_owned()],
                },
            )
            .await;

        let mut copy = store.get_or_create(ChatId(1)).await;
        if let Flow::Collecting { fields } = &mut copy {
            fields.push("b".to_owned());
        }

        assert_eq!(
            store.get_or_create(ChatId(1)).await,
            Flow::Collecting {
                fields: vec!["a".to_owned()]
            }
        );
    }

    #[tokio::test]
    async fn delete_forgets_the_conversation() {
        let store = StateStore::<Flow>::new(DEFAULT_STATE_TTL);
        store
            .set(ChatId(5), Flow::Collecting { fields: vec![] })
            .await;
        store.delete(ChatId(5)).await;
        assert!(store.is_empty().await);
        assert_eq!(store.get_or_create(ChatId(5)).await, Flow::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_idle_entries_only() {
        let ttl = Duration::from_secs(60);
        let store = StateStore::<Flow>::new(ttl);
        store.get_or_create(ChatId(1)).await;
        store.get_or_create(ChatId(2)).await;

        tokio::time::advance(Duration::from_secs(45)).await;
        // Refresh the second conversation.
        store
            .set(ChatId(2), Flow::Collecting { fields: vec![] })
            .await;
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(
            store.get_or_create(ChatId(2)).await,
            Flow::Collecting { fields: vec![] }
        );
        assert_eq!(store.age(ChatId(2)).await, Some(Duration::from_secs(65)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sweeps_and_writes_keep_the_index_in_sync() {
        let store = Arc::new(StateStore::<Flow>::with_shards(Duration::from_nanos(1), 4));

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for step in 0..200 {
                    store
                        .set(
                            ChatId(1),
                            Flow::Collecting {
                                fields: vec![step.to_string()],
                            },
                        )
                        .await;
                    tokio::task::yield_now().await;
                }
            })
        };
        let sweeper = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    store.sweep().await;
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.expect("Writer task failed");
        sweeper.await.expect("Sweeper task failed");

        let in_map = store.data.get(&ChatId(1)).await.is_some();
        let in_index = store.keys.lock().await.contains(&ChatId(1));
        assert_eq!(in_map, in_index);

        tokio::time::sleep(Duration::from_millis(1)).await;
        store.sweep().await;
        assert!(store.data.get(&ChatId(1)).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sweeps_never_drop_fresh_writes() {
        let store = Arc::new(StateStore::<Flow>::with_shards(Duration::from_secs(60), 4));

        let sweeper = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    store.sweep().await;
                    tokio::task::yield_now().await;
                }
            })
        };

        for step in 0..200 {
            let state = Flow::Collecting {
                fields: vec![step.to_string()],
            };
            store.set(ChatId(step), state.clone()).await;
            assert_eq!(store.get_or_create(ChatId(step)).await, state);
        }

        sweeper.await.expect("Sweeper task failed");
        assert_eq!(store.len().await, 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_keep_one_entry_per_chat() {
        let store = Arc::new(StateStore::<Flow>::with_shards(DEFAULT_STATE_TTL, 4));
        let mut tasks = Vec::new();

        for chat in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for step in 0..50 {
                    let mut fields = match store.get_or_create(ChatId(chat)).await {
                        Flow::Idle => Vec::new(),
                        Flow::Collecting { fields } => fields,
                    };
                    fields.push(step.to_string());
                    store.set(ChatId(chat), Flow::Collecting { fields }).await;
                }
            }));
        }

        for task in tasks {
            task.await.expect("Writer task failed");
        }

        assert_eq!(store.len().await, 16);
        for chat in 0..16 {
            match store.get_or_create(ChatId(chat)).await {
                Flow::Collecting { fields } => assert_eq!(fields.len(), 50),
                Flow::Idle => panic!("Conversation {chat} lost its state"),
            }
        }
    }
}
