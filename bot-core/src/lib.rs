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

//! `BotCore` library crate.
//!
//! # Description
//!
//! This crate includes the machinery that moves updates from the Telegram API to the handlers of the bot,
//! without knowing anything about what those handlers do:
//!
//! - [Poller]: long-polls the chat API and pushes the received updates into the [UpdateQueue].
//! - [Engine]: drains the queue. For each update it checks the [RateLimiter], loads the state of the
//!   conversation from the [StateStore], asks the [Conversation] for the next state and writes it back. All
//!   of that runs inside the panic isolation wrapper of the [recovery] module.
//!
//! The collaborators of the engine are modelled as traits, so the bot can plug the Telegram client, and tests
//! can plug fakes:
//!
//! - [UpdateSource]: where updates come from.
//! - [Messenger]: how the handlers talk back to the users.
//! - [Conversation]: the state machine of the bot.

use std::{future::Future, time::Duration};
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId};
use thiserror::Error;

pub mod backoff;
pub mod engine;
pub mod limiter;
pub mod metrics;
pub mod payload;
pub mod poller;
pub mod queue;
pub mod recovery;
pub mod store;
pub mod update;

pub use backoff::{Backoff, BackoffSettings};
pub use engine::{Engine, sweeper};
pub use limiter::{LimiterSettings, RateLimiter};
pub use metrics::{Metrics, MetricsSnapshot};
pub use payload::{CallbackPayload, PayloadError};
pub use poller::Poller;
pub use queue::UpdateQueue;
pub use store::StateStore;
pub use update::{CallbackPress, InboundUpdate, Polled, TextMessage, UpdateKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error while talking to the chat API: {0}")]
    Network(String),
    #[error("the chat API rejected the request: {0}")]
    Api(String),
}

/// Source of inbound updates.
pub trait UpdateSource: Send + Sync {
    /// Request the updates whose ID is equal or greater than `offset`.
    ///
    /// # Description
    ///
    /// The call might block up to `timeout` when there's nothing new. The caller computes the next offset as
    /// the greatest received update ID + 1.
    fn poll_updates(
        &self,
        offset: u32,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<Polled>, TransportError>> + Send;
}

/// Outbound side of the chat API.
///
/// # Description
///
/// Failures are reported but never retried by the callers.
pub trait Messenger: Send + Sync {
    fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Replace the content of a message. Implementations fall back to sending a new message when the
    /// edition fails.
    fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Acknowledge the press of a button, so the client stops showing the loading spinner.
    fn acknowledge(&self, query_id: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// State machine driven by the [Engine].
pub trait Conversation: Send + Sync + 'static {
    type State: Clone + Default + Send + Sync + 'static;

    /// Process an update and compute the next state of the conversation.
    ///
    /// # Description
    ///
    /// The returned state replaces the stored one as a whole. Errors must be handled by the implementation:
    /// there's always a next state.
    fn transition(
        &self,
        state: Self::State,
        update: &InboundUpdate,
    ) -> impl Future<Output = Self::State> + Send;
}
