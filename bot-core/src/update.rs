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

//! Inbound updates as seen by the conversation engine.
//!
//! # Description
//!
//! The Telegram API delivers many kinds of updates. The engine only cares about two of them: text messages
//! and presses of inline keyboard buttons. The transport translates the raw updates into [InboundUpdate]s and
//! marks everything else as unsupported, see [Polled].

use teloxide::types::{ChatId, MessageId};

/// An update that the engine knows how to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    /// Update ID assigned by the transport. Used to advance the poll offset.
    pub id: u32,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    Text(TextMessage),
    Callback(CallbackPress),
}

/// Free text sent by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
}

/// Press of an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPress {
    /// Chat in which the keyboard was shown.
    pub chat_id: ChatId,
    /// Message that holds the keyboard, so the handler can edit it in place.
    pub message_id: Option<MessageId>,
    /// Correlation ID used to acknowledge the press.
    pub query_id: String,
    /// Payload chosen by the bot when it built the keyboard.
    pub data: String,
}

/// Raw result of a poll: every update advances the offset, but only some of them carry work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polled {
    pub update_id: u32,
    pub update: Option<InboundUpdate>,
}

impl InboundUpdate {
    pub fn text(id: u32, chat_id: ChatId, message_id: MessageId, text: &str) -> Self {
        InboundUpdate {
            id,
            kind: UpdateKind::Text(TextMessage {
                chat_id,
                message_id,
                text: text.to_owned(),
            }),
        }
    }

    pub fn callback(
        id: u32,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        query_id: &str,
        data: &str,
    ) -> Self {
        InboundUpdate {
            id,
            kind: UpdateKind::Callback(CallbackPress {
                chat_id,
                message_id,
                query_id: query_id.to_owned(),
                data: data.to_owned(),
            }),
        }
    }

    /// The conversation this update belongs to.
    pub fn chat_id(&self) -> ChatId {
        match &self.kind {
            UpdateKind::Text(msg) => msg.chat_id,
            UpdateKind::Callback(press) => press.chat_id,
        }
    }
}
