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

//! Telegram transport.
//!
//! # Description
//!
//! [TelegramClient] plugs the Bot API into the engine: it is both the [UpdateSource] of the poller and the
//! [Messenger] of the handlers. Outgoing requests go through the `Throttle` adaptor of teloxide, so the bot
//! stays within the limits of the API when several chats are served at once.
//!
//! Only text messages and presses of inline buttons are translated. The rest of the updates advance the
//! poll offset and are ignored.

use crate::Command;
use bot_core::{InboundUpdate, Messenger, Polled, TransportError, UpdateSource};
use std::time::Duration;
use teloxide::{
    ApiError, RequestError,
    adaptors::{Throttle, throttle::Limits},
    prelude::*,
    types::{
        AllowedUpdate, CallbackQueryId, InlineKeyboardMarkup, MessageId, ParseMode, Update, UpdateKind,
    },
    utils::command::BotCommands,
};
use tracing::{debug, info};

/// Extra time given to the HTTP client on top of the long poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    bot: Throttle<Bot>,
}

impl TelegramClient {
    /// Build a client for the bot identified by `token`.
    ///
    /// # Description
    ///
    /// The HTTP client must wait longer than the server holds a long poll, otherwise every empty poll would
    /// fail with a timeout.
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self, TransportError> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(poll_timeout + POLL_GRACE)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let bot = Bot::with_client(token, client).throttle(Limits::default());

        Ok(TelegramClient { bot })
    }

    /// Publish the commands of the bot, so clients can suggest them.
    pub async fn register_commands(&self) -> Result<(), TransportError> {
        self.bot
            .set_my_commands(Command::bot_commands())
            .await
            .map_err(transport_error)?;
        debug!("Commands of the bot registered");

        Ok(())
    }

    /// Username of the bot, needed to parse commands addressed to it.
    pub async fn username(&self) -> Result<String, TransportError> {
        let me = self.bot.get_me().await.map_err(transport_error)?;
        let username = me.user.username.clone().unwrap_or_default();
        info!("Connected to the Bot API as @{username}");

        Ok(username)
    }
}

fn transport_error(e: RequestError) -> TransportError {
    match e {
        RequestError::Network(e) => TransportError::Network(e.to_string()),
        RequestError::Io(e) => TransportError::Network(e.to_string()),
        e => TransportError::Api(e.to_string()),
    }
}

/// Translate a raw update into the model of the engine.
fn translate(update: Update) -> Polled {
    let update_id = update.id.0;

    let inbound = match update.kind {
        UpdateKind::Message(msg) => msg
            .text()
            .map(|text| InboundUpdate::text(update_id, msg.chat.id, msg.id, text)),
        UpdateKind::CallbackQuery(query) => query.data.as_deref().map(|data| {
            let (chat_id, message_id) = match &query.message {
                Some(message) => (message.chat().id, Some(message.id())),
                // Buttons of inline mode messages: answer in the private chat of the user.
                None => (ChatId::from(query.from.id), None),
            };
            InboundUpdate::callback(update_id, chat_id, message_id, &query.id.0, data)
        }),
        _ => None,
    };

    if inbound.is_none() {
        debug!("Ignoring unsupported update {update_id}");
    }

    Polled {
        update_id,
        update: inbound,
    }
}

impl UpdateSource for TelegramClient {
    async fn poll_updates(&self, offset: u32, timeout: Duration) -> Result<Vec<Polled>, TransportError> {
        let offset = i32::try_from(offset).unwrap_or(i32::MAX);
        let timeout = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);

        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(timeout)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
            .await
            .map_err(transport_error)?;

        Ok(updates.into_iter().map(translate).collect())
    }
}

impl Messenger for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }

        request.await.map_err(transport_error)?;

        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        let mut request = self
            .bot
            .edit_message_text(chat_id, message_id, text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard.clone() {
            request = request.reply_markup(keyboard);
        }

        match request.await {
            Ok(_) => Ok(()),
            // A second press of the same button.
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(RequestError::Api(e)) => {
                debug!("Failed to edit message {message_id:?} of chat {chat_id} ({e}), sending a new one");
                self.send_message(chat_id, text, keyboard).await
            }
            Err(e) => Err(transport_error(e)),
        }
    }

    async fn acknowledge(&self, query_id: &str) -> Result<(), TransportError> {
        self.bot
            .answer_callback_query(CallbackQueryId(query_id.to_owned()))
            .await
            .map_err(transport_error)?;

        Ok(())
    }
}
