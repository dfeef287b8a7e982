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

use crate::{HandlerError, texts};
use bot_core::Messenger;
use repository::Repository;
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId};

/// Everything an endpoint needs to serve an update.
///
/// # Description
///
/// `message_id` is set when the update is the press of a button: the message that holds the keyboard is
/// replaced by the answer, instead of piling up messages in the chat.
pub struct Context<'a, R, M> {
    pub repo: &'a R,
    pub messenger: &'a M,
    pub chat_id: ChatId,
    pub message_id: Option<MessageId>,
}

impl<R: Repository, M: Messenger> Context<'_, R, M> {
    /// Send a new message to the chat.
    pub async fn reply(&self, text: &str, keyboard: Option<InlineKeyboardMarkup>) -> Result<(), HandlerError> {
        self.messenger.send_message(self.chat_id, text, keyboard).await?;
        Ok(())
    }

    /// Replace the message of the pressed button, or send a new one when the update is a text message.
    pub async fn show(&self, text: &str, keyboard: Option<InlineKeyboardMarkup>) -> Result<(), HandlerError> {
        match self.message_id {
            Some(message_id) => {
                self.messenger
                    .edit_message(self.chat_id, message_id, text, keyboard)
                    .await?
            }
            None => self.messenger.send_message(self.chat_id, text, keyboard).await?,
        }
        Ok(())
    }

    /// Re-prompt after a validation failure.
    pub async fn reject(&self, errors: &[String], prompt: &str) -> Result<(), HandlerError> {
        self.reply(
            &texts::invalid_input(errors, prompt),
            Some(crate::keyboards::cancel_keyboard()),
        )
        .await
    }

    pub async fn is_admin(&self) -> Result<bool, HandlerError> {
        Ok(self.repo.is_admin(self.chat_id.0).await?)
    }
}
