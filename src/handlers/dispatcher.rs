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

//! Main handler of the AcademyBot.
//!
//! # Description
//!
//! The [Dispatcher] is the [Conversation] plugged into the engine. All valid combinations of updates and
//! states shall be contemplated in the implementation of this handler:
//!
//! - Commands are accepted in every state, and abort the flow in progress.
//! - The rest of the text messages are routed by the state of the conversation. Text that doesn't fit the
//!   state gets the fallback message.
//! - Presses of buttons go to the [router](crate::handlers::router).
//!
//! Errors never leave the dispatcher. Failures of the repository or the chat API get an apology and leave
//! the conversation in a menu the user can continue from. Integrity errors of the flow move it to
//! [State::Error].

use crate::{
    Command, HandlerError, HandlerResult, State, StateKind,
    endpoints::{admin, help, registration, start, tracks, trainers, trainings, users},
    handlers::{Context, router},
    texts,
};
use bot_core::{Conversation, InboundUpdate, Messenger, UpdateKind};
use repository::Repository;
use std::sync::Arc;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, warn};

pub struct Dispatcher<R, M> {
    repo: Arc<R>,
    messenger: Arc<M>,
    /// Username of the bot, needed to parse commands like `/start@academy_bot`.
    bot_name: String,
}

impl<R: Repository, M: Messenger> Dispatcher<R, M> {
    pub fn new(repo: Arc<R>, messenger: Arc<M>, bot_name: impl Into<String>) -> Self {
        Dispatcher {
            repo,
            messenger,
            bot_name: bot_name.into(),
        }
    }

    async fn command(&self, ctx: &Context<'_, R, M>, command: Command) -> HandlerResult {
        match command {
            Command::Start => start::start(ctx).await,
            Command::Help => help::help(ctx).await,
            Command::Admin => admin::admin(ctx).await,
        }
    }

    async fn text(&self, ctx: &Context<'_, R, M>, state: State, text: &str) -> HandlerResult {
        if let Ok(command) = Command::parse(text, &self.bot_name) {
            return self.command(ctx, command).await;
        }

        if state.kind().is_admin_flow() && !ctx.is_admin().await? {
            return admin::not_allowed(ctx).await;
        }

        match state {
            State::TrainerEnterName => trainers::enter_name(ctx, text).await,
            State::TrainerEnterTgId { name } => trainers::enter_tg_id(ctx, name, text).await,
            State::TrainerEnterChatId { name, tg_id } => trainers::enter_chat_id(ctx, name, tg_id, text).await,
            State::TrainerEnterInfo { name, tg_id, chat_id } => {
                trainers::enter_info(ctx, name, tg_id, chat_id, text).await
            }
            State::TrainerEditName { trainer_id } => {
                trainers::enter_edit(ctx, trainer_id, trainers::Attribute::Name, text).await
            }
            State::TrainerEditTgId { trainer_id } => {
                trainers::enter_edit(ctx, trainer_id, trainers::Attribute::TgId, text).await
            }
            State::TrainerEditChatId { trainer_id } => {
                trainers::enter_edit(ctx, trainer_id, trainers::Attribute::ChatId, text).await
            }
            State::TrainerEditInfo { trainer_id } => {
                trainers::enter_edit(ctx, trainer_id, trainers::Attribute::Info, text).await
            }
            State::TrackEnterName => tracks::enter_name(ctx, text).await,
            State::TrackEnterInfo { name } => tracks::enter_info(ctx, name, text).await,
            State::TrackEditName { track_id } => {
                tracks::enter_edit(ctx, track_id, tracks::Attribute::Name, text).await
            }
            State::TrackEditInfo { track_id } => {
                tracks::enter_edit(ctx, track_id, tracks::Attribute::Info, text).await
            }
            State::TrainingEnterTime { trainer_id, track_id } => {
                trainings::enter_time(ctx, trainer_id, track_id, text).await
            }
            State::TrainingEditTime { training_id } => trainings::enter_new_time(ctx, training_id, text).await,
            State::UserEnterName => users::enter_name(ctx, text).await,
            State::UserEnterPhone { name } => users::enter_phone(ctx, name, text).await,
            State::RequestEnterTime { track_id, trainer_id } => {
                registration::enter_request(ctx, track_id, trainer_id, text).await
            }
            // States that expect a button, not text.
            State::Start
            | State::AdminMenu
            | State::TrainerMenu
            | State::TrackMenu
            | State::ScheduleMenu
            | State::Error
            | State::TrainerConfirm(_)
            | State::TrainerConfirmDelete { .. }
            | State::TrackConfirm(_)
            | State::TrackConfirmDelete { .. }
            | State::TrainingSelectTrainer
            | State::TrainingSelectTrack { .. }
            | State::TrainingConfirm(_)
            | State::TrainingConfirmDelete { .. }
            | State::UserConfirm(_)
            | State::RegisterSelectTrack
            | State::RegisterSelectTrainer { .. }
            | State::RegisterSelectTime { .. }
            | State::RegisterConfirm { .. } => help::fallback(ctx).await,
        }
    }

    /// Compute the state that follows a failed handler.
    async fn recover(&self, ctx: &Context<'_, R, M>, kind: StateKind, error: HandlerError) -> State {
        let (text, next) = match &error {
            HandlerError::Flow(e) => {
                error!(chat_id = %ctx.chat_id, state = ?kind, "Conversation flow broken: {e}");
                (texts::FLOW_ERROR, State::Error)
            }
            HandlerError::Repository(_) | HandlerError::Transport(_) => {
                error!(chat_id = %ctx.chat_id, state = ?kind, "Failed to process the update: {error}");
                let next = if kind.is_admin_flow() {
                    State::AdminMenu
                } else {
                    State::Start
                };
                (texts::APOLOGY, next)
            }
        };

        if let Err(e) = ctx.reply(text, None).await {
            warn!("Failed to inform chat {} about the error: {e}", ctx.chat_id);
        }

        next
    }
}

impl<R, M> Conversation for Dispatcher<R, M>
where
    R: Repository + 'static,
    M: Messenger + 'static,
{
    type State = State;

    async fn transition(&self, state: State, update: &InboundUpdate) -> State {
        let kind = state.kind();
        let message_id = match &update.kind {
            UpdateKind::Text(_) => None,
            UpdateKind::Callback(press) => press.message_id,
        };
        let ctx = Context {
            repo: self.repo.as_ref(),
            messenger: self.messenger.as_ref(),
            chat_id: update.chat_id(),
            message_id,
        };

        let result = match &update.kind {
            UpdateKind::Text(msg) => self.text(&ctx, state, &msg.text).await,
            UpdateKind::Callback(press) => router::route(&ctx, state, press).await,
        };

        match result {
            Ok(next) => {
                debug!("Chat {} moved from {kind:?} to {:?}", ctx.chat_id, next.kind());
                next
            }
            Err(e) => self.recover(&ctx, kind, e).await,
        }
    }
}
