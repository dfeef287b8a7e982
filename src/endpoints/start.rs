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

//! Handler for the /start command and the main menu.

use crate::{HandlerResult, State, handlers::Context, keyboards::start_keyboard, texts};
use bot_core::Messenger;
use repository::Repository;
use tracing::info;

/// Start handler.
#[tracing::instrument(
    name = "Start handler",
    skip(ctx),
    fields(
        chat_id = %ctx.chat_id,
    )
)]
pub async fn start<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    info!("Command /start called");

    menu(ctx, None).await
}

/// Main menu. Members get the registration options, and the rest of users get the option to sign up.
pub async fn menu<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, notice: Option<&str>) -> HandlerResult {
    let member = ctx.repo.user_by_chat(ctx.chat_id.0).await?;
    let is_admin = ctx.is_admin().await?;

    let text = texts::welcome(member.as_ref().map(|u| u.name.as_str()));
    ctx.show(
        &texts::with_notice(notice, &text),
        Some(start_keyboard(member.is_some(), is_admin)),
    )
    .await?;

    Ok(State::Start)
}
