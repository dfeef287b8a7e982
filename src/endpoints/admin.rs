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

//! Handler for the /admin command.
//!
//! The admins of the academy are identified by their chat ID. See [repository::Repository::is_admin].

use crate::{HandlerResult, State, handlers::Context, keyboards::admin_keyboard, texts};
use bot_core::Messenger;
use repository::Repository;
use tracing::{info, warn};

#[tracing::instrument(
    name = "Admin handler",
    skip(ctx),
    fields(
        chat_id = %ctx.chat_id,
    )
)]
pub async fn admin<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    info!("Command /admin called");

    if !ctx.is_admin().await? {
        return not_allowed(ctx).await;
    }

    menu(ctx, None).await
}

pub async fn menu<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, notice: Option<&str>) -> HandlerResult {
    ctx.show(&texts::with_notice(notice, texts::ADMIN_MENU), Some(admin_keyboard()))
        .await?;

    Ok(State::AdminMenu)
}

/// Answer to a user without privileges that reached an admin option.
pub async fn not_allowed<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    warn!("Chat {} attempted to use an admin option", ctx.chat_id);

    ctx.show(texts::NOT_ALLOWED, None).await?;

    Ok(State::Start)
}
