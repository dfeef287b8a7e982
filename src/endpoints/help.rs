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

//! Handler for the /help command.

use crate::{HandlerResult, State, handlers::Context, texts};
use bot_core::Messenger;
use repository::Repository;
use tracing::{debug, info};

/// Help handler.
#[tracing::instrument(
    name = "Help handler",
    skip(ctx),
    fields(
        chat_id = %ctx.chat_id,
    )
)]
pub async fn help<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    info!("Command /help called");

    ctx.reply(&texts::help(), None).await?;

    Ok(State::Start)
}

/// Answer to text that doesn't fit the conversation.
pub async fn fallback<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    debug!("Unexpected text received");

    ctx.reply(texts::fallback(), None).await?;

    Ok(State::Start)
}
