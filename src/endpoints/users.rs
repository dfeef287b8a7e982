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

//! Sign up of new members.

use crate::{
    FlowError, HandlerResult, State, StateKind,
    endpoints::start,
    handlers::Context,
    keyboards::{cancel_keyboard, confirm_keyboard},
    texts,
    validation::{Field, validate},
};
use bot_core::Messenger;
use repository::{NewUser, RepoError, Repository};
use tracing::info;

pub async fn sign_up<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    if ctx.repo.user_by_chat(ctx.chat_id.0).await?.is_some() {
        return start::menu(ctx, Some(texts::ALREADY_MEMBER)).await;
    }

    ctx.show(texts::ASK_USER_NAME, Some(cancel_keyboard())).await?;

    Ok(State::UserEnterName)
}

pub async fn enter_name<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, text: &str) -> HandlerResult {
    match validate(Field::UserName, text) {
        Ok(name) => {
            ctx.reply(texts::ASK_USER_PHONE, Some(cancel_keyboard())).await?;
            Ok(State::UserEnterPhone { name })
        }
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_USER_NAME).await?;
            Ok(State::UserEnterName)
        }
    }
}

pub async fn enter_phone<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    name: String,
    text: &str,
) -> HandlerResult {
    match validate(Field::Phone, text) {
        Ok(phone) => {
            let user = NewUser {
                chat_id: ctx.chat_id.0,
                name,
                phone,
            };
            ctx.reply(&texts::new_user_summary(&user), Some(confirm_keyboard()))
                .await?;
            Ok(State::UserConfirm(user))
        }
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_USER_PHONE).await?;
            Ok(State::UserEnterPhone { name })
        }
    }
}

#[tracing::instrument(
    name = "Sign up",
    skip(ctx, user),
    fields(
        chat_id = %ctx.chat_id,
    )
)]
pub async fn confirm<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, user: NewUser) -> HandlerResult {
    if user.name.is_empty() || user.phone.is_empty() || user.chat_id != ctx.chat_id.0 {
        return Err(FlowError::Incomplete(StateKind::UserConfirm).into());
    }

    match ctx.repo.create_user(user).await {
        Ok(user) => {
            info!("New member {} signed up", user.id);
            start::menu(ctx, Some(&texts::user_created(&user.name))).await
        }
        // A second press of the confirm button.
        Err(RepoError::Conflict(_)) => start::menu(ctx, Some(texts::ALREADY_MEMBER)).await,
        Err(e) => Err(e.into()),
    }
}
