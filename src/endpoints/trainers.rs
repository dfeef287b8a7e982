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

//! Management of the trainers of the academy.
//!
//! # Description
//!
//! A new trainer is entered in four steps: name, Telegram user, chat ID and a short description. The record
//! is only created once the admin confirms the summary. Existing trainers are edited one field at a time.

use crate::{
    FlowError, HandlerResult, State, StateKind,
    endpoints::admin,
    errors::found,
    handlers::Context,
    keyboards::{cancel_keyboard, confirm_keyboard, trainer_keyboard, trainers_keyboard},
    texts,
    validation::{Field, validate},
};
use bot_core::Messenger;
use repository::{EntityId, NewTrainer, Repository, TrainerField};
use tracing::info;

/// Editable fields of a trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Name,
    TgId,
    ChatId,
    Info,
}

impl Attribute {
    fn field(self) -> Field {
        match self {
            Attribute::Name => Field::TrainerName,
            Attribute::TgId => Field::TelegramHandle,
            Attribute::ChatId => Field::ChatId,
            Attribute::Info => Field::TrainerInfo,
        }
    }

    fn prompt(self) -> &'static str {
        match self {
            Attribute::Name => texts::ASK_TRAINER_NAME,
            Attribute::TgId => texts::ASK_TRAINER_TG_ID,
            Attribute::ChatId => texts::ASK_TRAINER_CHAT_ID,
            Attribute::Info => texts::ASK_TRAINER_INFO,
        }
    }

    fn state(self, trainer_id: EntityId) -> State {
        match self {
            Attribute::Name => State::TrainerEditName { trainer_id },
            Attribute::TgId => State::TrainerEditTgId { trainer_id },
            Attribute::ChatId => State::TrainerEditChatId { trainer_id },
            Attribute::Info => State::TrainerEditInfo { trainer_id },
        }
    }
}

fn parse_chat_id(raw: &str) -> Result<i64, Vec<String>> {
    validate(Field::ChatId, raw).and_then(|v| v.parse::<i64>().map_err(|e| vec![e.to_string()]))
}

pub async fn menu<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, notice: Option<&str>) -> HandlerResult {
    let trainers = ctx.repo.trainers().await?;

    let text = if trainers.is_empty() {
        format!("{}\n\n{}", texts::TRAINERS_MENU, texts::NO_TRAINERS)
    } else {
        texts::TRAINERS_MENU.to_owned()
    };
    ctx.show(&texts::with_notice(notice, &text), Some(trainers_keyboard(&trainers)))
        .await?;

    Ok(State::TrainerMenu)
}

pub async fn show<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, trainer_id: EntityId) -> HandlerResult {
    let Some(trainer) = found(ctx.repo.trainer(trainer_id).await)? else {
        return menu(ctx, Some(texts::GONE)).await;
    };

    ctx.show(&texts::trainer_details(&trainer), Some(trainer_keyboard(trainer.id)))
        .await?;

    Ok(State::TrainerMenu)
}

pub async fn create<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    ctx.show(texts::ASK_TRAINER_NAME, Some(cancel_keyboard())).await?;

    Ok(State::TrainerEnterName)
}

pub async fn enter_name<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, text: &str) -> HandlerResult {
    match validate(Field::TrainerName, text) {
        Ok(name) => {
            ctx.reply(texts::ASK_TRAINER_TG_ID, Some(cancel_keyboard())).await?;
            Ok(State::TrainerEnterTgId { name })
        }
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_TRAINER_NAME).await?;
            Ok(State::TrainerEnterName)
        }
    }
}

pub async fn enter_tg_id<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    name: String,
    text: &str,
) -> HandlerResult {
    match validate(Field::TelegramHandle, text) {
        Ok(tg_id) => {
            ctx.reply(texts::ASK_TRAINER_CHAT_ID, Some(cancel_keyboard())).await?;
            Ok(State::TrainerEnterChatId { name, tg_id })
        }
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_TRAINER_TG_ID).await?;
            Ok(State::TrainerEnterTgId { name })
        }
    }
}

pub async fn enter_chat_id<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    name: String,
    tg_id: String,
    text: &str,
) -> HandlerResult {
    match parse_chat_id(text) {
        Ok(chat_id) => {
            ctx.reply(texts::ASK_TRAINER_INFO, Some(cancel_keyboard())).await?;
            Ok(State::TrainerEnterInfo { name, tg_id, chat_id })
        }
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_TRAINER_CHAT_ID).await?;
            Ok(State::TrainerEnterChatId { name, tg_id })
        }
    }
}

pub async fn enter_info<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    name: String,
    tg_id: String,
    chat_id: i64,
    text: &str,
) -> HandlerResult {
    match validate(Field::TrainerInfo, text) {
        Ok(info) => {
            let trainer = NewTrainer {
                name,
                tg_id,
                chat_id,
                info,
            };
            ctx.reply(&texts::new_trainer_summary(&trainer), Some(confirm_keyboard()))
                .await?;
            Ok(State::TrainerConfirm(trainer))
        }
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_TRAINER_INFO).await?;
            Ok(State::TrainerEnterInfo { name, tg_id, chat_id })
        }
    }
}

#[tracing::instrument(
    name = "Create trainer",
    skip(ctx, trainer),
    fields(
        chat_id = %ctx.chat_id,
    )
)]
pub async fn confirm_create<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    trainer: NewTrainer,
) -> HandlerResult {
    if trainer.name.is_empty() || trainer.tg_id.is_empty() || trainer.info.is_empty() {
        return Err(FlowError::Incomplete(StateKind::TrainerConfirm).into());
    }

    let trainer = ctx.repo.create_trainer(trainer).await?;
    info!("Trainer {} created", trainer.id);

    admin::menu(ctx, Some(&texts::trainer_created(&trainer))).await
}

pub async fn edit<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    trainer_id: EntityId,
    attribute: Attribute,
) -> HandlerResult {
    if found(ctx.repo.trainer(trainer_id).await)?.is_none() {
        return menu(ctx, Some(texts::GONE)).await;
    }

    ctx.show(attribute.prompt(), Some(cancel_keyboard())).await?;

    Ok(attribute.state(trainer_id))
}

/// Store the new value of an attribute of a trainer.
pub async fn enter_edit<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    trainer_id: EntityId,
    attribute: Attribute,
    text: &str,
) -> HandlerResult {
    let field = match attribute {
        Attribute::ChatId => parse_chat_id(text).map(TrainerField::ChatId),
        Attribute::Name => validate(attribute.field(), text).map(TrainerField::Name),
        Attribute::TgId => validate(attribute.field(), text).map(TrainerField::TgId),
        Attribute::Info => validate(attribute.field(), text).map(TrainerField::Info),
    };

    let field = match field {
        Ok(field) => field,
        Err(errors) => {
            ctx.reject(&errors, attribute.prompt()).await?;
            return Ok(attribute.state(trainer_id));
        }
    };

    match found(ctx.repo.update_trainer(trainer_id, field).await)? {
        Some(trainer) => {
            info!("Trainer {} updated", trainer.id);
            menu(ctx, Some(&texts::trainer_updated(&trainer))).await
        }
        None => menu(ctx, Some(texts::GONE)).await,
    }
}

pub async fn delete<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, trainer_id: EntityId) -> HandlerResult {
    let Some(trainer) = found(ctx.repo.trainer(trainer_id).await)? else {
        return menu(ctx, Some(texts::GONE)).await;
    };

    ctx.show(&texts::confirm_trainer_delete(&trainer), Some(confirm_keyboard()))
        .await?;

    Ok(State::TrainerConfirmDelete { trainer_id })
}

pub async fn confirm_delete<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    trainer_id: EntityId,
) -> HandlerResult {
    match found(ctx.repo.delete_trainer(trainer_id).await)? {
        Some(()) => {
            info!("Trainer {trainer_id} deleted");
            menu(ctx, Some(texts::TRAINER_DELETED)).await
        }
        None => menu(ctx, Some(texts::GONE)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Attribute::Name, State::TrainerEditName { trainer_id: 4 })]
    #[case(Attribute::TgId, State::TrainerEditTgId { trainer_id: 4 })]
    #[case(Attribute::ChatId, State::TrainerEditChatId { trainer_id: 4 })]
    #[case(Attribute::Info, State::TrainerEditInfo { trainer_id: 4 })]
    fn each_attribute_has_its_own_step(#[case] attribute: Attribute, #[case] state: State) {
        assert_eq!(attribute.state(4), state);
    }

    #[test]
    fn chat_ids_are_numbers() {
        assert_eq!(parse_chat_id(" -1001 "), Ok(-1001));
        assert!(parse_chat_id("@ivan").is_err());
    }
}
