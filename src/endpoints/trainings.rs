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

//! Schedule of the academy.
//!
//! # Description
//!
//! A training is scheduled by picking a trainer and a track from the keyboards, and then typing the start
//! time. Scheduled trainings can be moved or cancelled; cancelling a training also cancels the registrations
//! of the members.

use crate::{
    FlowError, HandlerError, HandlerResult, State,
    errors::found,
    handlers::{Action, Context},
    keyboards::{cancel_keyboard, confirm_keyboard, pick_keyboard, schedule_keyboard, training_keyboard},
    texts,
    validation::{Field, parse_time, validate},
};
use bot_core::Messenger;
use chrono::{DateTime, Utc};
use repository::{EntityId, NewTraining, Repository, Training};
use std::collections::HashMap;
use tracing::info;

fn start_time(text: &str) -> Result<DateTime<Utc>, Vec<String>> {
    validate(Field::TrainingTime, text)
        .and_then(|v| parse_time(&v).ok_or_else(|| vec![format!("Invalid time: {v}")]))
}

/// Button labels of a list of trainings, including the names of the trainer and the track.
pub async fn labels<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    trainings: &[Training],
) -> Result<Vec<(EntityId, String)>, HandlerError> {
    let trainers: HashMap<EntityId, String> =
        ctx.repo.trainers().await?.into_iter().map(|t| (t.id, t.name)).collect();
    let tracks: HashMap<EntityId, String> = ctx.repo.tracks().await?.into_iter().map(|t| (t.id, t.name)).collect();

    Ok(trainings
        .iter()
        .map(|t| {
            let trainer = trainers.get(&t.trainer_id).map(String::as_str).unwrap_or("?");
            let track = tracks.get(&t.track_id).map(String::as_str).unwrap_or("?");
            (t.id, texts::training_label(t, trainer, track))
        })
        .collect())
}

pub async fn menu<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, notice: Option<&str>) -> HandlerResult {
    let trainings = ctx.repo.upcoming_trainings(Utc::now()).await?;
    let items = labels(ctx, &trainings).await?;

    let text = if items.is_empty() {
        format!("{}\n\n{}", texts::SCHEDULE_MENU, texts::NO_TRAININGS)
    } else {
        texts::SCHEDULE_MENU.to_owned()
    };
    ctx.show(&texts::with_notice(notice, &text), Some(schedule_keyboard(&items)))
        .await?;

    Ok(State::ScheduleMenu)
}

pub async fn show<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, training_id: EntityId) -> HandlerResult {
    let Some(training) = found(ctx.repo.training(training_id).await)? else {
        return menu(ctx, Some(texts::GONE)).await;
    };
    let trainer = ctx.repo.trainer(training.trainer_id).await?;
    let track = ctx.repo.track(training.track_id).await?;

    ctx.show(
        &texts::training_details(&training, &trainer, &track),
        Some(training_keyboard(training.id)),
    )
    .await?;

    Ok(State::ScheduleMenu)
}

pub async fn create<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    let trainers = ctx.repo.trainers().await?;
    if trainers.is_empty() {
        return menu(ctx, Some(texts::NO_TRAINERS)).await;
    }
    if ctx.repo.tracks().await?.is_empty() {
        return menu(ctx, Some(texts::NO_TRACKS)).await;
    }

    let items: Vec<(EntityId, String)> = trainers.into_iter().map(|t| (t.id, t.name)).collect();
    ctx.show(texts::ASK_PICK_TRAINER, Some(pick_keyboard(&items, Action::PickTrainer)))
        .await?;

    Ok(State::TrainingSelectTrainer)
}

pub async fn pick_trainer<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    state: State,
    trainer_id: EntityId,
) -> HandlerResult {
    if state != State::TrainingSelectTrainer {
        return Err(FlowError::UnexpectedState {
            action: Action::PickTrainer.prefix(),
            state: state.kind(),
        }
        .into());
    }

    if found(ctx.repo.trainer(trainer_id).await)?.is_none() {
        return menu(ctx, Some(texts::GONE)).await;
    }

    let items: Vec<(EntityId, String)> = ctx
        .repo
        .tracks()
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();
    ctx.show(texts::ASK_PICK_TRACK, Some(pick_keyboard(&items, Action::PickTrack)))
        .await?;

    Ok(State::TrainingSelectTrack { trainer_id })
}

pub async fn pick_track<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    state: State,
    track_id: EntityId,
) -> HandlerResult {
    let State::TrainingSelectTrack { trainer_id } = state else {
        return Err(FlowError::UnexpectedState {
            action: Action::PickTrack.prefix(),
            state: state.kind(),
        }
        .into());
    };

    if found(ctx.repo.track(track_id).await)?.is_none() {
        return menu(ctx, Some(texts::GONE)).await;
    }

    ctx.show(texts::ASK_TRAINING_TIME, Some(cancel_keyboard())).await?;

    Ok(State::TrainingEnterTime { trainer_id, track_id })
}

pub async fn enter_time<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    trainer_id: EntityId,
    track_id: EntityId,
    text: &str,
) -> HandlerResult {
    let starts_at = match start_time(text) {
        Ok(starts_at) => starts_at,
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_TRAINING_TIME).await?;
            return Ok(State::TrainingEnterTime { trainer_id, track_id });
        }
    };

    let (Some(trainer), Some(track)) = (
        found(ctx.repo.trainer(trainer_id).await)?,
        found(ctx.repo.track(track_id).await)?,
    ) else {
        return menu(ctx, Some(texts::GONE)).await;
    };

    ctx.reply(
        &texts::new_training_summary(&starts_at, &trainer, &track),
        Some(confirm_keyboard()),
    )
    .await?;

    Ok(State::TrainingConfirm(NewTraining {
        trainer_id,
        track_id,
        starts_at,
    }))
}

#[tracing::instrument(
    name = "Schedule training",
    skip(ctx, training),
    fields(
        chat_id = %ctx.chat_id,
    )
)]
pub async fn confirm_create<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    training: NewTraining,
) -> HandlerResult {
    match found(ctx.repo.create_training(training).await)? {
        Some(training) => {
            info!("Training {} scheduled", training.id);
            menu(ctx, Some(&texts::training_scheduled(&training))).await
        }
        // The trainer or the track was deleted meanwhile.
        None => menu(ctx, Some(texts::GONE)).await,
    }
}

pub async fn edit_time<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, training_id: EntityId) -> HandlerResult {
    if found(ctx.repo.training(training_id).await)?.is_none() {
        return menu(ctx, Some(texts::GONE)).await;
    }

    ctx.show(texts::ASK_TRAINING_TIME, Some(cancel_keyboard())).await?;

    Ok(State::TrainingEditTime { training_id })
}

pub async fn enter_new_time<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    training_id: EntityId,
    text: &str,
) -> HandlerResult {
    let starts_at = match start_time(text) {
        Ok(starts_at) => starts_at,
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_TRAINING_TIME).await?;
            return Ok(State::TrainingEditTime { training_id });
        }
    };

    match found(ctx.repo.reschedule_training(training_id, starts_at).await)? {
        Some(training) => {
            info!("Training {} rescheduled", training.id);
            menu(ctx, Some(&texts::training_rescheduled(&training))).await
        }
        None => menu(ctx, Some(texts::GONE)).await,
    }
}

pub async fn delete<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, training_id: EntityId) -> HandlerResult {
    let Some(training) = found(ctx.repo.training(training_id).await)? else {
        return menu(ctx, Some(texts::GONE)).await;
    };

    ctx.show(&texts::confirm_training_cancel(&training), Some(confirm_keyboard()))
        .await?;

    Ok(State::TrainingConfirmDelete { training_id })
}

pub async fn confirm_cancel<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    training_id: EntityId,
) -> HandlerResult {
    match found(ctx.repo.cancel_training(training_id).await)? {
        Some(()) => {
            info!("Training {training_id} cancelled");
            menu(ctx, Some(texts::TRAINING_CANCELLED)).await
        }
        None => menu(ctx, Some(texts::GONE)).await,
    }
}
