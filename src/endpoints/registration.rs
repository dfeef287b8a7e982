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

//! Registration of members to the trainings of the schedule.
//!
//! # Description
//!
//! Members pick a track, a trainer and then one of the upcoming trainings of that trainer in that track. When
//! none of the times suits them, they can request a training: the request is stored and forwarded to the
//! chat of the trainer.

use crate::{
    FlowError, HandlerError, HandlerResult, State,
    endpoints::start,
    errors::found,
    handlers::{Action, Context},
    keyboards::{cancel_keyboard, confirm_keyboard, pick_keyboard, registrations_keyboard, sign_up_keyboard, times_keyboard},
    texts,
    validation::{Field, validate},
};
use bot_core::Messenger;
use chrono::Utc;
use repository::{EntityId, NewTrainingRequest, RepoError, Repository, TrainingStatus, User};
use teloxide::types::ChatId;
use tracing::{info, warn};

fn unexpected(action: Action, state: &State) -> HandlerError {
    FlowError::UnexpectedState {
        action: action.prefix(),
        state: state.kind(),
    }
    .into()
}

/// Member behind the chat, if any.
async fn member<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> Result<Option<User>, HandlerError> {
    let user = ctx.repo.user_by_chat(ctx.chat_id.0).await?;

    if user.is_none() {
        ctx.show(texts::NOT_A_MEMBER, Some(sign_up_keyboard())).await?;
    }

    Ok(user)
}

pub async fn register<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    if member(ctx).await?.is_none() {
        return Ok(State::Start);
    }

    let tracks = ctx.repo.tracks().await?;
    if tracks.is_empty() {
        return start::menu(ctx, Some(texts::NO_TRACKS)).await;
    }

    let items: Vec<(EntityId, String)> = tracks.into_iter().map(|t| (t.id, t.name)).collect();
    ctx.show(texts::ASK_SELECT_TRACK, Some(pick_keyboard(&items, Action::SelectTrack)))
        .await?;

    Ok(State::RegisterSelectTrack)
}

pub async fn select_track<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    state: State,
    track_id: EntityId,
) -> HandlerResult {
    if state != State::RegisterSelectTrack {
        return Err(unexpected(Action::SelectTrack, &state));
    }

    if found(ctx.repo.track(track_id).await)?.is_none() {
        return start::menu(ctx, Some(texts::GONE)).await;
    }

    let trainers = ctx.repo.trainers().await?;
    if trainers.is_empty() {
        return start::menu(ctx, Some(texts::NO_TRAINERS)).await;
    }

    let items: Vec<(EntityId, String)> = trainers.into_iter().map(|t| (t.id, t.name)).collect();
    ctx.show(texts::ASK_SELECT_TRAINER, Some(pick_keyboard(&items, Action::SelectTrainer)))
        .await?;

    Ok(State::RegisterSelectTrainer { track_id })
}

pub async fn select_trainer<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    state: State,
    trainer_id: EntityId,
) -> HandlerResult {
    let State::RegisterSelectTrainer { track_id } = state else {
        return Err(unexpected(Action::SelectTrainer, &state));
    };

    let trainings = ctx.repo.trainings_for(track_id, trainer_id, Utc::now()).await?;
    let items: Vec<(EntityId, String)> = trainings
        .iter()
        .map(|t| (t.id, texts::format_time(&t.starts_at)))
        .collect();

    let text = if items.is_empty() {
        texts::NO_TIMES
    } else {
        texts::ASK_SELECT_TIME
    };
    ctx.show(text, Some(times_keyboard(&items, trainer_id))).await?;

    Ok(State::RegisterSelectTime { track_id, trainer_id })
}

pub async fn select_time<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    state: State,
    training_id: EntityId,
) -> HandlerResult {
    let State::RegisterSelectTime { track_id, trainer_id } = state else {
        return Err(unexpected(Action::SelectTime, &state));
    };

    let training = match found(ctx.repo.training(training_id).await)? {
        Some(t) if t.status == TrainingStatus::Scheduled && t.track_id == track_id && t.trainer_id == trainer_id => t,
        _ => return start::menu(ctx, Some(texts::TRAINING_UNAVAILABLE)).await,
    };
    let trainer = ctx.repo.trainer(trainer_id).await?;
    let track = ctx.repo.track(track_id).await?;

    ctx.show(
        &texts::confirm_registration(&training, &trainer, &track),
        Some(confirm_keyboard()),
    )
    .await?;

    Ok(State::RegisterConfirm { training_id })
}

#[tracing::instrument(
    name = "Register",
    skip(ctx),
    fields(
        chat_id = %ctx.chat_id,
    )
)]
pub async fn confirm<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, training_id: EntityId) -> HandlerResult {
    let Some(user) = member(ctx).await? else {
        return Ok(State::Start);
    };
    let Some(training) = found(ctx.repo.training(training_id).await)? else {
        return start::menu(ctx, Some(texts::TRAINING_UNAVAILABLE)).await;
    };

    match ctx.repo.register(training_id, user.id).await {
        Ok(registration) => {
            info!("Registration {} created", registration.id);
            start::menu(ctx, Some(&texts::registered(&training))).await
        }
        Err(RepoError::Conflict(reason)) => {
            info!("Registration refused: {reason}");
            let notice = match training.status {
                TrainingStatus::Scheduled => texts::ALREADY_REGISTERED,
                TrainingStatus::Cancelled => texts::TRAINING_UNAVAILABLE,
            };
            start::menu(ctx, Some(notice)).await
        }
        Err(RepoError::NotFound { .. }) => start::menu(ctx, Some(texts::TRAINING_UNAVAILABLE)).await,
        Err(e) => Err(e.into()),
    }
}

pub async fn request_training<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    state: State,
    trainer_id: EntityId,
) -> HandlerResult {
    let State::RegisterSelectTime {
        track_id,
        trainer_id: selected,
    } = state
    else {
        return Err(unexpected(Action::RequestTraining, &state));
    };

    if selected != trainer_id {
        return Err(unexpected(Action::RequestTraining, &state));
    }

    ctx.show(texts::ASK_REQUEST_TIME, Some(cancel_keyboard())).await?;

    Ok(State::RequestEnterTime { track_id, trainer_id })
}

/// Store the request of a training and forward it to the trainer.
///
/// # Description
///
/// The request is stored before notifying the trainer, so a failure of the notification is logged but
/// doesn't bother the member.
#[tracing::instrument(
    name = "Training request",
    skip(ctx, text),
    fields(
        chat_id = %ctx.chat_id,
    )
)]
pub async fn enter_request<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    track_id: EntityId,
    trainer_id: EntityId,
    text: &str,
) -> HandlerResult {
    let preferred_time = match validate(Field::RequestText, text) {
        Ok(preferred_time) => preferred_time,
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_REQUEST_TIME).await?;
            return Ok(State::RequestEnterTime { track_id, trainer_id });
        }
    };

    let Some(user) = member(ctx).await? else {
        return Ok(State::Start);
    };
    let (Some(trainer), Some(track)) = (
        found(ctx.repo.trainer(trainer_id).await)?,
        found(ctx.repo.track(track_id).await)?,
    ) else {
        return start::menu(ctx, Some(texts::GONE)).await;
    };

    let request = ctx
        .repo
        .create_request(NewTrainingRequest {
            user_id: user.id,
            trainer_id,
            track_id,
            preferred_time,
        })
        .await?;
    info!("Training request {} stored", request.id);

    let notification = texts::training_request(&user.name, &user.phone, &track, &request.preferred_time);
    if let Err(e) = ctx
        .messenger
        .send_message(ChatId(trainer.chat_id), &notification, None)
        .await
    {
        warn!("Failed to notify trainer {} about request {}: {e}", trainer.id, request.id);
    }

    start::menu(ctx, Some(texts::REQUEST_SENT)).await
}

pub async fn my_registrations<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    let Some(user) = member(ctx).await? else {
        return Ok(State::Start);
    };

    let registrations = ctx.repo.registrations_of(user.id).await?;
    if registrations.is_empty() {
        return start::menu(ctx, Some(texts::NO_REGISTRATIONS)).await;
    }

    let mut items = Vec::with_capacity(registrations.len());
    for registration in &registrations {
        let training = found(ctx.repo.training(registration.training_id).await)?;
        items.push((
            registration.id,
            texts::registration_label(registration, training.as_ref()),
        ));
    }

    ctx.show(texts::MY_REGISTRATIONS, Some(registrations_keyboard(&items)))
        .await?;

    Ok(State::Start)
}

pub async fn cancel_registration<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    registration_id: EntityId,
) -> HandlerResult {
    let Some(user) = member(ctx).await? else {
        return Ok(State::Start);
    };

    match found(ctx.repo.cancel_registration(registration_id, user.id).await)? {
        Some(()) => {
            info!("Registration {registration_id} cancelled");
            start::menu(ctx, Some(texts::REGISTRATION_CANCELLED)).await
        }
        None => start::menu(ctx, Some(texts::REGISTRATION_GONE)).await,
    }
}
