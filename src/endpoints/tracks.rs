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

//! Management of the tracks where the trainings take place.

use crate::{
    FlowError, HandlerResult, State, StateKind,
    endpoints::admin,
    errors::found,
    handlers::Context,
    keyboards::{cancel_keyboard, confirm_keyboard, track_keyboard, tracks_keyboard},
    texts,
    validation::{Field, validate},
};
use bot_core::Messenger;
use repository::{EntityId, NewTrack, Repository, TrackField};
use tracing::info;

/// Editable fields of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Name,
    Info,
}

impl Attribute {
    fn prompt(self) -> &'static str {
        match self {
            Attribute::Name => texts::ASK_TRACK_NAME,
            Attribute::Info => texts::ASK_TRACK_INFO,
        }
    }

    fn state(self, track_id: EntityId) -> State {
        match self {
            Attribute::Name => State::TrackEditName { track_id },
            Attribute::Info => State::TrackEditInfo { track_id },
        }
    }
}

pub async fn menu<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, notice: Option<&str>) -> HandlerResult {
    let tracks = ctx.repo.tracks().await?;

    let text = if tracks.is_empty() {
        format!("{}\n\n{}", texts::TRACKS_MENU, texts::NO_TRACKS)
    } else {
        texts::TRACKS_MENU.to_owned()
    };
    ctx.show(&texts::with_notice(notice, &text), Some(tracks_keyboard(&tracks)))
        .await?;

    Ok(State::TrackMenu)
}

pub async fn show<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, track_id: EntityId) -> HandlerResult {
    let Some(track) = found(ctx.repo.track(track_id).await)? else {
        return menu(ctx, Some(texts::GONE)).await;
    };

    ctx.show(&texts::track_details(&track), Some(track_keyboard(track.id)))
        .await?;

    Ok(State::TrackMenu)
}

pub async fn create<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>) -> HandlerResult {
    ctx.show(texts::ASK_TRACK_NAME, Some(cancel_keyboard())).await?;

    Ok(State::TrackEnterName)
}

pub async fn enter_name<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, text: &str) -> HandlerResult {
    match validate(Field::TrackName, text) {
        Ok(name) => {
            ctx.reply(texts::ASK_TRACK_INFO, Some(cancel_keyboard())).await?;
            Ok(State::TrackEnterInfo { name })
        }
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_TRACK_NAME).await?;
            Ok(State::TrackEnterName)
        }
    }
}

pub async fn enter_info<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    name: String,
    text: &str,
) -> HandlerResult {
    match validate(Field::TrackInfo, text) {
        Ok(info) => {
            let track = NewTrack { name, info };
            ctx.reply(&texts::new_track_summary(&track), Some(confirm_keyboard()))
                .await?;
            Ok(State::TrackConfirm(track))
        }
        Err(errors) => {
            ctx.reject(&errors, texts::ASK_TRACK_INFO).await?;
            Ok(State::TrackEnterInfo { name })
        }
    }
}

#[tracing::instrument(
    name = "Create track",
    skip(ctx, track),
    fields(
        chat_id = %ctx.chat_id,
    )
)]
pub async fn confirm_create<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, track: NewTrack) -> HandlerResult {
    if track.name.is_empty() || track.info.is_empty() {
        return Err(FlowError::Incomplete(StateKind::TrackConfirm).into());
    }

    let track = ctx.repo.create_track(track).await?;
    info!("Track {} created", track.id);

    admin::menu(ctx, Some(&texts::track_created(&track))).await
}

pub async fn edit<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    track_id: EntityId,
    attribute: Attribute,
) -> HandlerResult {
    if found(ctx.repo.track(track_id).await)?.is_none() {
        return menu(ctx, Some(texts::GONE)).await;
    }

    ctx.show(attribute.prompt(), Some(cancel_keyboard())).await?;

    Ok(attribute.state(track_id))
}

pub async fn enter_edit<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    track_id: EntityId,
    attribute: Attribute,
    text: &str,
) -> HandlerResult {
    let field = match attribute {
        Attribute::Name => validate(Field::TrackName, text).map(TrackField::Name),
        Attribute::Info => validate(Field::TrackInfo, text).map(TrackField::Info),
    };

    let field = match field {
        Ok(field) => field,
        Err(errors) => {
            ctx.reject(&errors, attribute.prompt()).await?;
            return Ok(attribute.state(track_id));
        }
    };

    match found(ctx.repo.update_track(track_id, field).await)? {
        Some(track) => {
            info!("Track {} updated", track.id);
            menu(ctx, Some(&texts::track_updated(&track))).await
        }
        None => menu(ctx, Some(texts::GONE)).await,
    }
}

pub async fn delete<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, track_id: EntityId) -> HandlerResult {
    let Some(track) = found(ctx.repo.track(track_id).await)? else {
        return menu(ctx, Some(texts::GONE)).await;
    };

    ctx.show(&texts::confirm_track_delete(&track), Some(confirm_keyboard()))
        .await?;

    Ok(State::TrackConfirmDelete { track_id })
}

pub async fn confirm_delete<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    track_id: EntityId,
) -> HandlerResult {
    match found(ctx.repo.delete_track(track_id).await)? {
        Some(()) => {
            info!("Track {track_id} deleted");
            menu(ctx, Some(texts::TRACK_DELETED)).await
        }
        None => menu(ctx, Some(texts::GONE)).await,
    }
}
