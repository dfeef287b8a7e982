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

//! Router of the button presses.
//!
//! # Description
//!
//! Button payloads name an [Action], optionally followed by the ID of the record the action applies to. Most
//! actions are resolved from the payload alone. The exceptions are:
//!
//! - `confirm` and `cancel`, which are resolved from the state of the conversation. See [confirm] and
//!   [cancel_target].
//! - The steps of the training and registration wizards, which extend the data carried by the state.
//!
//! Payloads with an unknown action come from keyboards of old messages. They are ignored and the conversation
//! goes back to the start.

use crate::{
    FlowError, HandlerResult, State, StateKind,
    endpoints::{admin, registration, start, tracks, trainers, trainings, users},
    handlers::Context,
    texts,
};
use bot_core::{CallbackPayload, CallbackPress, Messenger};
use repository::{EntityId, Repository};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    AdminMenu,
    Trainers,
    Tracks,
    Schedule,
    CreateTrainer,
    CreateTrack,
    CreateTraining,
    SignUp,
    Register,
    MyRegistrations,
    Confirm,
    Cancel,
    Trainer,
    EditTrainerName,
    EditTrainerTgId,
    EditTrainerChatId,
    EditTrainerInfo,
    DeleteTrainer,
    Track,
    EditTrackName,
    EditTrackInfo,
    DeleteTrack,
    Training,
    EditTrainingTime,
    DeleteTraining,
    PickTrainer,
    PickTrack,
    SelectTrack,
    SelectTrainer,
    SelectTime,
    RequestTraining,
    CancelRegistration,
}

const ACTIONS: [Action; 33] = [
    Action::Start,
    Action::AdminMenu,
    Action::Trainers,
    Action::Tracks,
    Action::Schedule,
    Action::CreateTrainer,
    Action::CreateTrack,
    Action::CreateTraining,
    Action::SignUp,
    Action::Register,
    Action::MyRegistrations,
    Action::Confirm,
    Action::Cancel,
    Action::Trainer,
    Action::EditTrainerName,
    Action::EditTrainerTgId,
    Action::EditTrainerChatId,
    Action::EditTrainerInfo,
    Action::DeleteTrainer,
    Action::Track,
    Action::EditTrackName,
    Action::EditTrackInfo,
    Action::DeleteTrack,
    Action::Training,
    Action::EditTrainingTime,
    Action::DeleteTraining,
    Action::PickTrainer,
    Action::PickTrack,
    Action::SelectTrack,
    Action::SelectTrainer,
    Action::SelectTime,
    Action::RequestTraining,
    Action::CancelRegistration,
];

impl Action {
    /// Name of the action in button payloads.
    pub fn prefix(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::AdminMenu => "adminMenu",
            Action::Trainers => "trainers",
            Action::Tracks => "tracks",
            Action::Schedule => "schedule",
            Action::CreateTrainer => "createTrainer",
            Action::CreateTrack => "createTrack",
            Action::CreateTraining => "createTraining",
            Action::SignUp => "signUp",
            Action::Register => "register",
            Action::MyRegistrations => "myRegistrations",
            Action::Confirm => "confirm",
            Action::Cancel => "cancel",
            Action::Trainer => "trainer",
            Action::EditTrainerName => "editTrainerName",
            Action::EditTrainerTgId => "editTrainerTgId",
            Action::EditTrainerChatId => "editTrainerChatId",
            Action::EditTrainerInfo => "editTrainerInfo",
            Action::DeleteTrainer => "deleteTrainer",
            Action::Track => "track",
            Action::EditTrackName => "editTrackName",
            Action::EditTrackInfo => "editTrackInfo",
            Action::DeleteTrack => "deleteTrack",
            Action::Training => "training",
            Action::EditTrainingTime => "editTrainingTime",
            Action::DeleteTraining => "deleteTraining",
            Action::PickTrainer => "pickTrainer",
            Action::PickTrack => "pickTrack",
            Action::SelectTrack => "selectTrack",
            Action::SelectTrainer => "selectTrainer",
            Action::SelectTime => "selectTime",
            Action::RequestTraining => "requestTraining",
            Action::CancelRegistration => "cancelRegistration",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        ACTIONS.iter().copied().find(|a| a.prefix() == prefix)
    }

    /// Whether the payload of the action carries the ID of a record.
    pub fn takes_id(self) -> bool {
        match self {
            Action::Start
            | Action::AdminMenu
            | Action::Trainers
            | Action::Tracks
            | Action::Schedule
            | Action::CreateTrainer
            | Action::CreateTrack
            | Action::CreateTraining
            | Action::SignUp
            | Action::Register
            | Action::MyRegistrations
            | Action::Confirm
            | Action::Cancel => false,
            Action::Trainer
            | Action::EditTrainerName
            | Action::EditTrainerTgId
            | Action::EditTrainerChatId
            | Action::EditTrainerInfo
            | Action::DeleteTrainer
            | Action::Track
            | Action::EditTrackName
            | Action::EditTrackInfo
            | Action::DeleteTrack
            | Action::Training
            | Action::EditTrainingTime
            | Action::DeleteTraining
            | Action::PickTrainer
            | Action::PickTrack
            | Action::SelectTrack
            | Action::SelectTrainer
            | Action::SelectTime
            | Action::RequestTraining
            | Action::CancelRegistration => true,
        }
    }

    pub fn admin_only(self) -> bool {
        !matches!(
            self,
            Action::Start
                | Action::SignUp
                | Action::Register
                | Action::MyRegistrations
                | Action::Confirm
                | Action::Cancel
                | Action::SelectTrack
                | Action::SelectTrainer
                | Action::SelectTime
                | Action::RequestTraining
                | Action::CancelRegistration
        )
    }

    /// Payload of a button without ID.
    pub fn payload(self) -> String {
        self.prefix().to_owned()
    }

    /// Payload of a button that points to the record `id`.
    pub fn with_id(self, id: EntityId) -> String {
        // IDs are never negative. Should one show up, the router rejects the payload.
        CallbackPayload::with_id(self.prefix(), u64::try_from(id).unwrap_or(u64::MAX))
    }
}

/// Menu where the user lands after cancelling a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelTarget {
    TrainerMenu,
    TrackMenu,
    ScheduleMenu,
    StartMenu,
}

/// Cancellation table.
///
/// # Description
///
/// Flows go back to the menu they were launched from. States without an entry answer with a generic message.
pub fn cancel_target(kind: StateKind) -> Option<CancelTarget> {
    match kind {
        StateKind::TrainerEnterName
        | StateKind::TrainerEnterTgId
        | StateKind::TrainerEnterChatId
        | StateKind::TrainerEnterInfo
        | StateKind::TrainerConfirm
        | StateKind::TrainerEditName
        | StateKind::TrainerEditTgId
        | StateKind::TrainerEditChatId
        | StateKind::TrainerEditInfo
        | StateKind::TrainerConfirmDelete => Some(CancelTarget::TrainerMenu),
        StateKind::TrackEnterName
        | StateKind::TrackEnterInfo
        | StateKind::TrackConfirm
        | StateKind::TrackEditName
        | StateKind::TrackEditInfo
        | StateKind::TrackConfirmDelete => Some(CancelTarget::TrackMenu),
        StateKind::TrainingSelectTrainer
        | StateKind::TrainingSelectTrack
        | StateKind::TrainingEnterTime
        | StateKind::TrainingConfirm
        | StateKind::TrainingEditTime
        | StateKind::TrainingConfirmDelete => Some(CancelTarget::ScheduleMenu),
        StateKind::UserEnterName
        | StateKind::UserEnterPhone
        | StateKind::UserConfirm
        | StateKind::RegisterSelectTrack
        | StateKind::RegisterSelectTrainer
        | StateKind::RegisterSelectTime
        | StateKind::RegisterConfirm
        | StateKind::RequestEnterTime => Some(CancelTarget::StartMenu),
        StateKind::Start
        | StateKind::AdminMenu
        | StateKind::TrainerMenu
        | StateKind::TrackMenu
        | StateKind::ScheduleMenu
        | StateKind::Error => None,
    }
}

fn entity_id(id: u64) -> Result<EntityId, FlowError> {
    EntityId::try_from(id).map_err(|_| FlowError::IdOutOfRange(id))
}

fn required(action: Action, id: Option<EntityId>) -> Result<EntityId, FlowError> {
    id.ok_or(FlowError::MissingId(action.prefix()))
}

/// Handle the press of a button.
#[tracing::instrument(
    name = "Callback router",
    skip(ctx, state, press),
    fields(
        chat_id = %ctx.chat_id,
        data = %press.data,
    )
)]
pub async fn route<R: Repository, M: Messenger>(
    ctx: &Context<'_, R, M>,
    state: State,
    press: &CallbackPress,
) -> HandlerResult {
    // Stop the spinner of the client first. This is a courtesy, so a failure doesn't stop the processing.
    if let Err(e) = ctx.messenger.acknowledge(&press.query_id).await {
        warn!("Failed to acknowledge the callback query: {e}");
    }

    // Confirm and cancel are resolved from the current state alone.
    if press.data == Action::Confirm.prefix() {
        return confirm(ctx, state).await;
    }
    if press.data == Action::Cancel.prefix() {
        return cancel(ctx, state).await;
    }

    let payload = CallbackPayload::parse(&press.data).map_err(FlowError::from)?;

    let Some(action) = Action::from_prefix(payload.action) else {
        info!("Ignoring stale callback `{}`", press.data);
        return Ok(State::Start);
    };

    let id = match payload.id {
        Some(_) if !action.takes_id() => return Err(FlowError::UnexpectedId(action.prefix()).into()),
        Some(id) => Some(entity_id(id)?),
        None => None,
    };

    if action.admin_only() && !ctx.is_admin().await? {
        return admin::not_allowed(ctx).await;
    }

    match action {
        Action::Start => start::menu(ctx, None).await,
        Action::AdminMenu => admin::menu(ctx, None).await,
        Action::Trainers => trainers::menu(ctx, None).await,
        Action::Tracks => tracks::menu(ctx, None).await,
        Action::Schedule => trainings::menu(ctx, None).await,
        Action::CreateTrainer => trainers::create(ctx).await,
        Action::CreateTrack => tracks::create(ctx).await,
        Action::CreateTraining => trainings::create(ctx).await,
        Action::SignUp => users::sign_up(ctx).await,
        Action::Register => registration::register(ctx).await,
        Action::MyRegistrations => registration::my_registrations(ctx).await,
        Action::Confirm => confirm(ctx, state).await,
        Action::Cancel => cancel(ctx, state).await,
        Action::Trainer => trainers::show(ctx, required(action, id)?).await,
        Action::EditTrainerName => {
            trainers::edit(ctx, required(action, id)?, trainers::Attribute::Name).await
        }
        Action::EditTrainerTgId => {
            trainers::edit(ctx, required(action, id)?, trainers::Attribute::TgId).await
        }
        Action::EditTrainerChatId => {
            trainers::edit(ctx, required(action, id)?, trainers::Attribute::ChatId).await
        }
        Action::EditTrainerInfo => {
            trainers::edit(ctx, required(action, id)?, trainers::Attribute::Info).await
        }
        Action::DeleteTrainer => trainers::delete(ctx, required(action, id)?).await,
        Action::Track => tracks::show(ctx, required(action, id)?).await,
        Action::EditTrackName => tracks::edit(ctx, required(action, id)?, tracks::Attribute::Name).await,
        Action::EditTrackInfo => tracks::edit(ctx, required(action, id)?, tracks::Attribute::Info).await,
        Action::DeleteTrack => tracks::delete(ctx, required(action, id)?).await,
        Action::Training => trainings::show(ctx, required(action, id)?).await,
        Action::EditTrainingTime => trainings::edit_time(ctx, required(action, id)?).await,
        Action::DeleteTraining => trainings::delete(ctx, required(action, id)?).await,
        Action::PickTrainer => trainings::pick_trainer(ctx, state, required(action, id)?).await,
        Action::PickTrack => trainings::pick_track(ctx, state, required(action, id)?).await,
        Action::SelectTrack => registration::select_track(ctx, state, required(action, id)?).await,
        Action::SelectTrainer => registration::select_trainer(ctx, state, required(action, id)?).await,
        Action::SelectTime => registration::select_time(ctx, state, required(action, id)?).await,
        Action::RequestTraining => {
            registration::request_training(ctx, state, required(action, id)?).await
        }
        Action::CancelRegistration => {
            registration::cancel_registration(ctx, required(action, id)?).await
        }
    }
}

/// Commit the data collected by a flow.
///
/// # Description
///
/// Each confirmation step carries the full record to commit, so the handlers only have to check the data
/// before the side effect.
pub async fn confirm<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, state: State) -> HandlerResult {
    if state.kind().is_admin_flow() && !ctx.is_admin().await? {
        return admin::not_allowed(ctx).await;
    }

    match state {
        State::TrainerConfirm(trainer) => trainers::confirm_create(ctx, trainer).await,
        State::TrainerConfirmDelete { trainer_id } => trainers::confirm_delete(ctx, trainer_id).await,
        State::TrackConfirm(track) => tracks::confirm_create(ctx, track).await,
        State::TrackConfirmDelete { track_id } => tracks::confirm_delete(ctx, track_id).await,
        State::TrainingConfirm(training) => trainings::confirm_create(ctx, training).await,
        State::TrainingConfirmDelete { training_id } => trainings::confirm_cancel(ctx, training_id).await,
        State::UserConfirm(user) => users::confirm(ctx, user).await,
        State::RegisterConfirm { training_id } => registration::confirm(ctx, training_id).await,
        State::Start
        | State::AdminMenu
        | State::TrainerMenu
        | State::TrackMenu
        | State::ScheduleMenu
        | State::Error
        | State::TrainerEnterName
        | State::TrainerEnterTgId { .. }
        | State::TrainerEnterChatId { .. }
        | State::TrainerEnterInfo { .. }
        | State::TrainerEditName { .. }
        | State::TrainerEditTgId { .. }
        | State::TrainerEditChatId { .. }
        | State::TrainerEditInfo { .. }
        | State::TrackEnterName
        | State::TrackEnterInfo { .. }
        | State::TrackEditName { .. }
        | State::TrackEditInfo { .. }
        | State::TrainingSelectTrainer
        | State::TrainingSelectTrack { .. }
        | State::TrainingEnterTime { .. }
        | State::TrainingEditTime { .. }
        | State::UserEnterName
        | State::UserEnterPhone { .. }
        | State::RegisterSelectTrack
        | State::RegisterSelectTrainer { .. }
        | State::RegisterSelectTime { .. }
        | State::RequestEnterTime { .. } => {
            ctx.show(texts::NOTHING_TO_CONFIRM, None).await?;
            Ok(State::Start)
        }
    }
}

/// Abort the flow in progress.
pub async fn cancel<R: Repository, M: Messenger>(ctx: &Context<'_, R, M>, state: State) -> HandlerResult {
    match cancel_target(state.kind()) {
        Some(CancelTarget::TrainerMenu) => trainers::menu(ctx, Some(texts::CANCELLED)).await,
        Some(CancelTarget::TrackMenu) => tracks::menu(ctx, Some(texts::CANCELLED)).await,
        Some(CancelTarget::ScheduleMenu) => trainings::menu(ctx, Some(texts::CANCELLED)).await,
        Some(CancelTarget::StartMenu) => start::menu(ctx, Some(texts::CANCELLED)).await,
        None => {
            ctx.show(texts::CANCELLED, None).await?;
            Ok(State::Start)
        }
    }
}
