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

//! Library of the AcademyBot crate.

use repository::{EntityId, NewTrack, NewTrainer, NewTraining, NewUser};
use teloxide::utils::command::BotCommands;

pub mod errors;
pub mod health;
pub mod keyboards;
pub mod telegram;
pub mod telemetry;
pub mod texts;
pub mod validation;

// Bring all the endpoints to the main context.
pub mod endpoints {
    pub mod admin;
    pub mod help;
    pub mod registration;
    pub mod start;
    pub mod tracks;
    pub mod trainers;
    pub mod trainings;
    pub mod users;
}

// Bring all the handlers to the main context.
pub mod handlers {
    mod context;
    mod dispatcher;
    pub mod router;

    pub use context::Context;
    pub use dispatcher::Dispatcher;
    pub use router::Action;
}

pub use errors::{FlowError, HandlerError};

type HandlerResult = Result<State, HandlerError>;

/// State machine
///
/// # Description
///
/// Each variant is a step of a conversation. Wizard steps carry the data entered in the previous steps, so a
/// handler only gets to see a step once all the data it needs is available.
///
/// The state is replaced as a whole after each update. A step that rejects the input of the user returns the
/// very same state it received.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Start,
    AdminMenu,
    TrainerMenu,
    TrackMenu,
    ScheduleMenu,
    /// Something went wrong in the flow. The next update starts over.
    Error,

    TrainerEnterName,
    TrainerEnterTgId {
        name: String,
    },
    TrainerEnterChatId {
        name: String,
        tg_id: String,
    },
    TrainerEnterInfo {
        name: String,
        tg_id: String,
        chat_id: i64,
    },
    TrainerConfirm(NewTrainer),
    TrainerEditName {
        trainer_id: EntityId,
    },
    TrainerEditTgId {
        trainer_id: EntityId,
    },
    TrainerEditChatId {
        trainer_id: EntityId,
    },
    TrainerEditInfo {
        trainer_id: EntityId,
    },
    TrainerConfirmDelete {
        trainer_id: EntityId,
    },

    TrackEnterName,
    TrackEnterInfo {
        name: String,
    },
    TrackConfirm(NewTrack),
    TrackEditName {
        track_id: EntityId,
    },
    TrackEditInfo {
        track_id: EntityId,
    },
    TrackConfirmDelete {
        track_id: EntityId,
    },

    TrainingSelectTrainer,
    TrainingSelectTrack {
        trainer_id: EntityId,
    },
    TrainingEnterTime {
        trainer_id: EntityId,
        track_id: EntityId,
    },
    TrainingConfirm(NewTraining),
    TrainingEditTime {
        training_id: EntityId,
    },
    TrainingConfirmDelete {
        training_id: EntityId,
    },

    UserEnterName,
    UserEnterPhone {
        name: String,
    },
    UserConfirm(NewUser),

    RegisterSelectTrack,
    RegisterSelectTrainer {
        track_id: EntityId,
    },
    RegisterSelectTime {
        track_id: EntityId,
        trainer_id: EntityId,
    },
    RegisterConfirm {
        training_id: EntityId,
    },
    RequestEnterTime {
        track_id: EntityId,
        trainer_id: EntityId,
    },
}

/// Discriminant of [State], without the wizard data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKind {
    Start,
    AdminMenu,
    TrainerMenu,
    TrackMenu,
    ScheduleMenu,
    Error,
    TrainerEnterName,
    TrainerEnterTgId,
    TrainerEnterChatId,
    TrainerEnterInfo,
    TrainerConfirm,
    TrainerEditName,
    TrainerEditTgId,
    TrainerEditChatId,
    TrainerEditInfo,
    TrainerConfirmDelete,
    TrackEnterName,
    TrackEnterInfo,
    TrackConfirm,
    TrackEditName,
    TrackEditInfo,
    TrackConfirmDelete,
    TrainingSelectTrainer,
    TrainingSelectTrack,
    TrainingEnterTime,
    TrainingConfirm,
    TrainingEditTime,
    TrainingConfirmDelete,
    UserEnterName,
    UserEnterPhone,
    UserConfirm,
    RegisterSelectTrack,
    RegisterSelectTrainer,
    RegisterSelectTime,
    RegisterConfirm,
    RequestEnterTime,
}

impl State {
    pub fn kind(&self) -> StateKind {
        match self {
            State::Start => StateKind::Start,
            State::AdminMenu => StateKind::AdminMenu,
            State::TrainerMenu => StateKind::TrainerMenu,
            State::TrackMenu => StateKind::TrackMenu,
            State::ScheduleMenu => StateKind::ScheduleMenu,
            State::Error => StateKind::Error,
            State::TrainerEnterName => StateKind::TrainerEnterName,
            State::TrainerEnterTgId { .. } => StateKind::TrainerEnterTgId,
            State::TrainerEnterChatId { .. } => StateKind::TrainerEnterChatId,
            State::TrainerEnterInfo { .. } => StateKind::TrainerEnterInfo,
            State::TrainerConfirm(_) => StateKind::TrainerConfirm,
            State::TrainerEditName { .. } => StateKind::TrainerEditName,
            State::TrainerEditTgId { .. } => StateKind::TrainerEditTgId,
            State::TrainerEditChatId { .. } => StateKind::TrainerEditChatId,
            State::TrainerEditInfo { .. } => StateKind::TrainerEditInfo,
            State::TrainerConfirmDelete { .. } => StateKind::TrainerConfirmDelete,
            State::TrackEnterName => StateKind::TrackEnterName,
            State::TrackEnterInfo { .. } => StateKind::TrackEnterInfo,
            State::TrackConfirm(_) => StateKind::TrackConfirm,
            State::TrackEditName { .. } => StateKind::TrackEditName,
            State::TrackEditInfo { .. } => StateKind::TrackEditInfo,
            State::TrackConfirmDelete { .. } => StateKind::TrackConfirmDelete,
            State::TrainingSelectTrainer => StateKind::TrainingSelectTrainer,
            State::TrainingSelectTrack { .. } => StateKind::TrainingSelectTrack,
            State::TrainingEnterTime { .. } => StateKind::TrainingEnterTime,
            State::TrainingConfirm(_) => StateKind::TrainingConfirm,
            State::TrainingEditTime { .. } => StateKind::TrainingEditTime,
            State::TrainingConfirmDelete { .. } => StateKind::TrainingConfirmDelete,
            State::UserEnterName => StateKind::UserEnterName,
            State::UserEnterPhone { .. } => StateKind::UserEnterPhone,
            State::UserConfirm(_) => StateKind::UserConfirm,
            State::RegisterSelectTrack => StateKind::RegisterSelectTrack,
            State::RegisterSelectTrainer { .. } => StateKind::RegisterSelectTrainer,
            State::RegisterSelectTime { .. } => StateKind::RegisterSelectTime,
            State::RegisterConfirm { .. } => StateKind::RegisterConfirm,
            State::RequestEnterTime { .. } => StateKind::RequestEnterTime,
        }
    }
}

impl StateKind {
    /// Whether the state belongs to the flows reserved to the admins of the academy.
    pub fn is_admin_flow(self) -> bool {
        !matches!(
            self,
            StateKind::Start
                | StateKind::Error
                | StateKind::UserEnterName
                | StateKind::UserEnterPhone
                | StateKind::UserConfirm
                | StateKind::RegisterSelectTrack
                | StateKind::RegisterSelectTrainer
                | StateKind::RegisterSelectTime
                | StateKind::RegisterConfirm
                | StateKind::RequestEnterTime
        )
    }
}

/// Commands of the bot
///
/// # Description
///
/// Commands are accepted in any state of the conversation and abort whatever flow was in progress.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Show the main menu
    Start,
    /// Show the help message
    Help,
    /// Manage trainers, tracks and the schedule
    Admin,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/start", Command::Start)]
    #[case("/help", Command::Help)]
    #[case("/admin", Command::Admin)]
    #[case("/start@academy_bot", Command::Start)]
    fn commands_are_parsed(#[case] text: &str, #[case] command: Command) {
        assert_eq!(Command::parse(text, "academy_bot").ok(), Some(command));
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(Command::parse("Ivan Petrov", "academy_bot").is_err());
        assert!(Command::parse("/unknown", "academy_bot").is_err());
    }

    #[rstest]
    #[case(State::TrainerEnterTgId { name: "Ivan".to_owned() }, true)]
    #[case(State::ScheduleMenu, true)]
    #[case(State::RegisterConfirm { training_id: 3 }, false)]
    #[case(State::Start, false)]
    fn admin_flows(#[case] state: State, #[case] admin: bool) {
        assert_eq!(state.kind().is_admin_flow(), admin);
    }
}
