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

//! Keyboards module
//!
//! # Description
//!
//! This module includes all the keyboards that are used within the handlers of the bot. Payloads are always
//! built from [Action], so a button can't point to an action the router doesn't know.

use crate::handlers::Action;
use repository::{EntityId, Track, Trainer};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// How many buttons to show per row when using full names.
const NAMES_PER_ROW: usize = 2;

fn button(text: &str, action: Action) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.payload())
}

fn id_button(text: &str, action: Action, id: EntityId) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.with_id(id))
}

/// Grid of buttons, one per item, followed by the rows in `footer`.
fn grid(
    items: &[(EntityId, String)],
    action: Action,
    footer: Vec<Vec<InlineKeyboardButton>>,
) -> InlineKeyboardMarkup {
    let mut keyboard_markup = InlineKeyboardMarkup::default();

    for chunk in items.chunks(NAMES_PER_ROW) {
        keyboard_markup =
            keyboard_markup.append_row(chunk.iter().map(|(id, label)| id_button(label, action, *id)));
    }

    for row in footer {
        keyboard_markup = keyboard_markup.append_row(row);
    }

    keyboard_markup
}

pub fn start_keyboard(is_member: bool, is_admin: bool) -> InlineKeyboardMarkup {
    let mut keyboard_markup = InlineKeyboardMarkup::default();

    if is_member {
        keyboard_markup = keyboard_markup
            .append_row([button("🏃 Register for a training", Action::Register)])
            .append_row([button("🗓️ My registrations", Action::MyRegistrations)]);
    } else {
        keyboard_markup = keyboard_markup.append_row([button("📝 Sign up", Action::SignUp)]);
    }

    if is_admin {
        keyboard_markup = keyboard_markup.append_row([button("🛠️ Admin menu", Action::AdminMenu)]);
    }

    keyboard_markup
}

pub fn admin_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default()
        .append_row([
            button("🧑‍🏫 Trainers", Action::Trainers),
            button("🏟️ Tracks", Action::Tracks),
        ])
        .append_row([button("📅 Schedule", Action::Schedule)])
        .append_row([button("⬅️ Main menu", Action::Start)])
}

pub fn trainers_keyboard(trainers: &[Trainer]) -> InlineKeyboardMarkup {
    let items: Vec<(EntityId, String)> = trainers.iter().map(|t| (t.id, t.name.clone())).collect();

    grid(
        &items,
        Action::Trainer,
        vec![
            vec![button("➕ Add trainer", Action::CreateTrainer)],
            vec![button("⬅️ Back", Action::AdminMenu)],
        ],
    )
}

pub fn trainer_keyboard(trainer_id: EntityId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default()
        .append_row([
            id_button("✏️ Name", Action::EditTrainerName, trainer_id),
            id_button("✏️ Telegram", Action::EditTrainerTgId, trainer_id),
        ])
        .append_row([
            id_button("✏️ Chat ID", Action::EditTrainerChatId, trainer_id),
            id_button("✏️ Info", Action::EditTrainerInfo, trainer_id),
        ])
        .append_row([id_button("🗑️ Delete", Action::DeleteTrainer, trainer_id)])
        .append_row([button("⬅️ Back", Action::Trainers)])
}

pub fn tracks_keyboard(tracks: &[Track]) -> InlineKeyboardMarkup {
    let items: Vec<(EntityId, String)> = tracks.iter().map(|t| (t.id, t.name.clone())).collect();

    grid(
        &items,
        Action::Track,
        vec![
            vec![button("➕ Add track", Action::CreateTrack)],
            vec![button("⬅️ Back", Action::AdminMenu)],
        ],
    )
}

pub fn track_keyboard(track_id: EntityId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default()
        .append_row([
            id_button("✏️ Name", Action::EditTrackName, track_id),
            id_button("✏️ Info", Action::EditTrackInfo, track_id),
        ])
        .append_row([id_button("🗑️ Delete", Action::DeleteTrack, track_id)])
        .append_row([button("⬅️ Back", Action::Tracks)])
}

/// Upcoming trainings, labelled by the caller.
pub fn schedule_keyboard(trainings: &[(EntityId, String)]) -> InlineKeyboardMarkup {
    let mut keyboard_markup = InlineKeyboardMarkup::default();

    // Labels are long, so one training per row.
    for (id, label) in trainings {
        keyboard_markup = keyboard_markup.append_row([id_button(label, Action::Training, *id)]);
    }

    keyboard_markup
        .append_row([button("➕ New training", Action::CreateTraining)])
        .append_row([button("⬅️ Back", Action::AdminMenu)])
}

pub fn training_keyboard(training_id: EntityId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default()
        .append_row([id_button("🕒 Change time", Action::EditTrainingTime, training_id)])
        .append_row([id_button("🗑️ Cancel training", Action::DeleteTraining, training_id)])
        .append_row([button("⬅️ Back", Action::Schedule)])
}

/// Pick one of `items` as a step of a wizard. The wizard can be aborted with the cancel button.
pub fn pick_keyboard(items: &[(EntityId, String)], action: Action) -> InlineKeyboardMarkup {
    grid(items, action, vec![vec![button("✖️ Cancel", Action::Cancel)]])
}

/// Trainings a member can register for, plus the option to request a different time.
pub fn times_keyboard(trainings: &[(EntityId, String)], trainer_id: EntityId) -> InlineKeyboardMarkup {
    let mut keyboard_markup = InlineKeyboardMarkup::default();

    for (id, label) in trainings {
        keyboard_markup = keyboard_markup.append_row([id_button(label, Action::SelectTime, *id)]);
    }

    keyboard_markup
        .append_row([id_button("📨 Request another time", Action::RequestTraining, trainer_id)])
        .append_row([button("✖️ Cancel", Action::Cancel)])
}

pub fn registrations_keyboard(registrations: &[(EntityId, String)]) -> InlineKeyboardMarkup {
    let mut keyboard_markup = InlineKeyboardMarkup::default();

    for (id, label) in registrations {
        keyboard_markup = keyboard_markup.append_row([id_button(label, Action::CancelRegistration, *id)]);
    }

    keyboard_markup.append_row([button("⬅️ Main menu", Action::Start)])
}

pub fn confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default().append_row([
        button("✅ Confirm", Action::Confirm),
        button("✖️ Cancel", Action::Cancel),
    ])
}

pub fn cancel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default().append_row([button("✖️ Cancel", Action::Cancel)])
}

pub fn sign_up_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default().append_row([button("📝 Sign up", Action::SignUp)])
}
