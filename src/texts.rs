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

//! Texts sent by the bot.
//!
//! # Description
//!
//! Messages are sent using the HTML parse mode, so every piece of text that comes from users must be escaped
//! before being embedded in a message.

use chrono::{DateTime, Utc};
use repository::{NewTrack, NewTrainer, NewUser, Track, Trainer, Training, TrainingRegistration};
use teloxide::utils::html::escape;

/// Format used to show dates, and expected from the admins when scheduling a training.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub const APOLOGY: &str = "🚒 Something went wrong on our side, please try again later.";
pub const FLOW_ERROR: &str = "🚒 I got lost in this conversation. Type /start to begin again.";
pub const NOT_ALLOWED: &str = "⛔ This option is reserved to the staff of the academy.";
pub const CANCELLED: &str = "↩️ Operation cancelled.";
pub const NOTHING_TO_CONFIRM: &str = "🤷 There's nothing pending to confirm.";
pub const CONFIRM_HINT: &str = "Is everything right?";

pub const ADMIN_MENU: &str = "🛠️ <b>Admin menu</b>\n\nWhat do you want to manage?";
pub const TRAINERS_MENU: &str = "🧑‍🏫 <b>Trainers</b>";
pub const TRACKS_MENU: &str = "🏟️ <b>Tracks</b>";
pub const SCHEDULE_MENU: &str = "📅 <b>Upcoming trainings</b>";
pub const NO_TRAINERS: &str = "There are no trainers yet.";
pub const NO_TRACKS: &str = "There are no tracks yet.";
pub const NO_TRAININGS: &str = "There are no trainings scheduled.";

pub const ASK_TRAINER_NAME: &str = "Type the full name of the trainer:";
pub const ASK_TRAINER_TG_ID: &str = "Type the Telegram user of the trainer, i.e. <code>@ivan</code>:";
pub const ASK_TRAINER_CHAT_ID: &str = "Type the chat ID in which the trainer gets the notifications:";
pub const ASK_TRAINER_INFO: &str = "Type a short description of the trainer:";
pub const ASK_TRACK_NAME: &str = "Type the name of the track:";
pub const ASK_TRACK_INFO: &str = "Type a short description of the track:";
pub const ASK_TRAINING_TIME: &str = "Type the start time of the training, using the format <code>YYYY-MM-DD HH:MM</code> (UTC):";
pub const ASK_PICK_TRAINER: &str = "Who is going to lead the training?";
pub const ASK_PICK_TRACK: &str = "Where is the training going to take place?";
pub const ASK_USER_NAME: &str = "Let's sign you up! Type your full name:";
pub const ASK_USER_PHONE: &str = "Type your phone number, i.e. <code>+34 600 000 000</code>:";
pub const ASK_REQUEST_TIME: &str = "Tell us when you would like to train, i.e. <i>Saturday mornings</i>:";

pub const ASK_SELECT_TRACK: &str = "🏟️ Pick a track:";
pub const ASK_SELECT_TRAINER: &str = "🧑‍🏫 Pick a trainer:";
pub const ASK_SELECT_TIME: &str = "📅 Pick a training:";
pub const NO_TIMES: &str = "📅 There are no trainings scheduled with this trainer. You can request one.";

pub const ALREADY_MEMBER: &str = "👍 You are already a member of the academy.";
pub const NOT_A_MEMBER: &str = "✋ You need to sign up before registering for a training.";
pub const ALREADY_REGISTERED: &str = "👍 You were already registered for this training.";
pub const REGISTRATION_GONE: &str = "That registration doesn't exist anymore.";
pub const NO_REGISTRATIONS: &str = "You are not registered for any training.";
pub const MY_REGISTRATIONS: &str = "🗓️ <b>Your registrations</b>\n\nPress a training to cancel your registration.";
pub const REGISTRATION_CANCELLED: &str = "✅ Registration cancelled.";
pub const REQUEST_SENT: &str = "📨 Request sent. The trainer will get in touch with you.";
pub const GONE: &str = "🤷 That record doesn't exist anymore.";
pub const TRAINING_UNAVAILABLE: &str = "🤷 That training is not available anymore.";

pub fn welcome(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("👋 Welcome back {}!\n\nWhat do you want to do?", escape(name)),
        None => "👋 Welcome to the academy!\n\nWhat do you want to do?".to_owned(),
    }
}

/// Prepend the outcome of the last operation to a menu.
pub fn with_notice(notice: Option<&str>, text: &str) -> String {
    match notice {
        Some(notice) => format!("{notice}\n\n{text}"),
        None => text.to_owned(),
    }
}

/// Compose the answer to an input that didn't pass the validation.
pub fn invalid_input(errors: &[String], prompt: &str) -> String {
    let mut text = String::from("⚠️ ");
    text.push_str(&errors.iter().map(|e| escape(e)).collect::<Vec<_>>().join("\n⚠️ "));
    text.push_str("\n\n");
    text.push_str(prompt);
    text
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn trainer_details(trainer: &Trainer) -> String {
    format!(
        "🧑‍🏫 <b>{}</b>\n\nTelegram: {}\nChat ID: <code>{}</code>\n\n{}",
        escape(&trainer.name),
        escape(&trainer.tg_id),
        trainer.chat_id,
        escape(&trainer.info),
    )
}

pub fn new_trainer_summary(trainer: &NewTrainer) -> String {
    format!(
        "<b>New trainer</b>\n\nName: {}\nTelegram: {}\nChat ID: <code>{}</code>\nInfo: {}\n\n{CONFIRM_HINT}",
        escape(&trainer.name),
        escape(&trainer.tg_id),
        trainer.chat_id,
        escape(&trainer.info),
    )
}

pub fn trainer_created(trainer: &Trainer) -> String {
    format!("✅ Trainer <b>{}</b> created.", escape(&trainer.name))
}

pub fn trainer_updated(trainer: &Trainer) -> String {
    format!("✅ Trainer <b>{}</b> updated.", escape(&trainer.name))
}

pub fn confirm_trainer_delete(trainer: &Trainer) -> String {
    format!(
        "🗑️ Delete the trainer <b>{}</b> and all the trainings they lead?",
        escape(&trainer.name)
    )
}

pub fn track_details(track: &Track) -> String {
    format!("🏟️ <b>{}</b>\n\n{}", escape(&track.name), escape(&track.info))
}

pub fn new_track_summary(track: &NewTrack) -> String {
    format!(
        "<b>New track</b>\n\nName: {}\nInfo: {}\n\n{CONFIRM_HINT}",
        escape(&track.name),
        escape(&track.info),
    )
}

pub fn track_created(track: &Track) -> String {
    format!("✅ Track <b>{}</b> created.", escape(&track.name))
}

pub fn track_updated(track: &Track) -> String {
    format!("✅ Track <b>{}</b> updated.", escape(&track.name))
}

pub fn confirm_track_delete(track: &Track) -> String {
    format!(
        "🗑️ Delete the track <b>{}</b> and all the trainings scheduled in it?",
        escape(&track.name)
    )
}

/// One line description of a training.
pub fn training_label(training: &Training, trainer: &str, track: &str) -> String {
    format!("{} · {track} · {trainer}", format_time(&training.starts_at))
}

pub fn training_details(training: &Training, trainer: &Trainer, track: &Track) -> String {
    format!(
        "📅 <b>{}</b>\n\nTrack: {}\nTrainer: {}",
        format_time(&training.starts_at),
        escape(&track.name),
        escape(&trainer.name),
    )
}

pub fn new_training_summary(starts_at: &DateTime<Utc>, trainer: &Trainer, track: &Track) -> String {
    format!(
        "<b>New training</b>\n\nTime: {}\nTrack: {}\nTrainer: {}\n\n{CONFIRM_HINT}",
        format_time(starts_at),
        escape(&track.name),
        escape(&trainer.name),
    )
}

pub fn training_scheduled(training: &Training) -> String {
    format!("✅ Training scheduled for {}.", format_time(&training.starts_at))
}

pub fn training_rescheduled(training: &Training) -> String {
    format!("✅ Training moved to {}.", format_time(&training.starts_at))
}

pub fn confirm_training_cancel(training: &Training) -> String {
    format!(
        "🗑️ Cancel the training of {}? Registered members lose their registration.",
        format_time(&training.starts_at)
    )
}

pub const TRAINING_CANCELLED: &str = "✅ Training cancelled.";
pub const TRAINER_DELETED: &str = "✅ Trainer deleted.";
pub const TRACK_DELETED: &str = "✅ Track deleted.";

pub fn new_user_summary(user: &NewUser) -> String {
    format!(
        "<b>Sign up</b>\n\nName: {}\nPhone: {}\n\n{CONFIRM_HINT}",
        escape(&user.name),
        escape(&user.phone),
    )
}

pub fn user_created(name: &str) -> String {
    format!("🎉 Welcome to the academy, {}!", escape(name))
}

pub fn confirm_registration(training: &Training, trainer: &Trainer, track: &Track) -> String {
    format!(
        "Register for the training of {} at {} with {}?",
        format_time(&training.starts_at),
        escape(&track.name),
        escape(&trainer.name),
    )
}

pub fn registered(training: &Training) -> String {
    format!(
        "✅ You are registered for the training of {}. See you there!",
        format_time(&training.starts_at)
    )
}

pub fn registration_label(registration: &TrainingRegistration, training: Option<&Training>) -> String {
    match training {
        Some(training) => format!("❌ {}", format_time(&training.starts_at)),
        None => format!("❌ Registration {}", registration.id),
    }
}

/// Notification sent to a trainer when a member requests a training.
pub fn training_request(member: &str, phone: &str, track: &Track, preferred_time: &str) -> String {
    format!(
        "📨 <b>Training request</b>\n\n{} ({}) would like to train at {}.\nPreferred time: {}",
        escape(member),
        escape(phone),
        escape(&track.name),
        escape(preferred_time),
    )
}

pub fn help() -> String {
    use crate::Command;
    use teloxide::utils::command::BotCommands;

    format!(
        "{}\n\n⚙️{}",
        include_str!("../data/templates/help_en.txt"),
        Command::descriptions(),
    )
}

pub fn fallback() -> &'static str {
    include_str!("../data/templates/warning_en.txt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn user_text_is_escaped() {
        let track = Track {
            id: 1,
            name: "<b>Sprint</b>".to_owned(),
            info: "A & B".to_owned(),
        };

        assert_eq!(
            track_details(&track),
            "🏟️ <b>&lt;b&gt;Sprint&lt;/b&gt;</b>\n\nA &amp; B"
        );
    }

    #[test]
    fn validation_errors_come_before_the_prompt() {
        let text = invalid_input(&["Too short".to_owned(), "Bad char <".to_owned()], "Again:");
        assert_eq!(text, "⚠️ Too short\n⚠️ Bad char &lt;\n\nAgain:");
    }

    #[test]
    fn notices_go_first() {
        assert_eq!(with_notice(Some(CANCELLED), "Menu"), format!("{CANCELLED}\n\nMenu"));
        assert_eq!(with_notice(None, "Menu"), "Menu");
    }

    #[test]
    fn times_use_the_input_format() {
        let time = Utc
            .with_ymd_and_hms(2030, 5, 17, 18, 30, 0)
            .single()
            .expect("Invalid test date");
        assert_eq!(format_time(&time), "2030-05-17 18:30");
    }
}
