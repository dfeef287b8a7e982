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

//! Validation of the free text typed by users.
//!
//! # Description
//!
//! [validate] returns either the normalized value, ready to be stored, or the list of messages that explain
//! the user what's wrong with the input. Leading and trailing white space is never significant.

use crate::texts::TIME_FORMAT;
use chrono::{DateTime, NaiveDateTime, Utc};

const MAX_NAME_LEN: usize = 64;
const MAX_INFO_LEN: usize = 500;
const MAX_REQUEST_LEN: usize = 200;
const MIN_HANDLE_LEN: usize = 3;
const MAX_HANDLE_LEN: usize = 32;
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    TrainerName,
    TelegramHandle,
    ChatId,
    TrainerInfo,
    TrackName,
    TrackInfo,
    TrainingTime,
    UserName,
    Phone,
    RequestText,
}

pub fn validate(field: Field, raw: &str) -> Result<String, Vec<String>> {
    validate_at(field, raw, Utc::now())
}

/// Same as [validate], using `now` as the current time.
pub fn validate_at(field: Field, raw: &str, now: DateTime<Utc>) -> Result<String, Vec<String>> {
    let input = raw.trim();

    match field {
        Field::TrainerName | Field::UserName => person_name(input),
        Field::TelegramHandle => telegram_handle(input),
        Field::ChatId => chat_id(input),
        Field::TrainerInfo | Field::TrackInfo => free_text(input, MAX_INFO_LEN),
        Field::TrackName => free_text(input, MAX_NAME_LEN),
        Field::TrainingTime => training_time(input, now),
        Field::Phone => phone(input),
        Field::RequestText => free_text(input, MAX_REQUEST_LEN),
    }
}

/// Parse a training time that already passed the validation.
pub fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

fn person_name(input: &str) -> Result<String, Vec<String>> {
    let mut errors = Vec::new();

    if input.chars().count() < 2 {
        errors.push("The name is too short.".to_owned());
    }
    if input.chars().count() > MAX_NAME_LEN {
        errors.push(format!("The name can't be longer than {MAX_NAME_LEN} characters."));
    }
    if input
        .chars()
        .any(|c| !(c.is_alphabetic() || c == ' ' || c == '-' || c == '.' || c == '\''))
    {
        errors.push("The name can only contain letters, spaces, dots, dashes and apostrophes.".to_owned());
    }

    if errors.is_empty() {
        // Collapse inner runs of white space.
        Ok(input.split_whitespace().collect::<Vec<_>>().join(" "))
    } else {
        Err(errors)
    }
}

fn telegram_handle(input: &str) -> Result<String, Vec<String>> {
    let handle = input.strip_prefix('@').unwrap_or(input);
    let mut errors = Vec::new();

    let len = handle.chars().count();
    if !(MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&len) {
        errors.push(format!(
            "A Telegram user has between {MIN_HANDLE_LEN} and {MAX_HANDLE_LEN} characters."
        ));
    }
    if !handle.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        errors.push("A Telegram user starts with a letter.".to_owned());
    }
    if handle.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
        errors.push("A Telegram user can only contain letters, digits and underscores.".to_owned());
    }

    if errors.is_empty() {
        Ok(format!("@{handle}"))
    } else {
        Err(errors)
    }
}

fn chat_id(input: &str) -> Result<String, Vec<String>> {
    match input.parse::<i64>() {
        Ok(id) => Ok(id.to_string()),
        Err(_) => Err(vec!["A chat ID is a number, i.e. 123456.".to_owned()]),
    }
}

fn free_text(input: &str, max_len: usize) -> Result<String, Vec<String>> {
    if input.is_empty() {
        Err(vec!["The text can't be empty.".to_owned()])
    } else if input.chars().count() > max_len {
        Err(vec![format!("The text can't be longer than {max_len} characters.")])
    } else {
        Ok(input.to_owned())
    }
}

fn training_time(input: &str, now: DateTime<Utc>) -> Result<String, Vec<String>> {
    match parse_time(input) {
        Some(time) if time > now => Ok(time.format(TIME_FORMAT).to_string()),
        Some(_) => Err(vec!["The training must start in the future.".to_owned()]),
        None => Err(vec!["Use the format YYYY-MM-DD HH:MM, i.e. 2030-05-17 18:30.".to_owned()]),
    }
}

fn phone(input: &str) -> Result<String, Vec<String>> {
    let (prefix, number) = match input.strip_prefix('+') {
        Some(number) => ("+", number),
        None => ("", input),
    };

    if number.chars().any(|c| !(c.is_ascii_digit() || c == ' ' || c == '-')) {
        return Err(vec![
            "A phone number can only contain digits, spaces and dashes.".to_owned(),
        ]);
    }

    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(vec![format!(
            "A phone number has between {MIN_PHONE_DIGITS} and {MAX_PHONE_DIGITS} digits."
        )]);
    }

    Ok(format!("{prefix}{digits}"))
}
