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

//! Callback payloads of inline keyboard buttons.
//!
//! # Description
//!
//! Buttons carry a short string chosen by the bot. Two formats are expected:
//!
//! - Bare action: `<action>`, e.g. `trainers`.
//! - Action + ID: `<action>_<id>`, e.g. `selectTrack_42`.
//!
//! The first `_` delimits the action from the ID, thus action names must not contain that character. The ID
//! must be an unsigned integer; anything else is rejected instead of being read as zero.

use std::fmt;
use thiserror::Error;

const SEPARATOR: char = '_';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("empty callback payload")]
    Empty,
    #[error("invalid id in callback payload `{0}`")]
    InvalidId(String),
}

/// Parsed callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload<'a> {
    pub action: &'a str,
    pub id: Option<u64>,
}

impl<'a> CallbackPayload<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, PayloadError> {
        if raw.is_empty() {
            return Err(PayloadError::Empty);
        }

        match raw.split_once(SEPARATOR) {
            Some((action, id)) => {
                if action.is_empty() {
                    return Err(PayloadError::Empty);
                }
                let id = id
                    .parse::<u64>()
                    .map_err(|_| PayloadError::InvalidId(raw.to_owned()))?;
                Ok(CallbackPayload {
                    action,
                    id: Some(id),
                })
            }
            None => Ok(CallbackPayload {
                action: raw,
                id: None,
            }),
        }
    }

    /// Build the payload string of a button that carries an ID.
    pub fn with_id(action: &str, id: u64) -> String {
        format!("{action}{SEPARATOR}{id}")
    }
}

impl fmt::Display for CallbackPayload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}{SEPARATOR}{id}", self.action),
            None => write!(f, "{}", self.action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("selectTrack_42", "selectTrack", Some(42))]
    #[case("confirm", "confirm", None)]
    #[case("trainer_0", "trainer", Some(0))]
    #[case("deleteTrack_18446744073709551615", "deleteTrack", Some(u64::MAX))]
    fn parses_valid_payloads(#[case] raw: &str, #[case] action: &str, #[case] id: Option<u64>) {
        let payload = CallbackPayload::parse(raw).expect("Failed to parse a valid payload");
        assert_eq!(payload, CallbackPayload { action, id });
        assert_eq!(payload.to_string(), raw);
    }

    #[rstest]
    #[case("selectTrack_abc")]
    #[case("selectTrack_")]
    #[case("selectTrack_-1")]
    #[case("selectTrack_1_2")]
    fn rejects_non_numeric_ids(#[case] raw: &str) {
        assert_eq!(
            CallbackPayload::parse(raw),
            Err(PayloadError::InvalidId(raw.to_owned()))
        );
    }

    #[rstest]
    #[case("")]
    #[case("_12")]
    fn rejects_empty_actions(#[case] raw: &str) {
        assert_eq!(CallbackPayload::parse(raw), Err(PayloadError::Empty));
    }

    #[test]
    fn splits_on_first_separator_only() {
        // The suffix keeps everything after the first separator, so it can't be numeric.
        assert!(CallbackPayload::parse("a_b_3").is_err());
        assert_eq!(CallbackPayload::with_id("pickTrainer", 7), "pickTrainer_7");
    }
}
