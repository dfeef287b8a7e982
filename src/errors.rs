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

//! Custom error types.

use crate::StateKind;
use bot_core::{PayloadError, TransportError};
use repository::RepoError;
use thiserror::Error;

/// Integrity errors of a conversation flow.
///
/// # Description
///
/// None of these is caused by a wrong input of the user: they mean the update doesn't fit the state of the
/// conversation. The dispatcher moves such conversations to [crate::State::Error].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("malformed callback payload")]
    Payload(#[from] PayloadError),
    #[error("action {0} requires an ID")]
    MissingId(&'static str),
    #[error("action {0} doesn't take an ID")]
    UnexpectedId(&'static str),
    #[error("ID {0} is out of range")]
    IdOutOfRange(u64),
    #[error("action {action} is not valid in state {state:?}")]
    UnexpectedState { action: &'static str, state: StateKind },
    #[error("incomplete data in state {0:?}")]
    Incomplete(StateKind),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("repository error: {0}")]
    Repository(#[from] RepoError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("flow error: {0}")]
    Flow(#[from] FlowError),
}

/// Turn a lookup by ID into an optional record.
///
/// Buttons of old messages may point to records that were deleted since. Handlers answer those presses with
/// a notice instead of an apology.
pub fn found<T>(result: Result<T, RepoError>) -> Result<Option<T>, RepoError> {
    match result {
        Ok(record) => Ok(Some(record)),
        Err(RepoError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_records_are_not_errors() {
        let missing: Result<u8, RepoError> = Err(RepoError::NotFound { entity: "trainer", id: 7 });
        let broken: Result<u8, RepoError> = Err(RepoError::UnknownDbError("boom".to_owned()));

        assert_eq!(found(Ok(1)), Ok(Some(1)));
        assert_eq!(found(missing), Ok(None));
        assert!(found(broken).is_err());
    }
}
