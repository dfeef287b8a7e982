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

//! Records managed by the repository.
//!
//! # Description
//!
//! Each entity comes with a `New*` counterpart that carries the fields given by the user when the record is
//! created. The ID and the timestamps are assigned by the repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Identifier of the records of the repository.
pub type EntityId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Trainer {
    pub id: EntityId,
    pub name: String,
    /// Telegram handle, i.e. `@ivan`.
    pub tg_id: String,
    /// Chat where the trainer receives the notifications of the bot.
    pub chat_id: i64,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrainer {
    pub name: String,
    pub tg_id: String,
    pub chat_id: i64,
    pub info: String,
}

/// Single field update of a [Trainer].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerField {
    Name(String),
    TgId(String),
    ChatId(i64),
    Info(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub id: EntityId,
    pub name: String,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrack {
    pub name: String,
    pub info: String,
}

/// Single field update of a [Track].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackField {
    Name(String),
    Info(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingStatus {
    Scheduled,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Training {
    pub id: EntityId,
    pub trainer_id: EntityId,
    pub track_id: EntityId,
    pub starts_at: DateTime<Utc>,
    pub status: TrainingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTraining {
    pub trainer_id: EntityId,
    pub track_id: EntityId,
    pub starts_at: DateTime<Utc>,
}

/// Member of the academy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: EntityId,
    pub chat_id: i64,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub chat_id: i64,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub chat_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    Active,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRegistration {
    pub id: EntityId,
    pub training_id: EntityId,
    pub user_id: EntityId,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

/// Request of a training that is not in the schedule yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TrainingRequest {
    pub id: EntityId,
    pub user_id: EntityId,
    pub trainer_id: EntityId,
    pub track_id: EntityId,
    /// Free text given by the member, i.e. "Saturday mornings".
    pub preferred_time: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrainingRequest {
    pub user_id: EntityId,
    pub trainer_id: EntityId,
    pub track_id: EntityId,
    pub preferred_time: String,
}

impl FromStr for TrainingStatus {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TrainingStatus::Scheduled),
            "cancelled" => Ok(TrainingStatus::Cancelled),
            _ => Err("Invalid TrainingStatus type"),
        }
    }
}

impl std::fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainingStatus::Scheduled => write!(f, "scheduled"),
            TrainingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RegistrationStatus::Active),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            _ => Err("Invalid RegistrationStatus type"),
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Active => write!(f, "active"),
            RegistrationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}
