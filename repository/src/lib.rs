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

//! `Repository` library crate.
//!
//! # Description
//!
//! This crate splits all the logic that relies on the storage of the academy: trainers, tracks, the schedule
//! of trainings, the members and their registrations. The rest of the bot only sees the [Repository] trait.
//!
//! Two backends are available:
//!
//! - [PgRepository]: PostgreSQL backend. The schema is embedded in the binary and migrated at start up.
//! - [InMemoryRepository]: volatile backend, handy for tests and for running the bot without a DB server.
//!
//! ## How To Develop This Library
//!
//! The queries are checked at runtime, so no DB server is needed to build the crate. The migrations live in
//! `./migrations` and are embedded by `sqlx::migrate!`; add a new file there for every schema change.

use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;

mod entities;
mod memory;
mod postgres;

pub use entities::{
    Admin, EntityId, NewTrack, NewTrainer, NewTraining, NewTrainingRequest, NewUser, RegistrationStatus, Track,
    TrackField, Trainer, TrainerField, Training, TrainingRegistration, TrainingRequest, TrainingStatus, User,
};
pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: EntityId },
    #[error("Conflict with existing data: {0}")]
    Conflict(String),
    #[error("Unknown error from the DB server")]
    UnknownDbError(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(value: sqlx::Error) -> Self {
        RepoError::UnknownDbError(value.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for RepoError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        RepoError::UnknownDbError(value.to_string())
    }
}

/// Storage of the academy.
///
/// # Description
///
/// Every call is fallible. Lookups of a single record by ID fail with [RepoError::NotFound] when the record
/// doesn't exist, while lookups by chat ID return an `Option`.
pub trait Repository: Send + Sync {
    fn is_admin(&self, chat_id: i64) -> impl Future<Output = Result<bool, RepoError>> + Send;

    fn add_admin(&self, admin: Admin) -> impl Future<Output = Result<(), RepoError>> + Send;

    fn create_trainer(
        &self,
        trainer: NewTrainer,
    ) -> impl Future<Output = Result<Trainer, RepoError>> + Send;

    fn trainer(&self, id: EntityId) -> impl Future<Output = Result<Trainer, RepoError>> + Send;

    /// All the trainers, sorted by name.
    fn trainers(&self) -> impl Future<Output = Result<Vec<Trainer>, RepoError>> + Send;

    fn update_trainer(
        &self,
        id: EntityId,
        field: TrainerField,
    ) -> impl Future<Output = Result<Trainer, RepoError>> + Send;

    /// Remove a trainer along with its trainings.
    fn delete_trainer(&self, id: EntityId) -> impl Future<Output = Result<(), RepoError>> + Send;

    fn create_track(&self, track: NewTrack) -> impl Future<Output = Result<Track, RepoError>> + Send;

    fn track(&self, id: EntityId) -> impl Future<Output = Result<Track, RepoError>> + Send;

    /// All the tracks, sorted by name.
    fn tracks(&self) -> impl Future<Output = Result<Vec<Track>, RepoError>> + Send;

    fn update_track(
        &self,
        id: EntityId,
        field: TrackField,
    ) -> impl Future<Output = Result<Track, RepoError>> + Send;

    /// Remove a track along with its trainings.
    fn delete_track(&self, id: EntityId) -> impl Future<Output = Result<(), RepoError>> + Send;

    fn create_training(
        &self,
        training: NewTraining,
    ) -> impl Future<Output = Result<Training, RepoError>> + Send;

    fn training(&self, id: EntityId) -> impl Future<Output = Result<Training, RepoError>> + Send;

    /// Scheduled trainings that start after `after`, sorted by start time.
    fn upcoming_trainings(
        &self,
        after: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Training>, RepoError>> + Send;

    /// Scheduled trainings of a trainer in a track that start after `after`, sorted by start time.
    fn trainings_for(
        &self,
        track_id: EntityId,
        trainer_id: EntityId,
        after: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Training>, RepoError>> + Send;

    fn reschedule_training(
        &self,
        id: EntityId,
        starts_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Training, RepoError>> + Send;

    /// Mark a training as cancelled, and cancel all its registrations.
    fn cancel_training(&self, id: EntityId) -> impl Future<Output = Result<(), RepoError>> + Send;

    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<User, RepoError>> + Send;

    fn user_by_chat(&self, chat_id: i64) -> impl Future<Output = Result<Option<User>, RepoError>> + Send;

    /// Register a member to a scheduled training.
    ///
    /// # Description
    ///
    /// Fails with [RepoError::Conflict] when the member already holds an active registration for the training,
    /// or when the training was cancelled.
    fn register(
        &self,
        training_id: EntityId,
        user_id: EntityId,
    ) -> impl Future<Output = Result<TrainingRegistration, RepoError>> + Send;

    /// Active registrations of a member.
    fn registrations_of(
        &self,
        user_id: EntityId,
    ) -> impl Future<Output = Result<Vec<TrainingRegistration>, RepoError>> + Send;

    /// Cancel an active registration owned by `user_id`. Fails with [RepoError::NotFound] otherwise.
    fn cancel_registration(
        &self,
        id: EntityId,
        user_id: EntityId,
    ) -> impl Future<Output = Result<(), RepoError>> + Send;

    fn create_request(
        &self,
        request: NewTrainingRequest,
    ) -> impl Future<Output = Result<TrainingRequest, RepoError>> + Send;
}
