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

//! Volatile backend.
//!
//! # Description
//!
//! All the tables live behind a single [Mutex]. Records are kept in [BTreeMap]s keyed by ID, so listings come
//! out in insertion order before being sorted.

use crate::{
    Admin, EntityId, NewTrack, NewTrainer, NewTraining, NewTrainingRequest, NewUser, RegistrationStatus,
    RepoError, Repository, Track, TrackField, Trainer, TrainerField, Training, TrainingRegistration,
    TrainingRequest, TrainingStatus, User,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    next_id: EntityId,
    admins: HashSet<i64>,
    trainers: BTreeMap<EntityId, Trainer>,
    tracks: BTreeMap<EntityId, Track>,
    trainings: BTreeMap<EntityId, Training>,
    users: BTreeMap<EntityId, User>,
    registrations: BTreeMap<EntityId, TrainingRegistration>,
    requests: BTreeMap<EntityId, TrainingRequest>,
    /// Error returned by the next call, if any.
    failure: Option<RepoError>,
}

impl Tables {
    fn next_id(&mut self) -> EntityId {
        self.next_id += 1;
        self.next_id
    }

    fn check(&mut self) -> Result<(), RepoError> {
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn remove_trainings(&mut self, doomed: impl Fn(&Training) -> bool) {
        let ids: HashSet<EntityId> = self
            .trainings
            .values()
            .filter(|t| doomed(t))
            .map(|t| t.id)
            .collect();
        self.trainings.retain(|id, _| !ids.contains(id));
        self.registrations.retain(|_, r| !ids.contains(&r.training_id));
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to the repository fail with `error`.
    pub async fn inject_failure(&self, error: RepoError) {
        self.tables.lock().await.failure = Some(error);
    }

    /// Registered training requests, oldest first.
    pub async fn requests(&self) -> Vec<TrainingRequest> {
        self.tables.lock().await.requests.values().cloned().collect()
    }
}

fn not_found(entity: &'static str, id: EntityId) -> RepoError {
    RepoError::NotFound { entity, id }
}

impl Repository for InMemoryRepository {
    async fn is_admin(&self, chat_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        Ok(tables.admins.contains(&chat_id))
    }

    async fn add_admin(&self, admin: Admin) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        tables.admins.insert(admin.chat_id);
        Ok(())
    }

    async fn create_trainer(&self, trainer: NewTrainer) -> Result<Trainer, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let trainer = Trainer {
            id: tables.next_id(),
            name: trainer.name,
            tg_id: trainer.tg_id,
            chat_id: trainer.chat_id,
            info: trainer.info,
        };
        debug!("Trainer {} created", trainer.id);
        tables.trainers.insert(trainer.id, trainer.clone());
        Ok(trainer)
    }

    async fn trainer(&self, id: EntityId) -> Result<Trainer, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        tables.trainers.get(&id).cloned().ok_or(not_found("Trainer", id))
    }

    async fn trainers(&self) -> Result<Vec<Trainer>, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let mut trainers: Vec<Trainer> = tables.trainers.values().cloned().collect();
        trainers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(trainers)
    }

    async fn update_trainer(&self, id: EntityId, field: TrainerField) -> Result<Trainer, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let trainer = tables.trainers.get_mut(&id).ok_or(not_found("Trainer", id))?;
        match field {
            TrainerField::Name(name) => trainer.name = name,
            TrainerField::TgId(tg_id) => trainer.tg_id = tg_id,
            TrainerField::ChatId(chat_id) => trainer.chat_id = chat_id,
            TrainerField::Info(info) => trainer.info = info,
        }
        Ok(trainer.clone())
    }

    async fn delete_trainer(&self, id: EntityId) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        tables.trainers.remove(&id).ok_or(not_found("Trainer", id))?;
        tables.remove_trainings(|t| t.trainer_id == id);
        Ok(())
    }

    async fn create_track(&self, track: NewTrack) -> Result<Track, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let track = Track {
            id: tables.next_id(),
            name: track.name,
            info: track.info,
        };
        tables.tracks.insert(track.id, track.clone());
        Ok(track)
    }

    async fn track(&self, id: EntityId) -> Result<Track, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        tables.tracks.get(&id).cloned().ok_or(not_found("Track", id))
    }

    async fn tracks(&self) -> Result<Vec<Track>, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let mut tracks: Vec<Track> = tables.tracks.values().cloned().collect();
        tracks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tracks)
    }

    async fn update_track(&self, id: EntityId, field: TrackField) -> Result<Track, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let track = tables.tracks.get_mut(&id).ok_or(not_found("Track", id))?;
        match field {
            TrackField::Name(name) => track.name = name,
            TrackField::Info(info) => track.info = info,
        }
        Ok(track.clone())
    }

    async fn delete_track(&self, id: EntityId) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        tables.tracks.remove(&id).ok_or(not_found("Track", id))?;
        tables.remove_trainings(|t| t.track_id == id);
        Ok(())
    }

    async fn create_training(&self, training: NewTraining) -> Result<Training, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        if !tables.trainers.contains_key(&training.trainer_id) {
            return Err(not_found("Trainer", training.trainer_id));
        }
        if !tables.tracks.contains_key(&training.track_id) {
            return Err(not_found("Track", training.track_id));
        }
        let training = Training {
            id: tables.next_id(),
            trainer_id: training.trainer_id,
            track_id: training.track_id,
            starts_at: training.starts_at,
            status: TrainingStatus::Scheduled,
        };
        tables.trainings.insert(training.id, training.clone());
        Ok(training)
    }

    async fn training(&self, id: EntityId) -> Result<Training, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        tables.trainings.get(&id).cloned().ok_or(not_found("Training", id))
    }

    async fn upcoming_trainings(&self, after: DateTime<Utc>) -> Result<Vec<Training>, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let mut trainings: Vec<Training> = tables
            .trainings
            .values()
            .filter(|t| t.status == TrainingStatus::Scheduled && t.starts_at > after)
            .cloned()
            .collect();
        trainings.sort_by_key(|t| t.starts_at);
        Ok(trainings)
    }

    async fn trainings_for(
        &self,
        track_id: EntityId,
        trainer_id: EntityId,
        after: DateTime<Utc>,
    ) -> Result<Vec<Training>, RepoError> {
        let mut trainings = self.upcoming_trainings(after).await?;
        trainings.retain(|t| t.track_id == track_id && t.trainer_id == trainer_id);
        Ok(trainings)
    }

    async fn reschedule_training(
        &self,
        id: EntityId,
        starts_at: DateTime<Utc>,
    ) -> Result<Training, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let training = tables.trainings.get_mut(&id).ok_or(not_found("Training", id))?;
        training.starts_at = starts_at;
        Ok(training.clone())
    }

    async fn cancel_training(&self, id: EntityId) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let training = tables.trainings.get_mut(&id).ok_or(not_found("Training", id))?;
        training.status = TrainingStatus::Cancelled;
        tables
            .registrations
            .values_mut()
            .filter(|r| r.training_id == id)
            .for_each(|r| r.status = RegistrationStatus::Cancelled);
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        if tables.users.values().any(|u| u.chat_id == user.chat_id) {
            return Err(RepoError::Conflict(format!(
                "chat {} is already registered",
                user.chat_id
            )));
        }
        let user = User {
            id: tables.next_id(),
            chat_id: user.chat_id,
            name: user.name,
            phone: user.phone,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_chat(&self, chat_id: i64) -> Result<Option<User>, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        Ok(tables.users.values().find(|u| u.chat_id == chat_id).cloned())
    }

    async fn register(
        &self,
        training_id: EntityId,
        user_id: EntityId,
    ) -> Result<TrainingRegistration, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let training = tables
            .trainings
            .get(&training_id)
            .ok_or(not_found("Training", training_id))?;
        if training.status == TrainingStatus::Cancelled {
            return Err(RepoError::Conflict(format!("training {training_id} was cancelled")));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(not_found("User", user_id));
        }
        if tables.registrations.values().any(|r| {
            r.training_id == training_id && r.user_id == user_id && r.status == RegistrationStatus::Active
        }) {
            return Err(RepoError::Conflict(format!(
                "user {user_id} is already registered to training {training_id}"
            )));
        }
        let registration = TrainingRegistration {
            id: tables.next_id(),
            training_id,
            user_id,
            status: RegistrationStatus::Active,
            created_at: Utc::now(),
        };
        tables.registrations.insert(registration.id, registration.clone());
        Ok(registration)
    }

    async fn registrations_of(&self, user_id: EntityId) -> Result<Vec<TrainingRegistration>, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        Ok(tables
            .registrations
            .values()
            .filter(|r| r.user_id == user_id && r.status == RegistrationStatus::Active)
            .cloned()
            .collect())
    }

    async fn cancel_registration(&self, id: EntityId, user_id: EntityId) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        match tables.registrations.get_mut(&id) {
            Some(registration)
                if registration.user_id == user_id && registration.status == RegistrationStatus::Active =>
            {
                registration.status = RegistrationStatus::Cancelled;
                Ok(())
            }
            _ => Err(not_found("Registration", id)),
        }
    }

    async fn create_request(&self, request: NewTrainingRequest) -> Result<TrainingRequest, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.check()?;
        let request = TrainingRequest {
            id: tables.next_id(),
            user_id: request.user_id,
            trainer_id: request.trainer_id,
            track_id: request.track_id,
            preferred_time: request.preferred_time,
            created_at: Utc::now(),
        };
        tables.requests.insert(request.id, request.clone());
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    struct Seeded {
        repo: InMemoryRepository,
        trainer: Trainer,
        track: Track,
        user: User,
    }

    #[fixture]
    async fn seeded() -> Seeded {
        let repo = InMemoryRepository::new();
        let trainer = repo
            .create_trainer(NewTrainer {
                name: "Ivan Petrov".to_owned(),
                tg_id: "@ivan".to_owned(),
                chat_id: 123456,
                info: "Coach, 5 years".to_owned(),
            })
            .await
            .expect("Failed to create trainer");
        let track = repo
            .create_track(NewTrack {
                name: "Sprint".to_owned(),
                info: "100 and 200 metres".to_owned(),
            })
            .await
            .expect("Failed to create track");
        let user = repo
            .create_user(NewUser {
                chat_id: 42,
                name: "Ana".to_owned(),
                phone: "+34600000000".to_owned(),
            })
            .await
            .expect("Failed to create user");

        Seeded {
            repo,
            trainer,
            track,
            user,
        }
    }

    async fn schedule(seeded: &Seeded, in_hours: i64) -> Training {
        seeded
            .repo
            .create_training(NewTraining {
                trainer_id: seeded.trainer.id,
                track_id: seeded.track.id,
                starts_at: Utc::now() + TimeDelta::hours(in_hours),
            })
            .await
            .expect("Failed to create training")
    }

    #[rstest]
    #[tokio::test]
    async fn trainer_updates_touch_one_field(#[future] seeded: Seeded) {
        let seeded = seeded.await;
        let updated = seeded
            .repo
            .update_trainer(seeded.trainer.id, TrainerField::TgId("@ivan_p".to_owned()))
            .await
            .expect("Failed to update trainer");

        assert_eq!(
            updated,
            Trainer {
                tg_id: "@ivan_p".to_owned(),
                ..seeded.trainer.clone()
            }
        );
        assert_eq!(seeded.repo.trainer(seeded.trainer.id).await, Ok(updated));
    }

    #[rstest]
    #[tokio::test]
    async fn missing_records_are_not_found(#[future] seeded: Seeded) {
        let seeded = seeded.await;
        assert_eq!(
            seeded.repo.track(999).await,
            Err(RepoError::NotFound {
                entity: "Track",
                id: 999
            })
        );
        assert!(seeded.repo.user_by_chat(7).await.expect("Query failed").is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn upcoming_trainings_are_sorted_and_skip_the_past(#[future] seeded: Seeded) {
        let seeded = seeded.await;
        let late = schedule(&seeded, 48).await;
        let soon = schedule(&seeded, 2).await;
        schedule(&seeded, -2).await;
        let cancelled = schedule(&seeded, 5).await;
        seeded
            .repo
            .cancel_training(cancelled.id)
            .await
            .expect("Failed to cancel training");

        let upcoming = seeded
            .repo
            .trainings_for(seeded.track.id, seeded.trainer.id, Utc::now())
            .await
            .expect("Query failed");
        assert_eq!(upcoming, vec![soon, late]);
    }

    #[rstest]
    #[tokio::test]
    async fn double_registration_is_a_conflict(#[future] seeded: Seeded) {
        let seeded = seeded.await;
        let training = schedule(&seeded, 24).await;

        let registration = seeded
            .repo
            .register(training.id, seeded.user.id)
            .await
            .expect("Failed to register");
        assert!(matches!(
            seeded.repo.register(training.id, seeded.user.id).await,
            Err(RepoError::Conflict(_))
        ));

        // Once cancelled, the member can register again.
        seeded
            .repo
            .cancel_registration(registration.id, seeded.user.id)
            .await
            .expect("Failed to cancel registration");
        assert!(seeded.repo.register(training.id, seeded.user.id).await.is_ok());
    }

    #[rstest]
    #[tokio::test]
    async fn registrations_belong_to_their_owner(#[future] seeded: Seeded) {
        let seeded = seeded.await;
        let training = schedule(&seeded, 24).await;
        let registration = seeded
            .repo
            .register(training.id, seeded.user.id)
            .await
            .expect("Failed to register");

        assert!(matches!(
            seeded.repo.cancel_registration(registration.id, seeded.user.id + 100).await,
            Err(RepoError::NotFound { .. })
        ));
        assert_eq!(
            seeded.repo.registrations_of(seeded.user.id).await,
            Ok(vec![registration])
        );
    }

    #[rstest]
    #[tokio::test]
    async fn deleting_a_trainer_drops_its_trainings(#[future] seeded: Seeded) {
        let seeded = seeded.await;
        let training = schedule(&seeded, 24).await;
        seeded
            .repo
            .register(training.id, seeded.user.id)
            .await
            .expect("Failed to register");

        seeded
            .repo
            .delete_trainer(seeded.trainer.id)
            .await
            .expect("Failed to delete trainer");

        assert!(seeded.repo.training(training.id).await.is_err());
        assert_eq!(seeded.repo.registrations_of(seeded.user.id).await, Ok(vec![]));
    }

    #[tokio::test]
    async fn injected_failures_hit_the_next_call_only() {
        let repo = InMemoryRepository::new();
        repo.inject_failure(RepoError::UnknownDbError("connection lost".to_owned()))
            .await;

        assert!(repo.is_admin(1).await.is_err());
        assert_eq!(repo.is_admin(1).await, Ok(false));
    }
}
