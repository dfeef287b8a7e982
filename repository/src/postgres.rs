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

//! PostgreSQL backend.

use crate::{
    Admin, EntityId, NewTrack, NewTrainer, NewTraining, NewTrainingRequest, NewUser, RegistrationStatus,
    RepoError, Repository, Track, TrackField, Trainer, TrainerField, Training, TrainingRegistration,
    TrainingRequest, TrainingStatus, User,
};
use chrono::{DateTime, Utc};
use configuration::DatabaseSettings;
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};

/// Time to wait for a free connection of the pool.
const DEFAULT_ACQUIRE_TIMEOUT: u64 = 5;

pub struct PgRepository {
    db_conn: PgPool,
}

#[derive(FromRow)]
struct TrainingRow {
    id: i64,
    trainer_id: i64,
    track_id: i64,
    starts_at: DateTime<Utc>,
    status: String,
}

#[derive(FromRow)]
struct RegistrationRow {
    id: i64,
    training_id: i64,
    user_id: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TrainingRow> for Training {
    type Error = RepoError;

    fn try_from(row: TrainingRow) -> Result<Self, Self::Error> {
        Ok(Training {
            id: row.id,
            trainer_id: row.trainer_id,
            track_id: row.track_id,
            starts_at: row.starts_at,
            status: TrainingStatus::from_str(&row.status)
                .map_err(|e| RepoError::UnknownDbError(format!("{e}: {}", row.status)))?,
        })
    }
}

impl TryFrom<RegistrationRow> for TrainingRegistration {
    type Error = RepoError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        Ok(TrainingRegistration {
            id: row.id,
            training_id: row.training_id,
            user_id: row.user_id,
            status: RegistrationStatus::from_str(&row.status)
                .map_err(|e| RepoError::UnknownDbError(format!("{e}: {}", row.status)))?,
            created_at: row.created_at,
        })
    }
}

fn trainings(rows: Vec<TrainingRow>) -> Result<Vec<Training>, RepoError> {
    rows.into_iter().map(Training::try_from).collect()
}

/// Translate unique constraint violations into [RepoError::Conflict].
fn conflict(error: sqlx::Error, what: String) -> RepoError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict(what),
        _ => error.into(),
    }
}

fn affected(rows: u64, entity: &'static str, id: EntityId) -> Result<(), RepoError> {
    if rows == 0 {
        Err(RepoError::NotFound { entity, id })
    } else {
        Ok(())
    }
}

impl PgRepository {
    pub fn new(db_conn: PgPool) -> Self {
        PgRepository { db_conn }
    }

    /// Connect to the DB server and run the pending migrations.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, RepoError> {
        let db_conn = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT))
            .connect_with(settings.connect_options())
            .await?;
        info!("Connected to the DB server at {}:{}", settings.host, settings.port);

        sqlx::migrate!("./migrations").run(&db_conn).await?;
        debug!("DB migrations applied");

        Ok(PgRepository::new(db_conn))
    }
}

impl Repository for PgRepository {
    async fn is_admin(&self, chat_id: i64) -> Result<bool, RepoError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT chat_id FROM admins WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&self.db_conn)
            .await?;

        Ok(row.is_some())
    }

    async fn add_admin(&self, admin: Admin) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO admins (chat_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(admin.chat_id)
            .execute(&self.db_conn)
            .await?;

        Ok(())
    }

    async fn create_trainer(&self, trainer: NewTrainer) -> Result<Trainer, RepoError> {
        let trainer = sqlx::query_as::<_, Trainer>(
            "INSERT INTO trainers (name, tg_id, chat_id, info) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(trainer.name)
        .bind(trainer.tg_id)
        .bind(trainer.chat_id)
        .bind(trainer.info)
        .fetch_one(&self.db_conn)
        .await?;

        Ok(trainer)
    }

    async fn trainer(&self, id: EntityId) -> Result<Trainer, RepoError> {
        sqlx::query_as::<_, Trainer>("SELECT * FROM trainers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_conn)
            .await?
            .ok_or(RepoError::NotFound {
                entity: "Trainer",
                id,
            })
    }

    async fn trainers(&self) -> Result<Vec<Trainer>, RepoError> {
        Ok(sqlx::query_as::<_, Trainer>("SELECT * FROM trainers ORDER BY name")
            .fetch_all(&self.db_conn)
            .await?)
    }

    async fn update_trainer(&self, id: EntityId, field: TrainerField) -> Result<Trainer, RepoError> {
        let query = match field {
            TrainerField::Name(name) => {
                sqlx::query_as::<_, Trainer>("UPDATE trainers SET name = $1 WHERE id = $2 RETURNING *").bind(name)
            }
            TrainerField::TgId(tg_id) => {
                sqlx::query_as::<_, Trainer>("UPDATE trainers SET tg_id = $1 WHERE id = $2 RETURNING *").bind(tg_id)
            }
            TrainerField::ChatId(chat_id) => {
                sqlx::query_as::<_, Trainer>("UPDATE trainers SET chat_id = $1 WHERE id = $2 RETURNING *")
                    .bind(chat_id)
            }
            TrainerField::Info(info) => {
                sqlx::query_as::<_, Trainer>("UPDATE trainers SET info = $1 WHERE id = $2 RETURNING *").bind(info)
            }
        };

        query
            .bind(id)
            .fetch_optional(&self.db_conn)
            .await?
            .ok_or(RepoError::NotFound {
                entity: "Trainer",
                id,
            })
    }

    async fn delete_trainer(&self, id: EntityId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM trainers WHERE id = $1")
            .bind(id)
            .execute(&self.db_conn)
            .await?;

        affected(result.rows_affected(), "Trainer", id)
    }

    async fn create_track(&self, track: NewTrack) -> Result<Track, RepoError> {
        Ok(
            sqlx::query_as::<_, Track>("INSERT INTO tracks (name, info) VALUES ($1, $2) RETURNING *")
                .bind(track.name)
                .bind(track.info)
                .fetch_one(&self.db_conn)
                .await?,
        )
    }

    async fn track(&self, id: EntityId) -> Result<Track, RepoError> {
        sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_conn)
            .await?
            .ok_or(RepoError::NotFound { entity: "Track", id })
    }

    async fn tracks(&self) -> Result<Vec<Track>, RepoError> {
        Ok(sqlx::query_as::<_, Track>("SELECT * FROM tracks ORDER BY name")
            .fetch_all(&self.db_conn)
            .await?)
    }

    async fn update_track(&self, id: EntityId, field: TrackField) -> Result<Track, RepoError> {
        let query = match field {
            TrackField::Name(name) => {
                sqlx::query_as::<_, Track>("UPDATE tracks SET name = $1 WHERE id = $2 RETURNING *").bind(name)
            }
            TrackField::Info(info) => {
                sqlx::query_as::<_, Track>("UPDATE tracks SET info = $1 WHERE id = $2 RETURNING *").bind(info)
            }
        };

        query
            .bind(id)
            .fetch_optional(&self.db_conn)
            .await?
            .ok_or(RepoError::NotFound { entity: "Track", id })
    }

    async fn delete_track(&self, id: EntityId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM tracks WHERE id = $1")
            .bind(id)
            .execute(&self.db_conn)
            .await?;

        affected(result.rows_affected(), "Track", id)
    }

    async fn create_training(&self, training: NewTraining) -> Result<Training, RepoError> {
        sqlx::query_as::<_, TrainingRow>(
            "INSERT INTO trainings (trainer_id, track_id, starts_at, status) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(training.trainer_id)
        .bind(training.track_id)
        .bind(training.starts_at)
        .bind(TrainingStatus::Scheduled.to_string())
        .fetch_one(&self.db_conn)
        .await?
        .try_into()
    }

    async fn training(&self, id: EntityId) -> Result<Training, RepoError> {
        sqlx::query_as::<_, TrainingRow>("SELECT * FROM trainings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_conn)
            .await?
            .ok_or(RepoError::NotFound {
                entity: "Training",
                id,
            })?
            .try_into()
    }

    async fn upcoming_trainings(&self, after: DateTime<Utc>) -> Result<Vec<Training>, RepoError> {
        let rows = sqlx::query_as::<_, TrainingRow>(
            "SELECT * FROM trainings WHERE status = $1 AND starts_at > $2 ORDER BY starts_at",
        )
        .bind(TrainingStatus::Scheduled.to_string())
        .bind(after)
        .fetch_all(&self.db_conn)
        .await?;

        trainings(rows)
    }

    async fn trainings_for(
        &self,
        track_id: EntityId,
        trainer_id: EntityId,
        after: DateTime<Utc>,
    ) -> Result<Vec<Training>, RepoError> {
        let rows = sqlx::query_as::<_, TrainingRow>(
            r#"SELECT * FROM trainings
            WHERE status = $1 AND starts_at > $2 AND track_id = $3 AND trainer_id = $4
            ORDER BY starts_at"#,
        )
        .bind(TrainingStatus::Scheduled.to_string())
        .bind(after)
        .bind(track_id)
        .bind(trainer_id)
        .fetch_all(&self.db_conn)
        .await?;

        trainings(rows)
    }

    async fn reschedule_training(
        &self,
        id: EntityId,
        starts_at: DateTime<Utc>,
    ) -> Result<Training, RepoError> {
        sqlx::query_as::<_, TrainingRow>("UPDATE trainings SET starts_at = $1 WHERE id = $2 RETURNING *")
            .bind(starts_at)
            .bind(id)
            .fetch_optional(&self.db_conn)
            .await?
            .ok_or(RepoError::NotFound {
                entity: "Training",
                id,
            })?
            .try_into()
    }

    async fn cancel_training(&self, id: EntityId) -> Result<(), RepoError> {
        let mut tx = self.db_conn.begin().await?;

        let result = sqlx::query("UPDATE trainings SET status = $1 WHERE id = $2")
            .bind(TrainingStatus::Cancelled.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        affected(result.rows_affected(), "Training", id)?;

        sqlx::query("UPDATE training_registrations SET status = $1 WHERE training_id = $2")
            .bind(RegistrationStatus::Cancelled.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let chat_id = user.chat_id;

        sqlx::query_as::<_, User>("INSERT INTO users (chat_id, name, phone) VALUES ($1, $2, $3) RETURNING *")
            .bind(user.chat_id)
            .bind(user.name)
            .bind(user.phone)
            .fetch_one(&self.db_conn)
            .await
            .map_err(|e| conflict(e, format!("chat {chat_id} is already registered")))
    }

    async fn user_by_chat(&self, chat_id: i64) -> Result<Option<User>, RepoError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&self.db_conn)
            .await?)
    }

    async fn register(
        &self,
        training_id: EntityId,
        user_id: EntityId,
    ) -> Result<TrainingRegistration, RepoError> {
        let training = self.training(training_id).await?;
        if training.status == TrainingStatus::Cancelled {
            return Err(RepoError::Conflict(format!("training {training_id} was cancelled")));
        }

        sqlx::query_as::<_, RegistrationRow>(
            "INSERT INTO training_registrations (training_id, user_id, status) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(training_id)
        .bind(user_id)
        .bind(RegistrationStatus::Active.to_string())
        .fetch_one(&self.db_conn)
        .await
        .map_err(|e| {
            conflict(
                e,
                format!("user {user_id} is already registered to training {training_id}"),
            )
        })?
        .try_into()
    }

    async fn registrations_of(&self, user_id: EntityId) -> Result<Vec<TrainingRegistration>, RepoError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            "SELECT * FROM training_registrations WHERE user_id = $1 AND status = $2 ORDER BY created_at",
        )
        .bind(user_id)
        .bind(RegistrationStatus::Active.to_string())
        .fetch_all(&self.db_conn)
        .await?;

        rows.into_iter().map(TrainingRegistration::try_from).collect()
    }

    async fn cancel_registration(&self, id: EntityId, user_id: EntityId) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE training_registrations SET status = $1 WHERE id = $2 AND user_id = $3 AND status = $4",
        )
        .bind(RegistrationStatus::Cancelled.to_string())
        .bind(id)
        .bind(user_id)
        .bind(RegistrationStatus::Active.to_string())
        .execute(&self.db_conn)
        .await?;

        affected(result.rows_affected(), "Registration", id)
    }

    async fn create_request(&self, request: NewTrainingRequest) -> Result<TrainingRequest, RepoError> {
        Ok(sqlx::query_as::<_, TrainingRequest>(
            r#"INSERT INTO training_requests (user_id, trainer_id, track_id, preferred_time)
            VALUES ($1, $2, $3, $4) RETURNING *"#,
        )
        .bind(request.user_id)
        .bind(request.trainer_id)
        .bind(request.track_id)
        .bind(request.preferred_time)
        .fetch_one(&self.db_conn)
        .await?)
    }
}
