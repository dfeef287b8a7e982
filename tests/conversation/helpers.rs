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

//! Test doubles and fixtures shared by the conversation tests.

use academybot::{State, handlers::Dispatcher};
use bot_core::{Conversation, InboundUpdate, Messenger, TransportError};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use repository::{
    Admin, EntityId, InMemoryRepository, NewTrack, NewTrainer, NewTraining, NewUser, Repository,
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};
use teloxide::types::{ChatId, InlineKeyboardButtonKind, InlineKeyboardMarkup, MessageId};
use tracing::Level;
use tracing_subscriber::{Layer, filter::LevelFilter, filter::Targets, fmt, prelude::*};

pub const ADMIN_CHAT: i64 = 1000;
pub const MEMBER_CHAT: i64 = 2000;
pub const STRANGER_CHAT: i64 = 3000;
pub const TRAINER_CHAT: i64 = 123456;

static TRACING: Lazy<()> = Lazy::new(|| {
    if let Ok(level) = std::env::var("TEST_LOG") {
        let (tracing_level, tracing_levelfilter) = match level.as_str() {
            "info" => (Level::INFO, LevelFilter::INFO),
            "debug" => (Level::DEBUG, LevelFilter::DEBUG),
            "warn" => (Level::WARN, LevelFilter::WARN),
            "error" => (Level::ERROR, LevelFilter::ERROR),
            &_ => (Level::TRACE, LevelFilter::TRACE),
        };

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_filter(tracing_levelfilter),
            )
            .with(
                Targets::new()
                    .with_target("academybot", tracing_level)
                    .with_target("bot_core", tracing_level),
            )
            .init();
    }
});

/// A message as seen by the chat API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub chat_id: ChatId,
    pub text: String,
    pub edited: bool,
    pub payloads: Vec<String>,
}

/// [Messenger] that records everything instead of talking to Telegram.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Outgoing>>,
    acks: Mutex<Vec<String>>,
}

fn payloads(keyboard: &Option<InlineKeyboardMarkup>) -> Vec<String> {
    keyboard
        .iter()
        .flat_map(|k| k.inline_keyboard.iter().flatten())
        .filter_map(|b| match &b.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}

impl RecordingMessenger {
    fn record(&self, chat_id: ChatId, text: &str, keyboard: &Option<InlineKeyboardMarkup>, edited: bool) {
        self.sent.lock().expect("Poisoned lock").push(Outgoing {
            chat_id,
            text: text.to_owned(),
            edited,
            payloads: payloads(keyboard),
        });
    }

    pub fn sent(&self) -> Vec<Outgoing> {
        self.sent.lock().expect("Poisoned lock").clone()
    }

    pub fn last(&self) -> Outgoing {
        self.sent().last().cloned().expect("Nothing was sent")
    }

    pub fn acks(&self) -> Vec<String> {
        self.acks.lock().expect("Poisoned lock").clone()
    }
}

impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        self.record(chat_id, text, &keyboard, false);
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        _message_id: MessageId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        self.record(chat_id, text, &keyboard, true);
        Ok(())
    }

    async fn acknowledge(&self, query_id: &str) -> Result<(), TransportError> {
        self.acks.lock().expect("Poisoned lock").push(query_id.to_owned());
        Ok(())
    }
}

/// A dispatcher wired to in-memory doubles. The chat [ADMIN_CHAT] has admin rights.
pub struct Harness {
    pub repo: Arc<InMemoryRepository>,
    pub messenger: Arc<RecordingMessenger>,
    pub dispatcher: Dispatcher<InMemoryRepository, RecordingMessenger>,
    next_update: AtomicU32,
}

impl Harness {
    pub async fn new() -> Self {
        Lazy::force(&TRACING);

        let repo = Arc::new(InMemoryRepository::new());
        repo.add_admin(Admin { chat_id: ADMIN_CHAT })
            .await
            .expect("Failed to seed the admin");
        let messenger = Arc::new(RecordingMessenger::default());
        let dispatcher = Dispatcher::new(repo.clone(), messenger.clone(), "academy_bot");

        Harness {
            repo,
            messenger,
            dispatcher,
            next_update: AtomicU32::new(1),
        }
    }

    fn update_id(&self) -> u32 {
        self.next_update.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn text(&self, chat: i64, state: State, text: &str) -> State {
        let update = InboundUpdate::text(self.update_id(), ChatId(chat), MessageId(1), text);
        self.dispatcher.transition(state, &update).await
    }

    pub async fn press(&self, chat: i64, state: State, data: &str) -> State {
        let id = self.update_id();
        let update = InboundUpdate::callback(id, ChatId(chat), Some(MessageId(1)), &format!("q{id}"), data);
        self.dispatcher.transition(state, &update).await
    }
}

/// Records of a small academy: one trainer, one track, one upcoming training and one member.
pub struct Academy {
    pub trainer_id: EntityId,
    pub track_id: EntityId,
    pub training_id: EntityId,
    pub member_id: EntityId,
}

pub async fn seed_academy(repo: &InMemoryRepository) -> Academy {
    let trainer = repo
        .create_trainer(NewTrainer {
            name: "Ivan Petrov".to_owned(),
            tg_id: "@ivan".to_owned(),
            chat_id: TRAINER_CHAT,
            info: "Coach, 5 years".to_owned(),
        })
        .await
        .expect("Failed to create the trainer");
    let track = repo
        .create_track(NewTrack {
            name: "North track".to_owned(),
            info: "400 m, tartan".to_owned(),
        })
        .await
        .expect("Failed to create the track");
    let training = repo
        .create_training(NewTraining {
            trainer_id: trainer.id,
            track_id: track.id,
            starts_at: Utc::now() + Duration::days(3),
        })
        .await
        .expect("Failed to create the training");
    let member = repo
        .create_user(NewUser {
            chat_id: MEMBER_CHAT,
            name: "Ana Gómez".to_owned(),
            phone: "+34600000000".to_owned(),
        })
        .await
        .expect("Failed to create the member");

    Academy {
        trainer_id: trainer.id,
        track_id: track.id,
        training_id: training.id,
        member_id: member.id,
    }
}
