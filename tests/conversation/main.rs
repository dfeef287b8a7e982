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

//! Conversations driven through the dispatcher, with in-memory doubles for the repository and the chat API.

mod helpers;

use academybot::{State, texts};
use bot_core::{Engine, InboundUpdate, LimiterSettings, Metrics, RateLimiter, StateStore};
use helpers::{ADMIN_CHAT, Harness, MEMBER_CHAT, STRANGER_CHAT, TRAINER_CHAT, seed_academy};
use pretty_assertions::assert_eq;
use repository::{NewTrack, NewTrainer, NewTraining, RepoError, Repository};
use rstest::rstest;
use std::{sync::Arc, time::Duration};
use teloxide::types::{ChatId, MessageId};

#[tokio::test]
async fn trainer_wizard_creates_one_trainer() {
    let h = Harness::new().await;

    let state = h.press(ADMIN_CHAT, State::AdminMenu, "trainers").await;
    assert_eq!(state, State::TrainerMenu);

    let state = h.press(ADMIN_CHAT, state, "createTrainer").await;
    assert_eq!(state, State::TrainerEnterName);

    let state = h.text(ADMIN_CHAT, state, "Ivan Petrov").await;
    assert_eq!(
        state,
        State::TrainerEnterTgId {
            name: "Ivan Petrov".to_owned()
        }
    );

    let state = h.text(ADMIN_CHAT, state, "@ivan").await;
    assert_eq!(
        state,
        State::TrainerEnterChatId {
            name: "Ivan Petrov".to_owned(),
            tg_id: "@ivan".to_owned(),
        }
    );

    let state = h.text(ADMIN_CHAT, state, "123456").await;
    assert_eq!(
        state,
        State::TrainerEnterInfo {
            name: "Ivan Petrov".to_owned(),
            tg_id: "@ivan".to_owned(),
            chat_id: 123456,
        }
    );

    let state = h.text(ADMIN_CHAT, state, "Coach, 5 years").await;
    let expected = NewTrainer {
        name: "Ivan Petrov".to_owned(),
        tg_id: "@ivan".to_owned(),
        chat_id: 123456,
        info: "Coach, 5 years".to_owned(),
    };
    assert_eq!(state, State::TrainerConfirm(expected.clone()));
    assert_eq!(h.messenger.last().payloads, vec!["confirm", "cancel"]);

    let state = h.press(ADMIN_CHAT, state, "confirm").await;
    assert_eq!(state, State::AdminMenu);

    let trainers = h.repo.trainers().await.expect("Failed to list the trainers");
    assert_eq!(trainers.len(), 1);
    assert_eq!(trainers[0].name, expected.name);
    assert_eq!(trainers[0].tg_id, expected.tg_id);
    assert_eq!(trainers[0].chat_id, expected.chat_id);
    assert_eq!(trainers[0].info, expected.info);
    assert!(h.messenger.last().text.contains("Ivan Petrov"));
}

#[tokio::test]
async fn invalid_input_keeps_the_collected_data() {
    let h = Harness::new().await;
    let state = State::TrainerEnterInfo {
        name: "Ivan Petrov".to_owned(),
        tg_id: "@ivan".to_owned(),
        chat_id: 123456,
    };

    let next = h.text(ADMIN_CHAT, state.clone(), "   ").await;

    assert_eq!(next, state);
    let answer = h.messenger.last();
    assert!(answer.text.starts_with("⚠️"));
    assert!(answer.text.ends_with(texts::ASK_TRAINER_INFO));
    assert_eq!(answer.payloads, vec!["cancel"]);
}

#[rstest]
#[case(State::TrainerEditName { trainer_id: 1 }, State::TrainerMenu)]
#[case(State::TrainerConfirm(NewTrainer {
    name: "Ivan Petrov".to_owned(),
    tg_id: "@ivan".to_owned(),
    chat_id: 1,
    info: "Coach".to_owned(),
}), State::TrainerMenu)]
#[case(State::TrackConfirm(NewTrack { name: "North".to_owned(), info: "400 m".to_owned() }), State::TrackMenu)]
#[case(State::TrainingEnterTime { trainer_id: 1, track_id: 1 }, State::ScheduleMenu)]
#[case(State::UserEnterPhone { name: "Ana".to_owned() }, State::Start)]
#[case(State::RegisterSelectTime { track_id: 1, trainer_id: 1 }, State::Start)]
#[case(State::AdminMenu, State::Start)]
#[tokio::test]
async fn cancel_goes_back_to_the_launching_menu(#[case] state: State, #[case] expected: State) {
    let h = Harness::new().await;

    let next = h.press(ADMIN_CHAT, state, "cancel").await;

    assert_eq!(next, expected);
    assert!(h.messenger.last().text.starts_with(texts::CANCELLED));
}

#[tokio::test]
async fn stale_buttons_are_ignored() {
    let h = Harness::new().await;

    let next = h.press(MEMBER_CHAT, State::RegisterSelectTrack, "selectSeat_3").await;

    assert_eq!(next, State::Start);
    assert_eq!(h.messenger.acks().len(), 1);
    assert!(h.messenger.sent().is_empty());
}

#[rstest]
#[case::non_numeric_id("trainer_abc")]
#[case::empty_payload("")]
#[case::missing_id("trainer")]
#[case::unexpected_id("trainers_5")]
#[case::id_out_of_range("trainer_18446744073709551615")]
#[case::confirm_with_id("confirm_5")]
#[case::cancel_with_id("cancel_7")]
#[tokio::test]
async fn malformed_payloads_break_the_flow(#[case] data: &str) {
    let h = Harness::new().await;

    let next = h.press(ADMIN_CHAT, State::TrainerMenu, data).await;

    assert_eq!(next, State::Error);
    assert_eq!(h.messenger.last().text, texts::FLOW_ERROR);
}

#[tokio::test]
async fn wizard_steps_reject_buttons_of_other_steps() {
    let h = Harness::new().await;

    let next = h.press(MEMBER_CHAT, State::Start, "selectTime_1").await;

    assert_eq!(next, State::Error);
}

#[rstest]
#[case::admin_flow(ADMIN_CHAT, State::AdminMenu, "trainers", State::AdminMenu)]
#[case::member_flow(MEMBER_CHAT, State::Start, "register", State::Start)]
#[tokio::test]
async fn repository_failures_get_an_apology(
    #[case] chat: i64,
    #[case] state: State,
    #[case] data: &str,
    #[case] expected: State,
) {
    let h = Harness::new().await;
    h.repo
        .inject_failure(RepoError::UnknownDbError("connection reset".to_owned()))
        .await;

    let next = h.press(chat, state, data).await;

    assert_eq!(next, expected);
    assert_eq!(h.messenger.last().text, texts::APOLOGY);
}

#[tokio::test]
async fn commands_interrupt_any_flow() {
    let h = Harness::new().await;
    let state = State::TrainerEnterTgId {
        name: "Ivan Petrov".to_owned(),
    };

    let next = h.text(ADMIN_CHAT, state, "/start").await;

    assert_eq!(next, State::Start);
    let answer = h.messenger.last();
    assert!(!answer.edited);
    assert_eq!(answer.payloads, vec!["signUp", "adminMenu"]);
}

#[tokio::test]
async fn admin_options_are_reserved() {
    let h = Harness::new().await;

    assert_eq!(h.press(STRANGER_CHAT, State::Start, "trainers").await, State::Start);
    assert_eq!(h.messenger.last().text, texts::NOT_ALLOWED);

    assert_eq!(h.text(STRANGER_CHAT, State::Start, "/admin").await, State::Start);
    assert_eq!(h.messenger.last().text, texts::NOT_ALLOWED);

    // Text sent to an admin step by a chat that lost its rights.
    let next = h.text(STRANGER_CHAT, State::TrackEnterName, "North track").await;
    assert_eq!(next, State::Start);
    assert!(h.repo.tracks().await.expect("Failed to list the tracks").is_empty());
}

#[tokio::test]
async fn confirm_without_pending_data() {
    let h = Harness::new().await;

    let next = h.press(MEMBER_CHAT, State::Start, "confirm").await;

    assert_eq!(next, State::Start);
    assert_eq!(h.messenger.last().text, texts::NOTHING_TO_CONFIRM);
}

#[tokio::test]
async fn text_out_of_a_flow_gets_the_fallback() {
    let h = Harness::new().await;

    let next = h.text(MEMBER_CHAT, State::RegisterSelectTrack, "hello").await;

    assert_eq!(next, State::Start);
    assert_eq!(h.messenger.last().text, texts::fallback());
}

#[tokio::test]
async fn sign_up_creates_a_member() {
    let h = Harness::new().await;

    let state = h.press(STRANGER_CHAT, State::Start, "signUp").await;
    assert_eq!(state, State::UserEnterName);
    let state = h.text(STRANGER_CHAT, state, "Luis  Martín").await;
    assert_eq!(
        state,
        State::UserEnterPhone {
            name: "Luis Martín".to_owned()
        }
    );
    let state = h.text(STRANGER_CHAT, state, "+34 611-222-333").await;
    let state = h.press(STRANGER_CHAT, state, "confirm").await;

    assert_eq!(state, State::Start);
    let user = h
        .repo
        .user_by_chat(STRANGER_CHAT)
        .await
        .expect("Failed to look up the member")
        .expect("The member was not created");
    assert_eq!(user.name, "Luis Martín");
    assert_eq!(user.phone, "+34611222333");
    assert_eq!(h.messenger.last().payloads, vec!["register", "myRegistrations"]);
}

#[tokio::test]
async fn members_register_for_a_training() {
    let h = Harness::new().await;
    let academy = seed_academy(&h.repo).await;

    let state = h.press(MEMBER_CHAT, State::Start, "register").await;
    assert_eq!(state, State::RegisterSelectTrack);

    let state = h
        .press(MEMBER_CHAT, state, &format!("selectTrack_{}", academy.track_id))
        .await;
    assert_eq!(
        state,
        State::RegisterSelectTrainer {
            track_id: academy.track_id
        }
    );

    let state = h
        .press(MEMBER_CHAT, state, &format!("selectTrainer_{}", academy.trainer_id))
        .await;
    assert_eq!(
        state,
        State::RegisterSelectTime {
            track_id: academy.track_id,
            trainer_id: academy.trainer_id,
        }
    );
    assert_eq!(
        h.messenger.last().payloads,
        vec![
            format!("selectTime_{}", academy.training_id),
            format!("requestTraining_{}", academy.trainer_id),
            "cancel".to_owned(),
        ]
    );

    let state = h
        .press(MEMBER_CHAT, state, &format!("selectTime_{}", academy.training_id))
        .await;
    assert_eq!(
        state,
        State::RegisterConfirm {
            training_id: academy.training_id
        }
    );

    let state = h.press(MEMBER_CHAT, state, "confirm").await;
    assert_eq!(state, State::Start);

    let registrations = h
        .repo
        .registrations_of(academy.member_id)
        .await
        .expect("Failed to list the registrations");
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].training_id, academy.training_id);

    // A second confirmation doesn't duplicate the registration.
    let again = State::RegisterConfirm {
        training_id: academy.training_id,
    };
    assert_eq!(h.press(MEMBER_CHAT, again, "confirm").await, State::Start);
    assert!(h.messenger.last().text.starts_with(texts::ALREADY_REGISTERED));
    assert_eq!(
        h.repo
            .registrations_of(academy.member_id)
            .await
            .expect("Failed to list the registrations")
            .len(),
        1
    );
}

#[tokio::test]
async fn members_cancel_their_registrations() {
    let h = Harness::new().await;
    let academy = seed_academy(&h.repo).await;
    let registration = h
        .repo
        .register(academy.training_id, academy.member_id)
        .await
        .expect("Failed to register");

    let state = h.press(MEMBER_CHAT, State::Start, "myRegistrations").await;
    assert_eq!(state, State::Start);
    assert_eq!(
        h.messenger.last().payloads,
        vec![format!("cancelRegistration_{}", registration.id), "start".to_owned()]
    );

    let data = format!("cancelRegistration_{}", registration.id);
    assert_eq!(h.press(MEMBER_CHAT, State::Start, &data).await, State::Start);
    assert!(h.messenger.last().text.starts_with(texts::REGISTRATION_CANCELLED));

    // The button of the old message.
    assert_eq!(h.press(MEMBER_CHAT, State::Start, &data).await, State::Start);
    assert!(h.messenger.last().text.starts_with(texts::REGISTRATION_GONE));
}

#[tokio::test]
async fn training_requests_reach_the_trainer() {
    let h = Harness::new().await;
    let academy = seed_academy(&h.repo).await;
    let state = State::RegisterSelectTime {
        track_id: academy.track_id,
        trainer_id: academy.trainer_id,
    };

    let state = h
        .press(MEMBER_CHAT, state, &format!("requestTraining_{}", academy.trainer_id))
        .await;
    assert_eq!(
        state,
        State::RequestEnterTime {
            track_id: academy.track_id,
            trainer_id: academy.trainer_id,
        }
    );

    let state = h.text(MEMBER_CHAT, state, "Saturday mornings").await;
    assert_eq!(state, State::Start);

    let requests = h.repo.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].preferred_time, "Saturday mornings");

    let notification = h
        .messenger
        .sent()
        .into_iter()
        .find(|m| m.chat_id == ChatId(TRAINER_CHAT))
        .expect("The trainer was not notified");
    assert!(notification.text.contains("Ana Gómez"));
    assert!(notification.text.contains("Saturday mornings"));
}

#[tokio::test]
async fn admins_schedule_trainings() {
    let h = Harness::new().await;
    let trainer = h
        .repo
        .create_trainer(NewTrainer {
            name: "Ivan Petrov".to_owned(),
            tg_id: "@ivan".to_owned(),
            chat_id: TRAINER_CHAT,
            info: "Coach".to_owned(),
        })
        .await
        .expect("Failed to create the trainer");
    let track = h
        .repo
        .create_track(NewTrack {
            name: "North track".to_owned(),
            info: "400 m".to_owned(),
        })
        .await
        .expect("Failed to create the track");

    let state = h.press(ADMIN_CHAT, State::ScheduleMenu, "createTraining").await;
    assert_eq!(state, State::TrainingSelectTrainer);
    let state = h
        .press(ADMIN_CHAT, state, &format!("pickTrainer_{}", trainer.id))
        .await;
    let state = h.press(ADMIN_CHAT, state, &format!("pickTrack_{}", track.id)).await;
    assert_eq!(
        state,
        State::TrainingEnterTime {
            trainer_id: trainer.id,
            track_id: track.id,
        }
    );

    let state = h.text(ADMIN_CHAT, state, "2999-05-17 18:30").await;
    let State::TrainingConfirm(NewTraining { starts_at, .. }) = state.clone() else {
        panic!("Unexpected state {state:?}");
    };
    assert_eq!(texts::format_time(&starts_at), "2999-05-17 18:30");

    let state = h.press(ADMIN_CHAT, state, "confirm").await;
    assert_eq!(state, State::ScheduleMenu);

    let trainings = h
        .repo
        .trainings_for(track.id, trainer.id, chrono::Utc::now())
        .await
        .expect("Failed to list the trainings");
    assert_eq!(trainings.len(), 1);
}

#[tokio::test]
async fn engine_keeps_the_state_between_updates() {
    let h = Harness::new().await;
    let store = Arc::new(StateStore::new(Duration::from_secs(60)));
    let metrics = Arc::new(Metrics::new());
    let engine = Engine::new(
        h.dispatcher,
        store.clone(),
        Arc::new(RateLimiter::new(LimiterSettings::default())),
        metrics.clone(),
        Duration::from_secs(1),
    );

    engine
        .process(InboundUpdate::callback(1, ChatId(ADMIN_CHAT), Some(MessageId(7)), "q1", "createTrack"))
        .await;
    engine
        .process(InboundUpdate::text(2, ChatId(ADMIN_CHAT), MessageId(8), "North track"))
        .await;

    assert_eq!(
        store.get_or_create(ChatId(ADMIN_CHAT)).await,
        State::TrackEnterInfo {
            name: "North track".to_owned()
        }
    );
    assert_eq!(metrics.snapshot().processed_updates, 2);
}
