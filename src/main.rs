// Copyright 2024-2025 Felipe Torres González
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

//! Main file of the AcademyBot

use academybot::{
    State,
    handlers::Dispatcher,
    health::{self, HealthState},
    telegram::TelegramClient,
    telemetry::configure_tracing,
};
use bot_core::{
    Backoff, BackoffSettings, Engine, LimiterSettings, Metrics, Poller, RateLimiter, StateStore, UpdateQueue,
    recovery::install_panic_hook, sweeper,
};
use configuration::Settings;
use repository::{Admin, InMemoryRepository, PgRepository, Repository};
use secrecy::ExposeSecret;
use std::{net::SocketAddr, process::exit, str::FromStr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::watch};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load the settings.
    let settings = Settings::new()?;

    // Initialize the tracing subsystem.
    configure_tracing(settings.tracing_level.as_str());
    install_panic_hook();

    if settings.database.in_memory {
        warn!("Using the in-memory repository: all the data is lost when the bot stops");
        return run(settings, InMemoryRepository::new()).await;
    }

    let repository = match PgRepository::connect(&settings.database).await {
        Ok(repository) => repository,
        Err(e) => {
            error!("An error occurred while attempting to connect to the academy's DB:\n{e}");
            exit(69)
        }
    };

    run(settings, repository).await
}

/// Wire the pipeline together and serve until a termination signal arrives.
async fn run<R: Repository + 'static>(settings: Settings, repository: R) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Arc::new(repository);
    for chat_id in &settings.application.admin_chat_ids {
        repository.add_admin(Admin { chat_id: *chat_id }).await?;
    }
    debug!("{} admins seeded", settings.application.admin_chat_ids.len());

    let tuning = &settings.engine;
    let metrics = Arc::new(Metrics::new());
    let store = Arc::new(StateStore::<State>::new(tuning.state_ttl()));
    let limiter = Arc::new(RateLimiter::new(LimiterSettings {
        capacity: settings.limiter.capacity,
        refill_every: Duration::from_millis(settings.limiter.refill_every_ms),
        idle_ttl: Duration::from_secs(settings.limiter.idle_ttl_secs),
    }));
    let backoff = Backoff::new(BackoffSettings {
        base: Duration::from_millis(settings.backoff.base_ms),
        multiplier: settings.backoff.multiplier,
        max_delay: Duration::from_millis(settings.backoff.max_delay_ms),
        max_attempts: settings.backoff.max_attempts,
    });

    // Instance a throttled bot, to avoid reaching the message limits of the API.
    let client = Arc::new(TelegramClient::new(
        settings.application.api_token.expose_secret(),
        tuning.poll_timeout(),
    )?);
    let bot_name = client.username().await?;
    if let Err(e) = client.register_commands().await {
        warn!("Failed to register the commands of the bot: {e}");
    }

    let dispatcher = Dispatcher::new(repository, client.clone(), bot_name);
    let engine = Arc::new(Engine::new(
        dispatcher,
        store.clone(),
        limiter.clone(),
        metrics.clone(),
        tuning.admission_timeout(),
    ));
    let (queue, receivers) = UpdateQueue::new(tuning.workers, tuning.queue_capacity, metrics.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    for (worker, rx) in receivers.into_iter().enumerate() {
        tasks.push(tokio::spawn(engine.clone().run(worker, rx, shutdown_rx.clone())));
    }
    let poller = Poller::new(client, backoff, tuning.poll_timeout(), metrics.clone());
    tasks.push(tokio::spawn(poller.run(queue, shutdown_rx.clone())));
    tasks.push(tokio::spawn(sweeper(
        store.clone(),
        limiter.clone(),
        tuning.sweep_interval(),
        shutdown_rx.clone(),
    )));

    // Build an Axum HTTP server for the health endpoint.
    let http_server_address = SocketAddr::from_str(&format!(
        "{}:{}",
        &settings.application.http_server_host, settings.application.http_server_port
    ))?;
    let tcp_listener = TcpListener::bind(http_server_address).await?;
    let app = health::router(HealthState::new(store, limiter, metrics, tuning.health_stale_after()));
    let mut http_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move {
        let stop = async move {
            while !*http_shutdown.borrow_and_update() {
                if http_shutdown.changed().await.is_err() {
                    break;
                }
            }
        };
        if let Err(e) = axum::serve(tcp_listener, app).with_graceful_shutdown(stop).await {
            error!("The HTTP server failed: {e}");
        }
    }));
    debug!("Axum server started on {http_server_address}");

    info!("Started AcademyBot");

    wait_for_signal().await;
    info!("Shutdown requested, stopping the workers");
    if shutdown_tx.send(true).is_err() {
        warn!("Every worker was already stopped");
    }

    for task in tasks {
        if let Err(e) = task.await {
            error!("A task of the bot ended abruptly: {e}");
        }
    }

    info!("Gracefully closed AcademyBot");

    Ok(())
}

/// Wait for Ctrl+C or, on Unix, for SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
