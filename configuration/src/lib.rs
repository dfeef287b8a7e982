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

//! AcademyBot configuration module
//!
//! # Description
//!
//! This module includes all the definitions for the app's settings and the
//! objects that automate reading the configuration from files or environment
//! variables and parsing them to Rust's native types.
//!
//! Some settings must be overrided by environment variables, for example, the
//! API token for the Telegram Bot client. All the environment variables that
//! are meant to be used within this module shall use the prefix _ACADEMYBOT_,
//! and a double underscore as section separator:
//! `export ACADEMYBOT__APPLICATION__API_TOKEN="token"`.

use config::{Config, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde_derive::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::time::Duration;

/// Name of the directory in which configuration files will be stored.
const CONF_DIR: &str = "config";

/// Main settings `struct`.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Level for the tracing crate.
    pub tracing_level: String,
    /// Application specific settings.
    pub application: ApplicationSettings,
    /// Settings of the academy's DB.
    pub database: DatabaseSettings,
    /// Tuning of the conversation engine.
    #[serde(default)]
    pub engine: EngineSettings,
    /// Per-user rate limiting.
    #[serde(default)]
    pub limiter: LimiterSettings,
    /// Retry policy of the update poller.
    #[serde(default)]
    pub backoff: BackoffSettings,
}

/// Settings of the AcademyBot application.
///
/// # Description
///
/// - [ApplicationSettings::api_token]: Telegram BOT API token. Override the value
///   of the YML file using an environment variable: `export ACADEMYBOT__APPLICATION__API_TOKEN="key"`.
/// - [ApplicationSettings::http_server_host] and [ApplicationSettings::http_server_port]: address of the
///   HTTP server that exposes the `/health` endpoint.
/// - [ApplicationSettings::admin_chat_ids]: chats that are granted admin rights at start up.
#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    pub api_token: SecretString,
    pub http_server_host: String,
    pub http_server_port: u16,
    #[serde(default)]
    pub admin_chat_ids: Vec<i64>,
}

/// Settings for the PostgreSQL backend.
///
/// # Description
///
/// When [DatabaseSettings::in_memory] is set, no connection is attempted and the bot keeps every
/// entity in the main memory. Handy for local testing of the bot, useless for anything else.
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub dbname: String,
    pub require_ssl: Option<bool>,
    #[serde(default)]
    pub in_memory: bool,
}

/// Tuning knobs of the update pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Long poll timeout sent to the Telegram API.
    pub poll_timeout_secs: u32,
    /// Capacity of each consumer queue. Updates beyond it are dropped.
    pub queue_capacity: usize,
    /// Number of consumer tasks. Updates of a chat always land in the same consumer.
    pub workers: usize,
    /// Idle time after which a conversation is forgotten.
    pub state_ttl_secs: u64,
    /// Cadence of the sweep over conversations and rate limiter buckets.
    pub sweep_interval_secs: u64,
    /// Upper bound for the rate limiter admission check.
    pub admission_timeout_ms: u64,
    /// The health endpoint reports failure when the poller didn't succeed for this long.
    pub health_stale_after_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            poll_timeout_secs: 30,
            queue_capacity: 256,
            workers: 1,
            state_ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
            admission_timeout_ms: 2000,
            health_stale_after_secs: 180,
        }
    }
}

/// Token bucket parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    pub capacity: u32,
    pub refill_every_ms: u64,
    pub idle_ttl_secs: u64,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        LimiterSettings {
            capacity: 10,
            refill_every_ms: 1000,
            idle_ttl_secs: 600,
        }
    }
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub base_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        BackoffSettings {
            base_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 60_000,
            max_attempts: 10,
        }
    }
}

impl EngineSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs as u64)
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn admission_timeout(&self) -> Duration {
        Duration::from_millis(self.admission_timeout_ms)
    }

    pub fn health_stale_after(&self) -> Duration {
        Duration::from_secs(self.health_stale_after_secs)
    }
}

impl DatabaseSettings {
    /// Build the connection options for the PostgreSQL server.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(self.password.expose_secret())
            .database(&self.dbname)
            .ssl_mode(if self.require_ssl.unwrap_or_default() {
                PgSslMode::Require
            } else {
                PgSslMode::Prefer
            })
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Build the full path of the configuration directory.
        let base_path = std::env::current_dir()
            .map_err(|e| ConfigError::Message(format!("Failed to determine the current directory: {e}")))?;
        let cfg_dir = base_path.join(CONF_DIR);

        let settings = Config::builder()
            // Start of by merging in the "default" configuration file.
            .add_source(File::from(cfg_dir.join("base")).required(true))
            .add_source(Environment::with_prefix("academybot").separator("__"))
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Reject values the bot can't run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "engine.sweep_interval_secs must be greater than 0".to_owned(),
            ));
        }
        if self.engine.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "engine.queue_capacity must be greater than 0".to_owned(),
            ));
        }
        if !self.backoff.multiplier.is_finite() || self.backoff.multiplier < 1.0 {
            return Err(ConfigError::Message(format!(
                "backoff.multiplier must be a finite number not lower than 1, got {}",
                self.backoff.multiplier
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const MINIMAL: &str = r#"
tracing_level: info
application:
  api_token: "123:abc"
  http_server_host: "127.0.0.1"
  http_server_port: 9600
database:
  host: "localhost"
  port: 5432
  user: "academy"
  password: "secret"
  dbname: "academy"
"#;

    #[test]
    fn missing_sections_take_defaults() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(MINIMAL, FileFormat::Yaml))
            .build()
            .expect("Failed to build the test config")
            .try_deserialize()
            .expect("Failed to deserialise the test config");

        assert_eq!(settings.engine.state_ttl(), Duration::from_secs(1800));
        assert_eq!(settings.engine.workers, 1);
        assert_eq!(settings.limiter.capacity, 10);
        assert_eq!(settings.backoff.max_attempts, 10);
        assert!(!settings.database.in_memory);
        assert!(settings.application.admin_chat_ids.is_empty());
        assert_eq!(settings.application.api_token.expose_secret(), "123:abc");
    }

    fn parse(yaml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .expect("Failed to build the test config")
            .try_deserialize()
            .expect("Failed to deserialise the test config")
    }

    #[test]
    fn defaults_pass_the_validation() {
        assert!(parse(MINIMAL).validate().is_ok());
    }

    #[rstest]
    #[case("engine:\n  sweep_interval_secs: 0\n")]
    #[case("engine:\n  queue_capacity: 0\n")]
    #[case("backoff:\n  multiplier: -2.0\n")]
    #[case("backoff:\n  multiplier: 0.5\n")]
    fn unusable_values_are_rejected(#[case] section: &str) {
        let settings = parse(&format!("{MINIMAL}{section}"));
        assert!(matches!(settings.validate(), Err(ConfigError::Message(_))));
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn non_finite_multipliers_are_rejected(#[case] multiplier: f64) {
        let mut settings = parse(MINIMAL);
        settings.backoff.multiplier = multiplier;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_section_keeps_remaining_defaults() {
        let yaml = format!("{MINIMAL}engine:\n  workers: 4\n");
        let settings: Settings = Config::builder()
            .add_source(File::from_str(&yaml, FileFormat::Yaml))
            .build()
            .expect("Failed to build the test config")
            .try_deserialize()
            .expect("Failed to deserialise the test config");

        assert_eq!(settings.engine.workers, 4);
        assert_eq!(settings.engine.queue_capacity, 256);
    }
}
