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

//! Exponential backoff with jitter for the update poller.

use rand::Rng;
use std::time::Duration;

/// Lower bound of the jitter factor.
const JITTER_MIN: f64 = 0.75;
/// Upper bound of the jitter factor.
const JITTER_MAX: f64 = 1.25;

/// Parameters of a [Backoff].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffSettings {
    pub base: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        BackoffSettings {
            base: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
        }
    }
}

/// Stateful retry delay calculator.
///
/// # Description
///
/// Each call to [Backoff::next] returns `base * multiplier^attempts`, scaled by a random factor within
/// ±25 % and clamped to `max_delay`. Once `max_attempts` calls were made without a [Backoff::reset], the
/// delay stays at `max_delay`.
///
/// The jitter only aims to avoid several instances of the bot retrying in lock-step, thus the thread-local
/// generator of `rand` is more than enough.
#[derive(Debug, Clone)]
pub struct Backoff {
    settings: BackoffSettings,
    attempts: u32,
}

impl Backoff {
    pub fn new(settings: BackoffSettings) -> Self {
        Backoff {
            settings,
            attempts: 0,
        }
    }

    pub fn next(&mut self) -> Duration {
        if self.attempts >= self.settings.max_attempts {
            return self.settings.max_delay;
        }

        let jitter = rand::rng().random_range(JITTER_MIN..=JITTER_MAX);
        let delay = self.nominal(self.attempts) * jitter;
        self.attempts += 1;

        // NaN and negative delays become 0.
        Duration::from_secs_f64(delay.max(0.0).min(self.settings.max_delay.as_secs_f64()))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay without jitter for the given attempt, in seconds.
    fn nominal(&self, attempt: u32) -> f64 {
        self.settings.base.as_secs_f64() * self.settings.multiplier.powi(attempt as i32)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(BackoffSettings::default())
    }
}
