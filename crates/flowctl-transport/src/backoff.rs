// Copyright 2024-2026 Farlight Networks, LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reconnect backoff.

use std::time::Duration;

/// Upper bound on the backoff, as a multiple of the base interval.
pub const MAX_BACKOFF_FACTOR: u32 = 16;

/// Reconnect policy for actively connected sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Whether a lost connection is retried.
    pub enabled: bool,
    /// Delay before the first retry.
    pub base_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            base_interval: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// A policy that retries starting at `base_interval`.
    #[must_use]
    pub const fn enabled(base_interval: Duration) -> Self {
        Self {
            enabled: true,
            base_interval,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            base_interval: Duration::from_secs(1),
        }
    }
}

/// Exponential backoff between reconnect attempts.
///
/// The first delay is the base interval; each subsequent delay doubles,
/// capped at [`MAX_BACKOFF_FACTOR`] times the base. The schedule only
/// restarts when [`reset`](Self::reset) is called, which the session layer
/// does once a connection is fully established.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    /// Creates a backoff starting at `base`.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: base.saturating_mul(MAX_BACKOFF_FACTOR),
            current: base,
            attempts: 0,
        }
    }

    /// Returns the delay before the next attempt and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Restarts the schedule at the base interval.
    pub fn reset(&mut self) {
        self.current = self.base;
        self.attempts = 0;
    }

    /// Number of delays handed out since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Base interval.
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }
}
