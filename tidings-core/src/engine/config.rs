// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::EngineError;

/// Configuration for background execution and peer polling.
///
/// Loaded from preference storage as JSON; durations use human-readable
/// strings ("60s", "5m").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between successful polls of one friend
    #[serde(with = "humantime_serde")]
    pub friend_poll_period: Duration,

    /// Timeout for a single status request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// First retry delay after a failed poll
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,

    /// Upper bound for the retry delay
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,

    /// Maximum random delay added to each retry
    #[serde(with = "humantime_serde")]
    pub retry_jitter: Duration,

    /// Delay between reports of the best location fix into own status
    #[serde(with = "humantime_serde")]
    pub location_report_period: Duration,

    /// Maximum number of concurrently running pool tasks
    pub max_workers: usize,

    /// How long `stop()` waits for running tasks
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            friend_poll_period: Duration::from_secs(60),
            // Requests cross an anonymizing network
            request_timeout: Duration::from_secs(60),
            retry_base_delay: Duration::from_secs(5),
            retry_max_delay: Duration::from_secs(5 * 60),
            retry_jitter: Duration::from_secs(1),
            location_report_period: Duration::from_secs(5 * 60),
            max_workers: 16,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration for preference storage.
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Checks that the values can drive the scheduler.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_workers == 0 {
            return Err(EngineError::Config("max_workers must be at least 1".into()));
        }
        if self.friend_poll_period.is_zero() {
            return Err(EngineError::Config(
                "friend_poll_period must be positive".into(),
            ));
        }
        if self.location_report_period.is_zero() {
            return Err(EngineError::Config(
                "location_report_period must be positive".into(),
            ));
        }
        if self.retry_base_delay.is_zero() {
            return Err(EngineError::Config(
                "retry_base_delay must be positive".into(),
            ));
        }
        if self.retry_base_delay > self.retry_max_delay {
            return Err(EngineError::Config(
                "retry_base_delay exceeds retry_max_delay".into(),
            ));
        }
        Ok(())
    }

    pub fn with_friend_poll_period(mut self, period: Duration) -> Self {
        self.friend_poll_period = period;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry backoff bounds and jitter.
    pub fn with_retry(mut self, base: Duration, max: Duration, jitter: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self.retry_jitter = jitter;
        self
    }

    pub fn with_location_report_period(mut self, period: Duration) -> Self {
        self.location_report_period = period;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}
