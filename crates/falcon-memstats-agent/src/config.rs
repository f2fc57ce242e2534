// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use falcon_push::pusher::{PusherConfig, DEFAULT_PUSH_TIMEOUT, DEFAULT_PUSH_URL};
use memstats_collector::constants::COLLECTION_INTERVAL;
use std::env;
use std::time::Duration;

pub const LOG_LEVEL_ENV: &str = "MEMSTATS_LOG_LEVEL";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Agent configuration. Only the log level comes from the environment; the
/// endpoint, interval and timeout are fixed.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Collector push endpoint
    pub push_url: String,
    /// Time between two collections
    pub interval: Duration,
    /// Bound on a single push
    pub push_timeout: Duration,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            push_url: DEFAULT_PUSH_URL.to_string(),
            interval: COLLECTION_INTERVAL,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AgentConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_level = env::var(LOG_LEVEL_ENV)
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let config = Self {
            log_level,
            ..Default::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }

        // A push must finish before the next tick is due.
        if self.push_timeout >= self.interval {
            return Err(ConfigError::TimeoutExceedsInterval {
                timeout: self.push_timeout,
                interval: self.interval,
            });
        }

        Ok(())
    }

    pub fn pusher_config(&self) -> PusherConfig {
        PusherConfig {
            push_url: self.push_url.clone(),
            timeout: self.push_timeout,
        }
    }
}
