use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::{get_env_flag, get_env_parsed};

/// Time limits for webhook requests and the external calls they make
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    /// Whether the whole-request timeout layer is installed
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Whole-request limit in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Limit for each persistence or notification call, in seconds
    #[serde(default = "default_step_timeout_seconds")]
    pub step_timeout_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_seconds: default_timeout_seconds(),
            step_timeout_seconds: default_step_timeout_seconds(),
        }
    }
}

impl TimeoutConfig {
    pub fn builder() -> TimeoutConfigBuilder {
        TimeoutConfigBuilder::new()
    }

    /// Whole-request limit
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Per-step limit
    pub fn step_duration(&self) -> Duration {
        Duration::from_secs(self.step_timeout_seconds)
    }

    /// Read `PAYHOOK_TIMEOUT_ENABLED`, `PAYHOOK_TIMEOUT_SECONDS` and
    /// `PAYHOOK_STEP_TIMEOUT_SECONDS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(enabled) = get_env_flag("TIMEOUT_ENABLED") {
            config.enabled = enabled;
        }
        if let Some(seconds) = get_env_parsed("TIMEOUT_SECONDS") {
            config.timeout_seconds = seconds;
        }
        if let Some(seconds) = get_env_parsed("STEP_TIMEOUT_SECONDS") {
            config.step_timeout_seconds = seconds;
        }

        config
    }
}

/// Builder for TimeoutConfig
#[must_use = "builder does nothing until you call build()"]
pub struct TimeoutConfigBuilder {
    config: TimeoutConfig,
}

impl TimeoutConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TimeoutConfig::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.config.timeout_seconds = duration.as_secs();
        self
    }

    pub fn step_timeout(mut self, duration: Duration) -> Self {
        self.config.step_timeout_seconds = duration.as_secs();
        self
    }

    pub fn build(self) -> TimeoutConfig {
        self.config
    }
}

impl Default for TimeoutConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_step_timeout_seconds() -> u64 {
    10
}
