//! Flow tunables
//!
//! Defaults can be overridden from the environment or a YAML document.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::FlowResult;

/// Default pause between a step's resolution and its completion
pub const DEFAULT_RESOLVE_DELAY_MS: u64 = 200;

/// Default bound on a single step
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Tunables applied to Flow Options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Delay after a step resolves, before it completes
    #[serde(default = "default_resolve_delay_ms")]
    pub resolve_delay_ms: u64,

    /// Step timeout used when a step sets none
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Persist through the broker instead of the session store
    #[serde(default)]
    pub use_broker: bool,
}

fn default_resolve_delay_ms() -> u64 {
    DEFAULT_RESOLVE_DELAY_MS
}

fn default_step_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            resolve_delay_ms: default_resolve_delay_ms(),
            step_timeout_ms: default_step_timeout_ms(),
            use_broker: false,
        }
    }
}

impl FlowConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        let config = Self::default().with_overrides(|name| env::var(name).ok());
        info!(
            resolve_delay_ms = config.resolve_delay_ms,
            step_timeout_ms = config.step_timeout_ms,
            use_broker = config.use_broker,
            "Loaded flow configuration"
        );
        config
    }

    /// Parse a YAML document; missing fields take their defaults
    pub fn from_yaml_str(yaml: &str) -> FlowResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply `STEPWISE_*` overrides read through `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(delay) = lookup("STEPWISE_RESOLVE_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(delay) => self.resolve_delay_ms = delay,
                Err(_) => warn!("Invalid STEPWISE_RESOLVE_DELAY_MS value: {}", delay),
            }
        }

        if let Some(timeout) = lookup("STEPWISE_STEP_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(timeout) if timeout > 0 => self.step_timeout_ms = timeout,
                _ => warn!("Invalid STEPWISE_STEP_TIMEOUT_MS value: {}", timeout),
            }
        }

        if let Some(use_broker) = lookup("STEPWISE_USE_BROKER") {
            match use_broker.to_lowercase().as_str() {
                "true" | "1" => self.use_broker = true,
                "false" | "0" => self.use_broker = false,
                _ => warn!("Invalid STEPWISE_USE_BROKER value: {}", use_broker),
            }
        }

        self
    }

    /// Resolve delay as a duration
    pub fn resolve_delay(&self) -> Duration {
        Duration::from_millis(self.resolve_delay_ms)
    }

    /// Step timeout as a duration
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}
