//! Configuration for the terminal runner
//!
//! A YAML file with optional `flow` and `logging` sections, then
//! `STEPWISE_*` environment overrides on top.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use stepwise_core::FlowConfig;
use stepwise_monitoring::LoggingConfig;

/// Runner configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Flow tunables
    #[serde(default)]
    pub flow: FlowConfig,

    /// Logging setup
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Read `path` if given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with(path, |name| env::var(name).ok())
    }

    /// Like [`load`](Self::load), reading overrides through `lookup`
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_yaml_str(&text)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.flow = config.flow.with_overrides(lookup);
        Ok(config)
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
