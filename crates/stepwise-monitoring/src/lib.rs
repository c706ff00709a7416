//! Logging and flow observability for Stepwise.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stepwise_core::{Flow, FlowEvent, ListenerId};
use tracing::{debug, info, warn};

pub mod logging;

pub use logging::{init_logging, init_test_logging, LogExt};

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Service name attached to the startup record
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// JSON output instead of pretty output
    #[serde(default)]
    pub json: bool,

    /// Also write JSON logs to this file, rotated daily
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_service_name() -> String {
    "stepwise".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_filter: default_log_filter(),
            json: false,
            log_file: None,
        }
    }
}

/// Trace every event of `flow`.
///
/// Lifecycle events log at debug, flow boundaries at info and timeouts at
/// warn, each with the flow id and the step involved.
pub fn trace_flow_events(flow: &Flow) -> ListenerId {
    let flow_id = flow.id().clone();
    flow.on(move |event| {
        let summary = event.summary();
        let step_key = summary.step.as_deref().unwrap_or("-");
        match event {
            FlowEvent::FlowTimeout(err) => {
                warn!(flow_id = %flow_id, event = summary.name, error = %err, "Flow event");
            }
            FlowEvent::FlowStarted | FlowEvent::FlowEnded(_) => {
                info!(flow_id = %flow_id, event = summary.name, step_key, "Flow event");
            }
            _ => {
                debug!(
                    flow_id = %flow_id,
                    event = summary.name,
                    step_key,
                    state = ?summary.state,
                    "Flow event"
                );
            }
        }
    })
}
