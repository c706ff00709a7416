//! Terminal front end for Stepwise flows
//!
//! Loads configuration, initializes logging and drives the demo survey
//! through a line-oriented renderer.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use stepwise_monitoring::{trace_flow_events, LogExt};
use tracing::info;

pub mod config;
pub mod renderer;
pub mod survey;

pub use config::CliConfig;
pub use renderer::{Reply, TerminalRenderer};
pub use survey::{survey_flow, Persistence};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "stepwise", version, about = "Run the demo survey in the terminal")]
pub struct Args {
    /// YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info,stepwise_core=debug`
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    pub json_logs: bool,

    /// Flow id, also the persistence scope
    #[arg(long, default_value = "survey")]
    pub flow_id: String,
}

impl Args {
    /// Merge command line overrides into `config`
    pub fn apply(&self, mut config: CliConfig) -> CliConfig {
        if let Some(filter) = &self.log_filter {
            config.logging.log_filter = filter.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }
        config
    }
}

/// Run the survey on stdin/stdout
pub async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.apply(CliConfig::load(args.config.as_deref())?);
    stepwise_monitoring::init_logging(&config.logging).context("Failed to initialize logging")?;

    let persistence = Persistence::from_config(&config.flow);
    let renderer = TerminalRenderer::stdio();
    let flow = survey_flow(&args.flow_id, &config.flow, &persistence, &renderer)
        .context("Failed to build the survey flow")?;
    trace_flow_events(&flow);

    info!(flow_id = %args.flow_id, use_broker = config.flow.use_broker, "Running survey");
    renderer
        .drive(&flow)
        .await
        .log_err("Survey failed")
        .context("Survey did not finish")?;
    Ok(())
}
