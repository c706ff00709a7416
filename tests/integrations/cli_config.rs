//! Configuration flowing from a file into the flow options.

use std::time::Duration;
use stepwise_cli::{survey_flow, CliConfig, Persistence, TerminalRenderer};
use stepwise_core::FlowOptions;
use stepwise_monitoring::LoggingConfig;

const CONFIG: &str = r#"
flow:
  resolve_delay_ms: 25
  step_timeout_ms: 60000
  use_broker: true
logging:
  log_filter: "warn,stepwise_core=debug"
"#;

#[test]
fn test_yaml_config_reaches_flow_options() -> anyhow::Result<()> {
    let config = CliConfig::from_yaml_str(CONFIG)?;
    assert_eq!(
        config.logging,
        LoggingConfig {
            log_filter: "warn,stepwise_core=debug".to_string(),
            ..LoggingConfig::default()
        }
    );

    let options = FlowOptions::builder("configured")
        .config(&config.flow)
        .run(|_| async { Ok(()) })
        .build()?;
    assert_eq!(options.resolve_delay(), Duration::from_millis(25));
    assert_eq!(options.step_timeout(), Some(Duration::from_secs(60)));
    assert!(options.use_broker());
    Ok(())
}

#[tokio::test]
async fn test_survey_follows_the_configured_persistence() -> anyhow::Result<()> {
    let config = CliConfig::from_yaml_str(CONFIG)?;
    let persistence = Persistence::from_config(&config.flow);
    assert!(matches!(persistence, Persistence::Broker { .. }));

    let renderer = TerminalRenderer::new(&b""[..], std::io::sink());
    let flow = survey_flow("configured", &config.flow, &persistence, &renderer)?;
    assert!(flow.options().use_broker());
    assert_eq!(flow.action_names(), vec!["ask", "delay", "end", "show"]);
    Ok(())
}
