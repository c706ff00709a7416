//! Demo survey flow

use serde_json::{json, Value};
use std::sync::Arc;
use stepwise_core::{
    Broker, Flow, FlowConfig, FlowOptions, FlowResult, SessionStepStore, StepOptions, StepValue,
};
use stepwise_state_inmemory::InMemoryStepArchive;

use crate::renderer::TerminalRenderer;

/// Where survey answers are persisted
#[derive(Debug, Clone)]
pub enum Persistence {
    /// Session store shared by every flow built with it
    Session(SessionStepStore),
    /// Broker-mediated store answered by an in-memory archive
    Broker {
        /// Broker the flow publishes on
        broker: Arc<Broker>,
        /// Archive subscribed to it
        archive: Arc<InMemoryStepArchive>,
    },
}

impl Persistence {
    /// Pick the strategy the configuration asks for
    pub fn from_config(config: &FlowConfig) -> Self {
        if config.use_broker {
            let broker = Arc::new(Broker::new());
            let archive = Arc::new(InMemoryStepArchive::new());
            archive.attach(&broker);
            Persistence::Broker { broker, archive }
        } else {
            Persistence::Session(SessionStepStore::new())
        }
    }
}

/// Flow asking for a name and a favourite colour
pub fn survey_flow(
    id: &str,
    config: &FlowConfig,
    persistence: &Persistence,
    renderer: &Arc<TerminalRenderer>,
) -> FlowResult<Flow> {
    let builder = FlowOptions::builder(id)
        .config(config)
        .string("continue", "continue")
        .action("ask", renderer.ask_action(), StepOptions::new())
        .action("show", renderer.show_action(), StepOptions::new().back_target(false))
        .run(|flow| async move {
            flow.act("show", json!("Welcome to the survey."), StepOptions::new())
                .await?;
            let name = flow
                .act(
                    "ask",
                    json!("What is your name?"),
                    StepOptions::new().named("name").store("name"),
                )
                .await?;
            let color = flow
                .act(
                    "ask",
                    json!("Favourite colour?"),
                    StepOptions::new()
                        .named("color")
                        .store("color")
                        .transform_out(|value| match value {
                            Value::String(text) => Value::String(text.to_lowercase()),
                            other => other,
                        }),
                )
                .await?;
            flow.act(
                "show",
                json!(format!("Thanks {}, {} it is.", answer(&name), answer(&color))),
                StepOptions::new(),
            )
            .await?;
            flow.end().await?;
            Ok(())
        });

    let builder = match persistence {
        Persistence::Session(store) => builder.store(Arc::new(store.clone())),
        Persistence::Broker { broker, .. } => builder.use_broker(true).broker(broker.clone()),
    };
    Flow::factory(builder.build()?)
}

fn answer(value: &StepValue) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => "stranger".to_string(),
    }
}
