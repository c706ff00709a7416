//! Shared fixtures for the Stepwise integration tests.

use serde_json::json;
use std::time::Duration;
use stepwise_core::{FlowOptions, FlowOptionsBuilder, StepOptions};
use stepwise_test_utils::ScriptedAction;

/// Options for a flow that asks each of `questions` in turn through `ask`.
///
/// Every step is named and stored under its question, and steps complete
/// without the resolve delay.
pub fn questionnaire(id: &str, ask: ScriptedAction, questions: &'static [&'static str]) -> FlowOptionsBuilder {
    FlowOptions::builder(id)
        .resolve_delay(Duration::ZERO)
        .action("ask", ask, StepOptions::new())
        .run(move |flow| async move {
            for question in questions {
                flow.act(
                    "ask",
                    json!(format!("{}?", question)),
                    StepOptions::new().named(*question).store(*question),
                )
                .await?;
            }
            Ok(())
        })
}
