//! Step values travelling through the broker into the in-memory archive.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use stepwise_core::{Broker, Flow, FlowResult};
use stepwise_state_inmemory::{InMemoryStepArchive, SavePolicy};
use stepwise_test_utils::{EventRecorder, ScriptedAction};
use stepwise_tests::questionnaire;

const PROFILE: &[&str] = &["name", "color"];

#[tokio::test]
async fn test_answers_survive_into_a_new_flow() -> FlowResult<()> {
    let broker = Arc::new(Broker::new());
    let archive = Arc::new(InMemoryStepArchive::new().with_policy(SavePolicy::OnlyModified));
    archive.attach(&broker);

    let first = ScriptedAction::new([json!("Ada"), json!("green")]);
    let flow = Flow::factory(
        questionnaire("profile", first.clone(), PROFILE)
            .use_broker(true)
            .broker(broker.clone())
            .build()?,
    )?;
    let (recorder, _) = EventRecorder::attach(&flow);
    flow.start().await?;

    assert_eq!(recorder.count("step-complete"), 3);
    assert_eq!(recorder.count("flow-ended"), 1);
    assert_eq!(first.asked(), vec![("name".to_string(), None), ("color".to_string(), None)]);
    let saved_name = archive.entry("profile", "name").await.expect("name archived");

    let second = ScriptedAction::default();
    second.push_keep();
    second.push(json!("blue"));
    let flow = Flow::factory(
        questionnaire("profile", second.clone(), PROFILE)
            .use_broker(true)
            .broker(broker.clone())
            .build()?,
    )?;
    flow.start().await?;

    assert_eq!(
        second.asked(),
        vec![
            ("name".to_string(), Some(json!("Ada"))),
            ("color".to_string(), Some(json!("green"))),
        ]
    );
    // unchanged answers are not re-archived under OnlyModified
    let name = archive.entry("profile", "name").await.expect("name archived");
    assert_eq!(name.saved_at, saved_name.saved_at);
    assert_eq!(archive.get("profile", "color").await, Some(json!("blue")));
    assert_eq!(archive.keys("profile").await, vec!["color", "name"]);
    Ok(())
}

#[tokio::test]
async fn test_scopes_keep_flows_apart() -> FlowResult<()> {
    let broker = Arc::new(Broker::new());
    let archive = Arc::new(InMemoryStepArchive::new());
    archive.attach(&broker);

    for (id, answer) in [("work", "Grace"), ("home", "Ada")] {
        let flow = Flow::factory(
            questionnaire(id, ScriptedAction::new([json!(answer)]), &["name"])
                .use_broker(true)
                .broker(broker.clone())
                .build()?,
        )?;
        flow.start().await?;
    }

    assert_eq!(archive.get("work", "name").await, Some(json!("Grace")));
    assert_eq!(archive.get("home", "name").await, Some(json!("Ada")));
    Ok(())
}

#[tokio::test]
async fn test_flows_without_a_broker_use_the_shared_one() -> FlowResult<()> {
    let archive = Arc::new(InMemoryStepArchive::new());
    let subscription = archive.attach(&Broker::shared());

    let flow = Flow::factory(
        questionnaire("shared-broker-check", ScriptedAction::new([json!(42)]), &["answer"])
            .use_broker(true)
            .build()?,
    )?;
    flow.start().await?;

    assert_eq!(archive.get("shared-broker-check", "answer").await, Some(json!(42)));
    InMemoryStepArchive::detach(&Broker::shared(), subscription);
    Ok(())
}
