//! Flows against a mocked step store.

use serde_json::json;
use std::sync::Arc;
use stepwise_core::{Flow, FlowError};
use stepwise_test_utils::{MockStepStore, ScriptedAction};
use stepwise_tests::questionnaire;

const INTAKE: &[&str] = &["name", "email"];

#[tokio::test]
async fn test_store_sees_every_load_and_save() {
    let mut store = MockStepStore::new();
    store
        .expect_load_step()
        .times(3)
        .returning(|step| Ok((step.key().0 == "intake.name").then(|| json!("Ada"))));
    store
        .expect_save_step()
        .withf(|step| step.is_complete())
        .times(3)
        .returning(|_| Ok(()));

    let script = ScriptedAction::default();
    script.push_keep();
    script.push(json!("ada@example.com"));
    let flow = Flow::factory(
        questionnaire("intake", script.clone(), INTAKE)
            .store(Arc::new(store))
            .build()
            .unwrap(),
    )
    .unwrap();

    flow.start().await.unwrap();

    let asked = script.asked();
    assert_eq!(asked[0], ("name".to_string(), Some(json!("Ada"))));
    assert_eq!(asked[1], ("email".to_string(), None));
}

#[tokio::test]
async fn test_save_failure_stops_the_flow() {
    let mut store = MockStepStore::new();
    store.expect_load_step().returning(|_| Ok(None));
    store
        .expect_save_step()
        .times(1)
        .returning(|_| Err(FlowError::Store("disk full".to_string())));

    let script = ScriptedAction::new([json!("Ada"), json!("ada@example.com")]);
    let flow = Flow::factory(
        questionnaire("intake", script.clone(), INTAKE)
            .store(Arc::new(store))
            .build()
            .unwrap(),
    )
    .unwrap();

    let result = flow.start().await;
    assert_eq!(result, Err(FlowError::Store("disk full".to_string())));
    assert_eq!(script.asked().len(), 1);
}

#[tokio::test]
async fn test_load_failure_surfaces_from_act() {
    let mut store = MockStepStore::new();
    store
        .expect_load_step()
        .returning(|_| Err(FlowError::Store("offline".to_string())));

    let script = ScriptedAction::new([json!("Ada")]);
    let flow = Flow::factory(
        questionnaire("intake", script.clone(), INTAKE)
            .store(Arc::new(store))
            .build()
            .unwrap(),
    )
    .unwrap();

    assert_eq!(flow.start().await, Err(FlowError::Store("offline".to_string())));
    assert!(script.asked().is_empty());
}
