//! Back navigation observed from outside the flow.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stepwise_core::{Flow, SessionStepStore, StepState};
use stepwise_test_utils::{assert_step_states, ScriptedAction, StepWatcher};
use stepwise_tests::questionnaire;

const TRIP: &[&str] = &["origin", "destination", "date"];
const WAIT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn test_back_replays_earlier_steps_and_reasks_the_target() {
    let script = ScriptedAction::new([json!("Oslo"), json!("Rome")]);
    let session = SessionStepStore::new();
    let flow = Flow::factory(
        questionnaire("trip", script.clone(), TRIP)
            .store(Arc::new(session.clone()))
            .build()
            .unwrap(),
    )
    .unwrap();
    let mut watcher = StepWatcher::attach(&flow);

    let runner = flow.clone();
    let first_run = tokio::spawn(async move { runner.start().await });
    for expected in TRIP {
        let step = watcher.next(WAIT).await.expect("step started");
        assert_eq!(step.name(), *expected);
    }
    assert_step_states(
        &flow,
        &[StepState::Completed, StepState::Completed, StepState::Running],
    )
    .unwrap();

    let runner = flow.clone();
    let back_run = tokio::spawn(async move { runner.back(Some("destination")).await });
    let origin = watcher.next(WAIT).await.expect("origin replayed");
    let destination = watcher.next(WAIT).await.expect("destination asked again");
    assert_eq!(origin.value(), Some(json!("Oslo")));
    assert_step_states(&flow, &[StepState::Replayed, StepState::Running]).unwrap();

    let snapshot = flow.rerun_snapshot().expect("snapshot kept during the rerun");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].name, "origin");

    script.push(json!("May 1"));
    assert!(destination.resolve(Some(json!("Paris"))));

    first_run.await.unwrap().unwrap();
    back_run.await.unwrap().unwrap();

    let asked: Vec<String> = script.asked().into_iter().map(|(name, _)| name).collect();
    assert_eq!(asked, vec!["origin", "destination", "date", "destination", "date"]);
    assert_eq!(script.asked()[3].1, Some(json!("Rome")));
    assert_eq!(session.get("trip.destination"), Some(json!("Paris")));
    assert_eq!(session.get("trip.date"), Some(json!("May 1")));
    assert!(flow.steps().is_empty());
}
