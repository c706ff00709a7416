//! Navigation history following a running flow.

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use stepwise_core::{Flow, FlowNav, History, MemoryHistory};
use stepwise_test_utils::ScriptedAction;
use stepwise_tests::questionnaire;

#[tokio::test]
async fn test_history_tracks_started_steps_and_pops_back() {
    let history = Arc::new(MemoryHistory::new("/checkout"));
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    let nav = FlowNav::new(history.clone(), "/checkout", move |step: &str, state: &Value| {
        sink.lock().push((step.to_string(), state.clone()));
    });

    let flow = Flow::factory(
        questionnaire(
            "checkout",
            ScriptedAction::new([json!("1 Main St"), json!("card")]),
            &["address", "payment"],
        )
        .build()
        .unwrap(),
    )
    .unwrap();
    let listener = nav.follow(&flow);

    flow.start().await.unwrap();
    assert!(flow.off(listener));

    assert_eq!(
        nav.steps(),
        vec!["checkout.address", "checkout.payment", "checkout.end.wf2"]
    );
    assert_eq!(history.len(), 3);
    assert_eq!(history.location(), "/checkout?step=checkout.end.wf2");
    assert!(changes.lock().is_empty());

    let entry = history.back();
    nav.on_pop(entry.as_ref());

    assert_eq!(nav.current_step().as_deref(), Some("checkout.payment"));
    assert_eq!(history.location(), "/checkout?step=checkout.payment");
    assert_eq!(*changes.lock(), vec![("checkout.payment".to_string(), Value::Null)]);
}

#[tokio::test]
async fn test_pop_to_unknown_step_is_ignored() {
    let history = Arc::new(MemoryHistory::new("/checkout?step=elsewhere"));
    let changes = Arc::new(Mutex::new(0usize));
    let sink = changes.clone();
    let nav = FlowNav::new(history, "/checkout", move |_: &str, _: &Value| *sink.lock() += 1);

    nav.on_pop(None);
    assert_eq!(nav.current_step(), None);
    assert_eq!(*changes.lock(), 0);
}
