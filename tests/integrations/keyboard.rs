//! Enter presses continuing a flow through its key hub.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stepwise_core::{
    handler_fn, Flow, FlowEvent, FlowOptions, KeyHub, KeyPress, KeyTarget, Step, StepEvent,
    StepOptions, StepState,
};
use stepwise_test_utils::{EventRecorder, StepWatcher};

/// Message step resolved by a continue request
fn notice(hub: Arc<KeyHub>) -> Flow {
    let options = FlowOptions::builder("notice")
        .resolve_delay(Duration::ZERO)
        .key_hub(hub)
        .action(
            "show",
            handler_fn(|_flow: Flow, step: Step| async move {
                step.on(|event| match event {
                    StepEvent::ContinueRequest(request) => {
                        let _ = request.continue_step();
                    }
                });
                Ok(())
            }),
            StepOptions::new(),
        )
        .run(|flow| async move {
            flow.act("show", json!("Terms updated"), StepOptions::new()).await?;
            Ok(())
        })
        .build()
        .unwrap();
    let flow = Flow::factory(options).unwrap();

    let continuing = flow.clone();
    flow.on(move |event| {
        if let FlowEvent::EnterDetected(_) = event {
            continuing.request_resolve();
        }
    });
    flow
}

#[tokio::test]
async fn test_enter_continues_until_the_flow_ends() {
    let hub = Arc::new(KeyHub::new());
    let flow = notice(hub.clone());
    let (recorder, _) = EventRecorder::attach(&flow);
    let mut watcher = StepWatcher::attach(&flow);
    assert_eq!(hub.listener_count(), 1);

    let runner = flow.clone();
    let run = tokio::spawn(async move { runner.start().await });
    let step = watcher.next(Duration::from_secs(1)).await.expect("notice shown");
    assert_eq!(step.state(), StepState::Running);

    hub.dispatch(KeyPress::new("Enter").on(KeyTarget::new("textarea")));
    hub.dispatch(KeyPress::new("Enter").on(KeyTarget::new("input").preventing_enter()));
    hub.dispatch(KeyPress::new("Escape"));
    assert_eq!(step.state(), StepState::Running);
    assert_eq!(recorder.count("enter-detected"), 0);

    hub.dispatch(KeyPress::new("Enter").on(KeyTarget::new("input")));
    run.await.unwrap().unwrap();

    assert_eq!(recorder.count("enter-detected"), 1);
    assert_eq!(recorder.count("flow-ended"), 1);
    assert_eq!(step.state(), StepState::Completed);
    assert_eq!(hub.listener_count(), 0);
}
