#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use stepwise_core::{handler_fn, ActionHandler, Flow, FlowEvent, Step};
use tokio::sync::mpsc;

/// Scripted answers for an `ask` action; an empty script leaves steps pending
#[derive(Clone, Default)]
pub struct Script {
    answers: Arc<Mutex<VecDeque<Value>>>,
    asked: Arc<Mutex<Vec<String>>>,
    seen_values: Arc<Mutex<Vec<Option<Value>>>>,
}

impl Script {
    pub fn new(answers: impl IntoIterator<Item = Value>) -> Self {
        let script = Self::default();
        script.answers.lock().extend(answers);
        script
    }

    pub fn answer(&self, value: Value) {
        self.answers.lock().push_back(value);
    }

    /// Names of the steps the handler ran for
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }

    /// Values the steps held when the handler ran (loaded values)
    pub fn seen_values(&self) -> Vec<Option<Value>> {
        self.seen_values.lock().clone()
    }

    pub fn ask_action(&self) -> impl ActionHandler + 'static {
        let script = self.clone();
        handler_fn(move |_flow: Flow, step: Step| {
            let script = script.clone();
            async move {
                script.asked.lock().push(step.name().to_string());
                script.seen_values.lock().push(step.value());
                let answer = script.answers.lock().pop_front();
                if let Some(answer) = answer {
                    step.resolve(Some(answer));
                }
                Ok(())
            }
        })
    }
}

/// Names of every event the flow emits
pub fn record_events(flow: &Flow) -> Arc<Mutex<Vec<String>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    flow.on(move |event| sink.lock().push(event.name().to_string()));
    events
}

/// Channel receiving every started step
pub fn started_steps(flow: &Flow) -> mpsc::UnboundedReceiver<Step> {
    let (tx, rx) = mpsc::unbounded_channel();
    flow.on(move |event| {
        if let FlowEvent::StepStarted(step) = event {
            let _ = tx.send(step.clone());
        }
    });
    rx
}

pub fn count(events: &Arc<Mutex<Vec<String>>>, name: &str) -> usize {
    events.lock().iter().filter(|event| event.as_str() == name).count()
}

/// Route engine logs to the test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("stepwise_core=debug")
        .with_test_writer()
        .try_init();
}
