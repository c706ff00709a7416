//! Flow event recording.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use stepwise_core::{EventSummary, Flow, FlowEvent, ListenerId, Step};
use tokio::sync::mpsc;

/// Records a summary of every event a flow emits
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<EventSummary>>>,
}

impl EventRecorder {
    /// Start recording the events of `flow`
    pub fn attach(flow: &Flow) -> (Self, ListenerId) {
        let recorder = Self::default();
        let sink = recorder.events.clone();
        let id = flow.on(move |event| sink.lock().push(event.summary()));
        (recorder, id)
    }

    /// Every recorded summary, oldest first
    pub fn summaries(&self) -> Vec<EventSummary> {
        self.events.lock().clone()
    }

    /// Recorded event names, oldest first
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|summary| summary.name).collect()
    }

    /// How many times the event `name` was recorded
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|summary| summary.name == name)
            .count()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Receives steps as they start, for tests that drive a flow from outside
pub struct StepWatcher {
    receiver: mpsc::UnboundedReceiver<Step>,
}

impl StepWatcher {
    /// Watch the `step-started` events of `flow`
    pub fn attach(flow: &Flow) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        flow.on(move |event| {
            if let FlowEvent::StepStarted(step) = event {
                let _ = sender.send(step.clone());
            }
        });
        Self { receiver }
    }

    /// Next started step, or `None` once `wait` elapses
    pub async fn next(&mut self, wait: Duration) -> Option<Step> {
        tokio::time::timeout(wait, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }
}
