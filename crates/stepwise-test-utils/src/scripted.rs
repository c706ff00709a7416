//! Scripted action handlers.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use stepwise_core::{ActionHandler, Flow, FlowResult, Step};

/// Answers each step with the next scripted value.
///
/// When the script runs dry the step stays pending until something else
/// resolves it. Clones share the script and the log of asked steps.
#[derive(Clone, Default)]
pub struct ScriptedAction {
    answers: Arc<Mutex<VecDeque<Option<Value>>>>,
    asked: Arc<Mutex<Vec<(String, Option<Value>)>>>,
}

impl ScriptedAction {
    /// Script answering with `answers` in order
    pub fn new(answers: impl IntoIterator<Item = Value>) -> Self {
        let action = Self::default();
        action.answers.lock().extend(answers.into_iter().map(Some));
        action
    }

    /// Queue another answer
    pub fn push(&self, answer: Value) {
        self.answers.lock().push_back(Some(answer));
    }

    /// Queue an answer that keeps whatever value the step already holds
    pub fn push_keep(&self) {
        self.answers.lock().push_back(None);
    }

    /// Names of the steps answered so far, with the value each held on entry
    pub fn asked(&self) -> Vec<(String, Option<Value>)> {
        self.asked.lock().clone()
    }

    /// Answers not yet consumed
    pub fn remaining(&self) -> usize {
        self.answers.lock().len()
    }
}

#[async_trait]
impl ActionHandler for ScriptedAction {
    async fn handle(&self, _flow: Flow, step: Step) -> FlowResult<()> {
        let held = step.value();
        self.asked.lock().push((step.name().to_string(), held.clone()));

        let next = self.answers.lock().pop_front();
        match next {
            Some(Some(answer)) => {
                step.resolve(Some(answer));
            }
            Some(None) => {
                step.resolve(held);
            }
            None => {}
        }
        Ok(())
    }
}
