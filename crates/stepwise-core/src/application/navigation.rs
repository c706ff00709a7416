//! Mirrors flow steps into a navigation history.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

use crate::application::flow::Flow;
use crate::domain::events::FlowEvent;
use crate::domain::notifier::ListenerId;

/// One history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Step id the entry belongs to
    pub step: String,
    /// Caller state stored with the entry
    pub state: Value,
    /// Location of the entry
    pub url: String,
}

/// Session history the navigation adapter writes to
pub trait History: Send + Sync {
    /// Add an entry
    fn push_state(&self, entry: HistoryEntry);

    /// Replace the current entry
    fn replace_state(&self, entry: HistoryEntry);

    /// Current location, e.g. `/survey?step=color`
    fn location(&self) -> String;
}

#[derive(Debug, Default)]
struct MemoryHistoryState {
    entries: Vec<HistoryEntry>,
    position: Option<usize>,
}

/// In-process [`History`] with back/forward traversal
#[derive(Debug)]
pub struct MemoryHistory {
    initial_location: String,
    state: Mutex<MemoryHistoryState>,
}

impl MemoryHistory {
    /// History whose location starts at `location`
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            initial_location: location.into(),
            state: Mutex::new(MemoryHistoryState::default()),
        }
    }

    /// Step back; returns the entry to restore
    pub fn back(&self) -> Option<HistoryEntry> {
        let mut state = self.state.lock();
        let position = state.position?.checked_sub(1)?;
        state.position = Some(position);
        state.entries.get(position).cloned()
    }

    /// Step forward; returns the entry to restore
    pub fn forward(&self) -> Option<HistoryEntry> {
        let mut state = self.state.lock();
        let position = state.position? + 1;
        let entry = state.entries.get(position).cloned()?;
        state.position = Some(position);
        Some(entry)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True before the first push
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl History for MemoryHistory {
    fn push_state(&self, entry: HistoryEntry) {
        let mut state = self.state.lock();
        let keep = state.position.map(|p| p + 1).unwrap_or(0);
        state.entries.truncate(keep);
        state.entries.push(entry);
        state.position = Some(state.entries.len() - 1);
    }

    fn replace_state(&self, entry: HistoryEntry) {
        let mut state = self.state.lock();
        match state.position {
            Some(position) => state.entries[position] = entry,
            None => {
                state.entries.push(entry);
                state.position = Some(0);
            }
        }
    }

    fn location(&self) -> String {
        let state = self.state.lock();
        state
            .position
            .and_then(|position| state.entries.get(position))
            .map(|entry| entry.url.clone())
            .unwrap_or_else(|| self.initial_location.clone())
    }
}

type StepChangeFn = Arc<dyn Fn(&str, &Value) + Send + Sync>;

#[derive(Debug, Default)]
struct NavState {
    steps: Vec<String>,
    current: Option<String>,
}

/// Keeps a history entry per visited step and restores steps on pop.
pub struct FlowNav {
    history: Arc<dyn History>,
    base_url: String,
    on_step_change: StepChangeFn,
    state: Mutex<NavState>,
}

impl FlowNav {
    /// Adapter writing `{base_url}?step={id}` entries to `history`.
    ///
    /// If the current location already names a step, that step is restored.
    pub fn new<F>(history: Arc<dyn History>, base_url: impl Into<String>, on_step_change: F) -> Arc<Self>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let nav = Arc::new(Self {
            history,
            base_url: base_url.into(),
            on_step_change: Arc::new(on_step_change),
            state: Mutex::new(NavState::default()),
        });

        match nav.step_from_url() {
            Some(step) => nav.restore_step(&step),
            None => {
                let first = nav.state.lock().steps.first().cloned();
                if let Some(first) = first {
                    nav.go_to_step(&first, Value::Null, false, true);
                }
            }
        }
        nav
    }

    /// Remember a step id
    pub fn register_step(&self, step: &str) {
        let mut state = self.state.lock();
        if !state.steps.iter().any(|known| known == step) {
            state.steps.push(step.to_string());
        }
    }

    /// Known step ids, in registration order
    pub fn steps(&self) -> Vec<String> {
        self.state.lock().steps.clone()
    }

    /// Step the adapter considers current
    pub fn current_step(&self) -> Option<String> {
        self.state.lock().current.clone()
    }

    /// Location of the entry for `step`
    pub fn url_for(&self, step: &str) -> String {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("step", step)
            .finish();
        format!("{}?{}", self.base_url, query)
    }

    /// Step id named by the current location
    pub fn step_from_url(&self) -> Option<String> {
        let location = self.history.location();
        let (_, query) = location.split_once('?')?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "step")
            .map(|(_, value)| value.into_owned())
            .filter(|step| !step.is_empty())
    }

    /// Make `step` current, writing a history entry and optionally signalling
    pub fn go_to_step(&self, step: &str, state: Value, push: bool, signal: bool) {
        let entry = HistoryEntry {
            step: step.to_string(),
            state: state.clone(),
            url: self.url_for(step),
        };
        if push {
            self.history.push_state(entry);
        } else {
            self.history.replace_state(entry);
        }
        self.state.lock().current = Some(step.to_string());
        debug!(step, push, "Navigated to step");

        if signal {
            (self.on_step_change)(step, &state);
        }
    }

    /// Restore a known step without adding a history entry
    pub fn restore_step(&self, step: &str) {
        if self.state.lock().steps.iter().any(|known| known == step) {
            self.go_to_step(step, Value::Null, false, true);
        } else {
            debug!(step, "Ignoring restore of unknown step");
        }
    }

    /// Handle a pop event, e.g. from [`MemoryHistory::back`]
    pub fn on_pop(&self, entry: Option<&HistoryEntry>) {
        let step = match entry {
            Some(entry) => Some(entry.step.clone()),
            None => self.step_from_url(),
        };
        if let Some(step) = step {
            if self.state.lock().steps.iter().any(|known| *known == step) {
                let state = entry.map(|e| e.state.clone()).unwrap_or(Value::Null);
                self.state.lock().current = Some(step.clone());
                (self.on_step_change)(&step, &state);
            }
        }
    }

    /// Register and push every step `flow` starts
    pub fn follow(self: &Arc<Self>, flow: &Flow) -> ListenerId {
        let nav = Arc::downgrade(self);
        flow.on(move |event| {
            if let (FlowEvent::StepStarted(step), Some(nav)) = (event, nav.upgrade()) {
                let key = step.key().to_string();
                nav.register_step(&key);
                nav.go_to_step(&key, Value::Null, true, false);
            }
        })
    }
}

impl fmt::Debug for FlowNav {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowNav")
            .field("base_url", &self.base_url)
            .field("state", &*self.state.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str, &Value) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |step: &str, _: &Value| sink.lock().push(step.to_string()))
    }

    #[test]
    fn test_url_is_percent_encoded() {
        let history = Arc::new(MemoryHistory::new("/survey"));
        let nav = FlowNav::new(history, "/survey", |_, _| {});
        assert_eq!(nav.url_for("survey.ask wf1&x"), "/survey?step=survey.ask+wf1%26x");
    }

    #[test]
    fn test_go_to_step_pushes_and_signals() {
        let history = Arc::new(MemoryHistory::new("/survey"));
        let (seen, on_change) = recorder();
        let nav = FlowNav::new(history.clone(), "/survey", on_change);

        nav.register_step("color");
        nav.go_to_step("color", json!({ "n": 1 }), true, true);
        assert_eq!(history.len(), 1);
        assert_eq!(history.location(), "/survey?step=color");
        assert_eq!(nav.step_from_url().as_deref(), Some("color"));
        assert_eq!(*seen.lock(), vec!["color"]);
    }

    #[test]
    fn test_pop_restores_known_steps() {
        let history = Arc::new(MemoryHistory::new("/survey"));
        let (seen, on_change) = recorder();
        let nav = FlowNav::new(history.clone(), "/survey", on_change);

        for step in ["name", "color"] {
            nav.register_step(step);
            nav.go_to_step(step, Value::Null, true, false);
        }
        let entry = history.back();
        nav.on_pop(entry.as_ref());

        assert_eq!(nav.current_step().as_deref(), Some("name"));
        assert_eq!(*seen.lock(), vec!["name"]);
        assert_eq!(history.forward().map(|e| e.step).as_deref(), Some("color"));
    }

    #[test]
    fn test_initial_url_step_is_not_restored_unless_known() {
        let history = Arc::new(MemoryHistory::new("/survey?step=color"));
        let (seen, on_change) = recorder();
        let nav = FlowNav::new(history, "/survey", on_change);

        assert_eq!(nav.step_from_url().as_deref(), Some("color"));
        assert!(seen.lock().is_empty());
        nav.register_step("color");
        nav.restore_step("color");
        assert_eq!(*seen.lock(), vec!["color"]);
    }

    #[test]
    fn test_push_after_back_drops_forward_entries() {
        let history = MemoryHistory::new("/");
        for step in ["a", "b", "c"] {
            history.push_state(HistoryEntry {
                step: step.to_string(),
                state: Value::Null,
                url: format!("/?step={}", step),
            });
        }
        history.back();
        history.push_state(HistoryEntry {
            step: "d".to_string(),
            state: Value::Null,
            url: "/?step=d".to_string(),
        });
        assert_eq!(history.len(), 3);
        assert_eq!(history.forward(), None);
        assert_eq!(history.location(), "/?step=d");
    }
}
