//! Key-press fan-out.

use serde::{Deserialize, Serialize};

use crate::domain::notifier::{ListenerId, Notifier};

/// Element that received a key press
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyTarget {
    /// Upper-case element name, e.g. `INPUT`
    pub node_name: String,
    /// The element (or an ancestor) opted out of Enter handling
    #[serde(default)]
    pub prevent_enter: bool,
}

impl KeyTarget {
    /// Target with the given element name
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            prevent_enter: false,
        }
    }

    /// Opt the target out of Enter handling
    pub fn preventing_enter(mut self) -> Self {
        self.prevent_enter = true;
        self
    }

    /// Multi-line text areas consume Enter themselves
    pub fn is_multiline(&self) -> bool {
        self.node_name.eq_ignore_ascii_case("textarea")
    }
}

/// A key press delivered to the hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPress {
    /// Key name, e.g. `Enter`
    pub key: String,
    /// Focused element, if any
    #[serde(default)]
    pub target: Option<KeyTarget>,
}

impl KeyPress {
    /// Key press without a target
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target: None,
        }
    }

    /// Attach the focused element
    pub fn on(mut self, target: KeyTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Enter pressed on a target that does not handle it itself
    pub fn continues_flow(&self) -> bool {
        self.key == "Enter"
            && !self
                .target
                .as_ref()
                .map(|target| target.is_multiline() || target.prevent_enter)
                .unwrap_or(false)
    }
}

/// Delivers key presses to subscribed flows
#[derive(Debug, Default)]
pub struct KeyHub {
    listeners: Notifier<KeyPress>,
}

impl KeyHub {
    /// Create a hub without subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a key press, returning how many listeners saw it
    pub fn dispatch(&self, press: KeyPress) -> usize {
        self.listeners.emit(&press)
    }

    /// Subscribe to key presses
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&KeyPress) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Unsubscribe
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Number of subscribers
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
