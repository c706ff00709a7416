use async_trait::async_trait;

use crate::domain::step::Step;
use crate::error::FlowResult;
use crate::types::StepValue;

/// Persistence strategy for step values
#[async_trait]
pub trait StepStore: Send + Sync {
    /// Load the persisted value of `step`; `None` when nothing was stored
    async fn load_step(&self, step: &Step) -> FlowResult<StepValue>;

    /// Persist the current value of `step`
    async fn save_step(&self, step: &Step) -> FlowResult<()>;
}

/// Session-scoped store
pub mod session {
    use super::*;
    use dashmap::DashMap;
    use serde_json::Value;
    use std::sync::Arc;
    use tracing::trace;

    /// Keeps step values in memory, keyed by step key.
    ///
    /// Clones share the same map, so one store can outlive several flows of
    /// the same session.
    #[derive(Debug, Clone, Default)]
    pub struct SessionStepStore {
        values: Arc<DashMap<String, Value>>,
    }

    impl SessionStepStore {
        /// Create an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Read a stored value
        pub fn get(&self, key: &str) -> Option<Value> {
            self.values.get(key).map(|entry| entry.value().clone())
        }

        /// Seed a value
        pub fn insert(&self, key: impl Into<String>, value: Value) {
            self.values.insert(key.into(), value);
        }

        /// Number of stored values
        pub fn len(&self) -> usize {
            self.values.len()
        }

        /// True when nothing is stored
        pub fn is_empty(&self) -> bool {
            self.values.is_empty()
        }
    }

    #[async_trait]
    impl StepStore for SessionStepStore {
        async fn load_step(&self, step: &Step) -> FlowResult<StepValue> {
            Ok(self.get(&step.key().0))
        }

        async fn save_step(&self, step: &Step) -> FlowResult<()> {
            if let Some(value) = step.value() {
                trace!(step = %step.key(), "Saving step value to session store");
                self.values.insert(step.key().0.clone(), value);
            }
            Ok(())
        }
    }
}

pub use session::SessionStepStore;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::step_options::StepOptions;
    use crate::types::FlowId;
    use serde_json::json;

    #[tokio::test]
    async fn test_session_store_load_missing_is_none() {
        let store = SessionStepStore::new();
        let step = Step::new(&FlowId("f".to_string()), 0, "ask", json!(null), StepOptions::new());
        assert_eq!(store.load_step(&step).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_store_skips_missing_values() {
        let store = SessionStepStore::new();
        let step = Step::new(&FlowId("f".to_string()), 0, "ask", json!(null), StepOptions::new());
        store.save_step(&step).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_session_store_clones_share_values() {
        let store = SessionStepStore::new();
        let other = store.clone();
        store.insert("f.color", json!("red"));

        let step = Step::new(
            &FlowId("f".to_string()),
            0,
            "ask",
            json!(null),
            StepOptions::new().named("color"),
        );
        assert_eq!(other.load_step(&step).await.unwrap(), Some(json!("red")));
        assert_eq!(other.len(), 1);
    }
}
