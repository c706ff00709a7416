//! In-memory step archive
//!
//! Answers `flow-step-load` from, and persists `flow-step-save` into, a map
//! partitioned by scope (the flow id) and store key.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use stepwise_core::broker::{FLOW_STEP_LOAD, FLOW_STEP_SAVE};
use stepwise_core::{Broker, FlowResult, Message, StepMessage, SubscriptionId};

/// Which saves the archive accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
    /// Persist every save
    #[default]
    Always,
    /// Persist only saves whose value changed
    OnlyModified,
}

/// A value held by the archive
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedValue {
    /// The stored JSON value
    pub value: Value,
    /// Wall-clock time of the save
    pub saved_at: DateTime<Utc>,
}

struct Entry {
    archived: ArchivedValue,
    stored: Instant,
}

type Scopes = HashMap<String, HashMap<String, Entry>>;

/// Subscriptions created by [`InMemoryStepArchive::attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSubscription {
    /// Subscription on `flow-step-load`
    pub load: SubscriptionId,
    /// Subscription on `flow-step-save`
    pub save: SubscriptionId,
}

/// Broker subscriber keeping step values in memory
pub struct InMemoryStepArchive {
    /// Map of scope -> (key -> entry)
    state: Arc<RwLock<Scopes>>,
    policy: SavePolicy,
    ttl: Option<Duration>,
}

impl InMemoryStepArchive {
    /// Create an empty archive that persists every save
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(HashMap::new())),
            policy: SavePolicy::default(),
            ttl: None,
        }
    }

    /// Choose which saves are persisted
    pub fn with_policy(mut self, policy: SavePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Forget values older than `ttl`
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Subscribe the archive to the step topics of `broker`
    pub fn attach(self: &Arc<Self>, broker: &Broker) -> ArchiveSubscription {
        let archive = self.clone();
        let load = broker.subscribe(FLOW_STEP_LOAD, move |message| {
            let archive = archive.clone();
            async move { archive.handle_load(message).await }
        });

        let archive = self.clone();
        let save = broker.subscribe(FLOW_STEP_SAVE, move |message| {
            let archive = archive.clone();
            async move { archive.handle_save(message).await }
        });

        info!("In-memory step archive attached");
        ArchiveSubscription { load, save }
    }

    /// Remove the subscriptions created by [`attach`](Self::attach)
    pub fn detach(broker: &Broker, subscription: ArchiveSubscription) {
        broker.unsubscribe(subscription.load);
        broker.unsubscribe(subscription.save);
    }

    /// Read a live value
    pub async fn get(&self, scope: &str, key: &str) -> Option<Value> {
        self.entry(scope, key).await.map(|archived| archived.value)
    }

    /// Read a live value with its metadata
    pub async fn entry(&self, scope: &str, key: &str) -> Option<ArchivedValue> {
        let state = self.state.read().await;
        let entry = state.get(scope)?.get(key)?;
        if self.is_expired(entry) {
            return None;
        }
        Some(entry.archived.clone())
    }

    /// Store a value directly, e.g. to seed a scope
    pub async fn set(&self, scope: &str, key: &str, value: Value) {
        let mut state = self.state.write().await;
        state.entry(scope.to_string()).or_default().insert(
            key.to_string(),
            Entry {
                archived: ArchivedValue {
                    value,
                    saved_at: Utc::now(),
                },
                stored: Instant::now(),
            },
        );
        debug!(scope, key, "Archived step value");
    }

    /// Remove a value
    pub async fn remove(&self, scope: &str, key: &str) -> Option<Value> {
        let mut state = self.state.write().await;
        let scope_map = state.get_mut(scope)?;
        let removed = scope_map.remove(key).map(|entry| entry.archived.value);
        if scope_map.is_empty() {
            state.remove(scope);
        }
        removed
    }

    /// Live keys of a scope, sorted
    pub async fn keys(&self, scope: &str) -> Vec<String> {
        let state = self.state.read().await;
        let mut keys: Vec<String> = state
            .get(scope)
            .map(|scope_map| {
                scope_map
                    .iter()
                    .filter(|(_, entry)| !self.is_expired(entry))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Drop every value of a scope
    pub async fn clear_scope(&self, scope: &str) {
        self.state.write().await.remove(scope);
        debug!(scope, "Cleared archive scope");
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        match self.ttl {
            Some(ttl) => entry.stored.elapsed() >= ttl,
            None => false,
        }
    }

    async fn handle_load(&self, message: Message) -> FlowResult<()> {
        let request: StepMessage = serde_json::from_value(message.data())?;
        if let Some(value) = self.get(&request.scope, &request.key).await {
            debug!(scope = %request.scope, key = %request.key, "Answering step load");
            message.set("value", value);
        }
        Ok(())
    }

    async fn handle_save(&self, message: Message) -> FlowResult<()> {
        let save: StepMessage = serde_json::from_value(message.data())?;
        if self.policy == SavePolicy::OnlyModified && !save.is_modified {
            debug!(scope = %save.scope, key = %save.key, "Skipping unmodified step value");
            return Ok(());
        }

        match save.value {
            Some(value) => self.set(&save.scope, &save.key, value).await,
            None => {
                self.remove(&save.scope, &save.key).await;
            }
        }
        Ok(())
    }
}

impl Default for InMemoryStepArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStepArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStepArchive")
            .field("policy", &self.policy)
            .field("ttl", &self.ttl)
            .finish()
    }
}
