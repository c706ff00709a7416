use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::Broker;
use crate::domain::step::Step;
use crate::domain::store::StepStore;
use crate::error::FlowResult;
use crate::types::StepValue;

/// Topic asked to fill in a step's persisted value
pub const FLOW_STEP_LOAD: &str = "flow-step-load";

/// Topic told to persist a step's value
pub const FLOW_STEP_SAVE: &str = "flow-step-save";

/// Payload of the step load/save topics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMessage {
    /// Flow id
    pub scope: String,
    /// Store key from the step options
    pub key: String,
    /// Value being saved, or the slot a loader fills in
    #[serde(default)]
    pub value: StepValue,
    /// Whether completion changed the value (saves only)
    #[serde(default)]
    pub is_modified: bool,
}

/// Step store that delegates persistence to broker subscribers.
///
/// Only steps with a `store` option take part; others load nothing and save
/// nothing. Operations on the same scope and key are serialized.
#[derive(Debug)]
pub struct BrokerStepStore {
    broker: Arc<Broker>,
    in_flight: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl BrokerStepStore {
    /// Store publishing on `broker`
    pub fn new(broker: Arc<Broker>) -> Self {
        Self {
            broker,
            in_flight: DashMap::new(),
        }
    }

    /// Broker the store publishes on
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    fn lock_for(&self, scope: &str, key: &str) -> Arc<AsyncMutex<()>> {
        self.in_flight
            .entry(format!("{}:{}", scope, key))
            .or_default()
            .clone()
    }
}

#[async_trait]
impl StepStore for BrokerStepStore {
    async fn load_step(&self, step: &Step) -> FlowResult<StepValue> {
        let Some(key) = step.options().store else {
            return Ok(None);
        };
        let scope = step.flow_id().0.clone();
        let lock = self.lock_for(&scope, &key);
        let _guard = lock.lock().await;

        let request = StepMessage {
            scope,
            key,
            value: step.value(),
            is_modified: false,
        };
        debug!(scope = %request.scope, key = %request.key, "Loading step through broker");
        let reply = self
            .broker
            .publish(FLOW_STEP_LOAD, serde_json::to_value(&request)?)
            .await?;
        let reply: StepMessage = serde_json::from_value(reply)?;
        Ok(reply.value)
    }

    async fn save_step(&self, step: &Step) -> FlowResult<()> {
        let Some(key) = step.options().store else {
            return Ok(());
        };
        let scope = step.flow_id().0.clone();
        let lock = self.lock_for(&scope, &key);
        let _guard = lock.lock().await;

        let message = StepMessage {
            scope,
            key,
            value: step.value(),
            is_modified: step.has_changed_value(),
        };
        debug!(
            scope = %message.scope,
            key = %message.key,
            is_modified = message.is_modified,
            "Saving step through broker"
        );
        self.broker
            .publish(FLOW_STEP_SAVE, serde_json::to_value(&message)?)
            .await?;
        Ok(())
    }
}
