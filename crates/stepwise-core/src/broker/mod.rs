//! Topic-based publish/subscribe with awaitable fan-out.
//!
//! Publishing hands every subscriber the same mutable [`Message`], runs all
//! of them concurrently and resolves once all have settled. Subscribers
//! answer by writing into the message, which is how the step store gets
//! values back from whoever persists them.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::FlowResult;

mod step_store;

pub use step_store::{BrokerStepStore, StepMessage, FLOW_STEP_LOAD, FLOW_STEP_SAVE};

/// Handle returned by [`Broker::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(Message) -> BoxFuture<'static, FlowResult<()>> + Send + Sync>;

/// Payload shared by all subscribers of one publish
#[derive(Debug, Clone)]
pub struct Message {
    topic: Arc<str>,
    data: Arc<Mutex<Value>>,
}

impl Message {
    fn new(topic: &str, data: Value) -> Self {
        Self {
            topic: Arc::from(topic),
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Topic the message was published on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Snapshot of the payload
    pub fn data(&self) -> Value {
        self.data.lock().clone()
    }

    /// Read one field of an object payload
    pub fn get(&self, field: &str) -> Option<Value> {
        self.data.lock().get(field).cloned()
    }

    /// Write one field of an object payload
    pub fn set(&self, field: &str, value: Value) {
        if let Value::Object(members) = &mut *self.data.lock() {
            members.insert(field.to_string(), value);
        }
    }

    /// Replace the payload
    pub fn replace(&self, data: Value) {
        *self.data.lock() = data;
    }

    fn into_data(self) -> Value {
        self.data.lock().take()
    }
}

static SHARED: Lazy<Arc<Broker>> = Lazy::new(|| Arc::new(Broker::new()));

/// Topic registry
#[derive(Default)]
pub struct Broker {
    next_id: AtomicU64,
    topics: RwLock<HashMap<String, Vec<(SubscriptionId, Subscriber)>>>,
}

impl Broker {
    /// Create an isolated broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide broker used by flows that do not bring their own
    pub fn shared() -> Arc<Broker> {
        SHARED.clone()
    }

    /// Subscribe to `topic`; subscribers run in subscription order
    pub fn subscribe<F, Fut>(&self, topic: &str, subscriber: F) -> SubscriptionId
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FlowResult<()>> + Send + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber: Subscriber = Arc::new(move |message| subscriber(message).boxed());
        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .push((id, subscriber));
        debug!(topic, "Broker subscription added");
        id
    }

    /// Remove a subscription from whichever topic holds it
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let mut removed = false;
        for subscribers in topics.values_mut() {
            let before = subscribers.len();
            subscribers.retain(|(subscription, _)| *subscription != id);
            removed |= subscribers.len() != before;
        }
        topics.retain(|_, subscribers| !subscribers.is_empty());
        removed
    }

    /// Number of subscribers on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map(Vec::len).unwrap_or(0)
    }

    /// Publish `data` on `topic` and wait for every subscriber.
    ///
    /// Returns the payload as the subscribers left it. If any subscriber
    /// fails, the first failure is returned after all have settled. Without
    /// subscribers the payload comes back untouched.
    pub async fn publish(&self, topic: &str, data: Value) -> FlowResult<Value> {
        let subscribers: Vec<Subscriber> = match self.topics.read().get(topic) {
            Some(subscribers) => subscribers.iter().map(|(_, s)| s.clone()).collect(),
            None => Vec::new(),
        };
        if subscribers.is_empty() {
            return Ok(data);
        }

        let message = Message::new(topic, data);
        let pending: Vec<_> = subscribers
            .iter()
            .map(|subscriber| subscriber(message.clone()))
            .collect();
        let results = join_all(pending).await;

        if let Some(err) = results.into_iter().find_map(Result::err) {
            warn!(topic, error = %err, "Broker subscriber failed");
            return Err(err);
        }
        Ok(message.into_data())
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self.topics.read();
        f.debug_struct("Broker")
            .field("topics", &topics.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_without_subscribers_returns_payload() {
        let broker = Broker::new();
        let data = broker.publish("nobody", json!({ "value": 1 })).await.unwrap();
        assert_eq!(data, json!({ "value": 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_waits_for_all_subscribers() {
        let broker = Broker::new();
        for (field, delay) in [("slow", 30u64), ("fast", 5)] {
            broker.subscribe("load", move |message: Message| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                message.set(field, json!(true));
                Ok(())
            });
        }

        let data = broker.publish("load", json!({})).await.unwrap();
        assert_eq!(data, json!({ "slow": true, "fast": true }));
    }

    #[tokio::test]
    async fn test_subscribers_share_the_message() {
        let broker = Broker::new();
        broker.subscribe("count", |message: Message| async move {
            let n = message.get("n").and_then(|v| v.as_u64()).unwrap_or(0);
            message.set("n", json!(n + 1));
            Ok(())
        });
        broker.subscribe("count", |message: Message| async move {
            let n = message.get("n").and_then(|v| v.as_u64()).unwrap_or(0);
            message.set("n", json!(n * 10));
            Ok(())
        });

        let data = broker.publish("count", json!({ "n": 1 })).await.unwrap();
        assert_eq!(data, json!({ "n": 20 }));
    }

    #[tokio::test]
    async fn test_first_failure_is_reported_after_all_settle() {
        let broker = Broker::new();
        let ran = Arc::new(AtomicU64::new(0));

        broker.subscribe("save", |_| async { Err(FlowError::Store("disk full".to_string())) });
        let counter = ran.clone();
        broker.subscribe("save", move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let result = broker.publish("save", json!({})).await;
        assert_eq!(result, Err(FlowError::Store("disk full".to_string())));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let broker = Broker::new();
        let id = broker.subscribe("topic", |message: Message| async move {
            message.replace(json!("changed"));
            Ok(())
        });
        assert_eq!(broker.subscriber_count("topic"), 1);
        assert!(broker.unsubscribe(id));
        assert!(!broker.unsubscribe(id));
        assert_eq!(broker.subscriber_count("topic"), 0);
        assert_eq!(broker.publish("topic", json!("same")).await.unwrap(), json!("same"));
    }

    #[test]
    fn test_shared_broker_is_a_singleton() {
        assert!(Arc::ptr_eq(&Broker::shared(), &Broker::shared()));
    }
}
