use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::{FlowError, FlowResult};

/// Value a step resolves with; `None` means "no value" and is never an error
pub type StepValue = Option<Value>;

/// Value object: Flow ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub String);

/// Value object: Step ID, derived from the step's ordinal position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl StepId {
    /// Builds the id for the step at `ordinal`
    pub fn from_ordinal(ordinal: usize) -> Self {
        StepId(format!("wf{:x}", ordinal))
    }
}

/// Value object: Step key, the persistence identity of a step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepKey(pub String);

impl StepKey {
    /// `{flow}.{name}` for explicitly named steps, `{flow}.{name}.{id}` otherwise
    pub fn derive(flow_id: &FlowId, name: &str, id: &StepId, is_given_name: bool) -> Self {
        if is_given_name {
            StepKey(format!("{}.{}", flow_id.0, name))
        } else {
            StepKey(format!("{}.{}.{}", flow_id.0, name, id.0))
        }
    }
}

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_inner!(FlowId, StepId, StepKey);

/// Clones a JSON value keeping only "simple" properties.
///
/// Numbers, strings and booleans are kept, objects and arrays are walked
/// recursively and object members holding `null` are dropped.
pub fn take_simple_properties(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(take_simple_properties).collect()),
        Value::Object(members) => {
            let mut cloned = Map::with_capacity(members.len());
            for (key, member) in members {
                if !member.is_null() {
                    cloned.insert(key.clone(), take_simple_properties(member));
                }
            }
            Value::Object(cloned)
        }
        other => other.clone(),
    }
}

/// Bounds a step future by `after`, mapping expiry to [`FlowError::Timeout`]
pub async fn with_timeout<F, T>(future: F, after: Duration, step: &str) -> FlowResult<T>
where
    F: Future<Output = FlowResult<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(FlowError::Timeout {
            step: step.to_string(),
            after_ms: after.as_millis() as u64,
        }),
    }
}
