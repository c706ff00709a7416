//! Structural step configuration.

use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::types::take_simple_properties;

/// Value transform applied at the step boundary
pub type TransformFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Inbound/outbound value transforms
#[derive(Clone, Default)]
pub struct Transform {
    /// Applied to a loaded value before it becomes the step value
    pub inbound: Option<TransformFn>,
    /// Applied to the resolution value before it is committed
    pub outbound: Option<TransformFn>,
}

impl Transform {
    fn merged_over(&self, base: &Transform) -> Transform {
        Transform {
            inbound: self.inbound.clone().or_else(|| base.inbound.clone()),
            outbound: self.outbound.clone().or_else(|| base.outbound.clone()),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("inbound", &self.inbound.is_some())
            .field("outbound", &self.outbound.is_some())
            .finish()
    }
}

/// Options of a single step.
///
/// Unset fields fall back to the options given at install time, see
/// [`StepOptions::merged_over`].
#[derive(Clone, Default, Debug)]
pub struct StepOptions {
    /// Explicit step name; makes the step key independent of its position
    pub name: Option<String>,
    /// Store key used by the broker-mediated step store
    pub store: Option<String>,
    /// Per-step timeout
    pub timeout: Option<Duration>,
    /// Whether `back()` may land on this step (default true)
    pub back_target: Option<bool>,
    /// Value transforms
    pub transform: Transform,
    /// Free-form renderer hints
    pub extra: Map<String, Value>,
}

impl StepOptions {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the store key
    pub fn store(mut self, key: impl Into<String>) -> Self {
        self.store = Some(key.into());
        self
    }

    /// Set the step timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Mark the step as (not) navigable by `back()`
    pub fn back_target(mut self, navigable: bool) -> Self {
        self.back_target = Some(navigable);
        self
    }

    /// Set the inbound transform
    pub fn transform_in<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform.inbound = Some(Arc::new(f));
        self
    }

    /// Set the outbound transform
    pub fn transform_out<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform.outbound = Some(Arc::new(f));
        self
    }

    /// Add a renderer hint
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Read a renderer hint
    pub fn hint(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Whether `back()` may land on this step
    pub fn is_back_target(&self) -> bool {
        self.back_target.unwrap_or(true)
    }

    /// Combine with install-time `base` options; fields set here win
    pub fn merged_over(&self, base: &StepOptions) -> StepOptions {
        let mut extra = base.extra.clone();
        for (key, value) in &self.extra {
            extra.insert(key.clone(), value.clone());
        }

        StepOptions {
            name: self.name.clone().or_else(|| base.name.clone()),
            store: self.store.clone().or_else(|| base.store.clone()),
            timeout: self.timeout.or(base.timeout),
            back_target: self.back_target.or(base.back_target),
            transform: self.transform.merged_over(&base.transform),
            extra,
        }
    }

    /// Serializable reduction of the options, transforms dropped
    pub fn simplified(&self) -> Value {
        let mut options = json!({
            "name": self.name,
            "store": self.store,
            "timeoutMs": self.timeout.map(|t| t.as_millis() as u64),
            "backTarget": self.is_back_target(),
        });
        if let Value::Object(members) = &mut options {
            for (key, value) in &self.extra {
                members.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        take_simple_properties(&options)
    }
}
