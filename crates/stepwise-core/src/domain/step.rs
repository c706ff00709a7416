use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::domain::events::{ContinueRequest, StepEvent};
use crate::domain::notifier::{ListenerId, Notifier};
use crate::domain::step_options::StepOptions;
use crate::domain::store::StepStore;
use crate::error::{FlowError, FlowResult};
use crate::types::{FlowId, StepId, StepKey, StepValue};

/// Step lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    /// Created, nothing loaded yet
    Unknown,
    /// Persisted value loaded
    Initialized,
    /// Appended to the flow's step list
    Started,
    /// Handler is executing, waiting for resolution
    Running,
    /// Resolution received, not yet committed
    Completing,
    /// Value committed and saved
    Completed,
    /// Completed from the replay snapshot without running the handler
    Replayed,
}

impl StepState {
    /// Every state, in lifecycle order
    pub const ALL: [StepState; 7] = [
        StepState::Unknown,
        StepState::Initialized,
        StepState::Started,
        StepState::Running,
        StepState::Completing,
        StepState::Completed,
        StepState::Replayed,
    ];

    /// Lowercase state name
    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Unknown => "unknown",
            StepState::Initialized => "initialized",
            StepState::Started => "started",
            StepState::Running => "running",
            StepState::Completing => "completing",
            StepState::Completed => "completed",
            StepState::Replayed => "replayed",
        }
    }

    /// True for the states a step never leaves
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Completed | StepState::Replayed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Unknown, Initialized)
                | (Initialized, Started)
                | (Started, Running)
                | (Started, Replayed)
                | (Running, Completing)
                | (Completing, Completed)
        )
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepState {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| FlowError::UnknownState(s.to_string()))
    }
}

/// Produces the renderer output of a step
pub type RenderFn = Arc<dyn Fn(&Step) -> String + Send + Sync>;

/// Called once the renderer has mounted the step
pub type RenderedFn = Arc<dyn Fn(&Step) + Send + Sync>;

#[derive(Debug)]
struct StepData {
    state: StepState,
    value: StepValue,
    completed_at: Option<DateTime<Utc>>,
    has_changed_value: bool,
    rerun_value: Option<StepValue>,
    completion: Option<oneshot::Sender<StepValue>>,
}

struct StepInner {
    id: StepId,
    key: StepKey,
    name: String,
    is_given_name: bool,
    action: String,
    flow_id: FlowId,
    topic: Value,
    options: RwLock<StepOptions>,
    index: OnceCell<usize>,
    data: Mutex<StepData>,
    render: RwLock<Option<RenderFn>>,
    rendered: RwLock<Option<RenderedFn>>,
    events: Notifier<StepEvent>,
}

/// A single interaction within a flow.
///
/// `Step` is a cheap handle; clones refer to the same step.
#[derive(Clone)]
pub struct Step {
    inner: Arc<StepInner>,
}

impl Step {
    /// Create the step at `ordinal` for an invocation of `action`
    pub(crate) fn new(
        flow_id: &FlowId,
        ordinal: usize,
        action: &str,
        topic: Value,
        options: StepOptions,
    ) -> Self {
        let id = StepId::from_ordinal(ordinal);
        let is_given_name = options.name.is_some();
        let name = options.name.clone().unwrap_or_else(|| action.to_string());
        let key = StepKey::derive(flow_id, &name, &id, is_given_name);

        Self {
            inner: Arc::new(StepInner {
                id,
                key,
                name,
                is_given_name,
                action: action.to_string(),
                flow_id: flow_id.clone(),
                topic,
                options: RwLock::new(options),
                index: OnceCell::new(),
                data: Mutex::new(StepData {
                    state: StepState::Unknown,
                    value: None,
                    completed_at: None,
                    has_changed_value: false,
                    rerun_value: None,
                    completion: None,
                }),
                render: RwLock::new(None),
                rendered: RwLock::new(None),
                events: Notifier::new(),
            }),
        }
    }

    /// Positional id, `wf{ordinal}`
    pub fn id(&self) -> &StepId {
        &self.inner.id
    }

    /// Persistence key
    pub fn key(&self) -> &StepKey {
        &self.inner.key
    }

    /// Explicit name, or the action name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True when the name came from the step options
    pub fn is_given_name(&self) -> bool {
        self.inner.is_given_name
    }

    /// Name of the action that created the step
    pub fn action(&self) -> &str {
        &self.inner.action
    }

    /// Id of the owning flow
    pub fn flow_id(&self) -> &FlowId {
        &self.inner.flow_id
    }

    /// Action payload
    pub fn topic(&self) -> &Value {
        &self.inner.topic
    }

    /// Snapshot of the step options
    pub fn options(&self) -> StepOptions {
        self.inner.options.read().clone()
    }

    /// Mutate the options, e.g. to leave renderer hints
    pub fn update_options<F>(&self, f: F)
    where
        F: FnOnce(&mut StepOptions),
    {
        f(&mut self.inner.options.write());
    }

    /// Position in the flow's step list, once started
    pub fn index(&self) -> Option<usize> {
        self.inner.index.get().copied()
    }

    /// Current lifecycle state
    pub fn state(&self) -> StepState {
        self.inner.data.lock().state
    }

    /// Current value
    pub fn value(&self) -> StepValue {
        self.inner.data.lock().value.clone()
    }

    /// When the step reached a terminal state
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.inner.data.lock().completed_at
    }

    /// True once the step is completed or replayed
    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    /// Whether completion changed the loaded value
    pub fn has_changed_value(&self) -> bool {
        self.inner.data.lock().has_changed_value
    }

    /// Per-step timeout from the options
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.options.read().timeout
    }

    pub(crate) fn assign_index(&self, index: usize) -> FlowResult<()> {
        self.inner
            .index
            .set(index)
            .map_err(|_| FlowError::IndexAlreadyAssigned {
                step: self.inner.key.0.clone(),
                index: self.index().unwrap_or(index),
            })
    }

    pub(crate) fn set_state(&self, next: StepState) -> FlowResult<()> {
        let mut data = self.inner.data.lock();
        Self::transition(&self.inner.key, &mut data, next)
    }

    fn transition(key: &StepKey, data: &mut StepData, next: StepState) -> FlowResult<()> {
        if !data.state.can_transition_to(next) {
            return Err(FlowError::InvalidState {
                from: data.state.to_string(),
                to: next.to_string(),
            });
        }
        trace!(step = %key, from = %data.state, to = %next, "Step state transition");
        data.state = next;
        Ok(())
    }

    /// Load the persisted value and apply the inbound transform
    pub(crate) async fn initialize(&self, store: &dyn StepStore) -> FlowResult<()> {
        let loaded = store.load_step(self).await?;
        let inbound = self.inner.options.read().transform.inbound.clone();
        let value = match (loaded, inbound) {
            (Some(value), _) if value.is_null() => None,
            (Some(value), Some(inbound)) => Some(inbound(value)),
            (loaded, _) => loaded,
        };

        let mut data = self.inner.data.lock();
        data.value = value;
        Self::transition(&self.inner.key, &mut data, StepState::Initialized)
    }

    /// Open the completion channel the running handler resolves through
    pub(crate) fn arm(&self) -> oneshot::Receiver<StepValue> {
        let (tx, rx) = oneshot::channel();
        self.inner.data.lock().completion = Some(tx);
        rx
    }

    /// Drop the completion channel; the waiting action observes a superseded run
    pub(crate) fn abandon(&self) {
        if self.inner.data.lock().completion.take().is_some() {
            debug!(step = %self.inner.key, "Abandoned running step");
        }
    }

    /// Resolve the running step with `value`.
    ///
    /// Returns false, changing nothing, unless the step is running. A step
    /// resolves at most once.
    pub fn resolve(&self, value: StepValue) -> bool {
        let sender = {
            let mut data = self.inner.data.lock();
            if data.state != StepState::Running {
                debug!(step = %self.inner.key, state = %data.state, "Ignoring resolve");
                return false;
            }
            let sender = match data.completion.take() {
                Some(sender) if !sender.is_closed() => sender,
                _ => {
                    debug!(step = %self.inner.key, "Ignoring resolve, nobody is waiting");
                    return false;
                }
            };
            data.state = StepState::Completing;
            sender
        };

        sender.send(value).is_ok()
    }

    /// Commit the resolution value and save it through `store`
    pub(crate) async fn complete(
        &self,
        result: StepValue,
        store: &dyn StepStore,
    ) -> FlowResult<StepValue> {
        let outbound = self.inner.options.read().transform.outbound.clone();
        let result = match (result, outbound) {
            (Some(value), Some(outbound)) => Some(outbound(value)),
            (result, _) => result,
        };

        {
            let mut data = self.inner.data.lock();
            data.has_changed_value = data.value != result;
            data.value = result.clone();
            Self::transition(&self.inner.key, &mut data, StepState::Completed)?;
            data.completed_at = Some(Utc::now());
        }

        store.save_step(self).await?;
        Ok(result)
    }

    pub(crate) fn set_rerun_value(&self, value: StepValue) {
        self.inner.data.lock().rerun_value = Some(value);
    }

    /// Take the replay value; it is handed out once
    pub(crate) fn take_rerun_value(&self) -> Option<StepValue> {
        self.inner.data.lock().rerun_value.take()
    }

    /// Complete from the replay snapshot; nothing is saved
    pub(crate) fn replay(&self, value: StepValue) -> FlowResult<()> {
        let mut data = self.inner.data.lock();
        Self::transition(&self.inner.key, &mut data, StepState::Replayed)?;
        data.value = value;
        data.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Listen to step-scoped events
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StepEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(listener)
    }

    /// Stop listening
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// Ask whoever listens for continue requests to resolve the step
    pub fn request_resolve(&self) -> usize {
        self.inner
            .events
            .emit(&StepEvent::ContinueRequest(ContinueRequest::new(self.clone())))
    }

    /// Install the render callback
    pub fn set_render<F>(&self, render: F)
    where
        F: Fn(&Step) -> String + Send + Sync + 'static,
    {
        *self.inner.render.write() = Some(Arc::new(render));
    }

    /// Renderer output; empty until a render callback is set
    pub fn render(&self) -> String {
        let render = self.inner.render.read().clone();
        render.map(|render| render(self)).unwrap_or_default()
    }

    /// Install the callback run once the step is on screen
    pub fn set_rendered<F>(&self, rendered: F)
    where
        F: Fn(&Step) + Send + Sync + 'static,
    {
        *self.inner.rendered.write() = Some(Arc::new(rendered));
    }

    pub(crate) fn call_rendered(&self) {
        let rendered = self.inner.rendered.read().clone();
        if let Some(rendered) = rendered {
            rendered(self);
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let position = self.index().map(|i| i + 1).unwrap_or(0);
        match self.value() {
            Some(value) => write!(f, "Step {}: {} (result: {})", position, self.name(), value),
            None => write!(f, "Step {}: {} (result: null)", position, self.name()),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.data.lock();
        f.debug_struct("Step")
            .field("key", &self.inner.key)
            .field("index", &self.inner.index.get())
            .field("state", &data.state)
            .field("value", &data.value)
            .finish()
    }
}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
