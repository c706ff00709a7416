//! Flow orchestration.
//!
//! A [`Flow`] runs its entry function, which awaits actions one after the
//! other. Every action call creates a [`Step`], walks it through its
//! lifecycle and resolves with the step's committed value.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::actions::{ActionHandler, DelayAction, EndAction, DELAY, END};
use crate::application::flow_options::{FlowOptions, Strings};
use crate::broker::{Broker, BrokerStepStore};
use crate::config::DEFAULT_STEP_TIMEOUT_MS;
use crate::domain::events::FlowEvent;
use crate::domain::notifier::{ListenerId, Notifier};
use crate::domain::step::{Step, StepState};
use crate::domain::step_options::StepOptions;
use crate::domain::store::{SessionStepStore, StepStore};
use crate::error::{FlowError, FlowResult};
use crate::types::{with_timeout, FlowId, StepId, StepKey, StepValue};

/// Replay record of a completed step, captured by `back()`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerunEntry {
    /// Step key
    pub key: StepKey,
    /// Step id
    pub id: StepId,
    /// Committed value
    pub value: StepValue,
    /// Step name
    pub name: String,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
    /// Simplified step options
    pub options: Value,
}

impl RerunEntry {
    fn capture(step: &Step) -> Self {
        Self {
            key: step.key().clone(),
            id: step.id().clone(),
            value: step.value(),
            name: step.name().to_string(),
            completed_at: step.completed_at(),
            options: step.options().simplified(),
        }
    }
}

#[derive(Clone)]
struct InstalledAction {
    handler: Arc<dyn ActionHandler>,
    options: StepOptions,
}

#[derive(Default)]
struct FlowState {
    steps: Vec<Step>,
    step_index: Option<usize>,
    rerun: Option<Vec<RerunEntry>>,
    run: u64,
    ended_run: Option<u64>,
}

struct FlowInner {
    options: FlowOptions,
    store: Arc<dyn StepStore>,
    actions: RwLock<HashMap<String, InstalledAction>>,
    state: Mutex<FlowState>,
    events: Notifier<FlowEvent>,
    key_hook: Mutex<Option<ListenerId>>,
}

/// Handle to a running flow.
///
/// Clones share the flow. Handles passed to the entry function and to action
/// handlers are bound to one run; once `start()` or `back()` begins a newer
/// run, their actions fail with [`FlowError::Superseded`].
#[derive(Clone)]
pub struct Flow {
    inner: Arc<FlowInner>,
    run: Option<u64>,
}

impl Flow {
    /// Build a flow from its options.
    ///
    /// Installs the built-in actions and the actions from the options,
    /// selects the step store, hooks up the key hub and runs the init hook.
    pub fn factory(options: FlowOptions) -> FlowResult<Flow> {
        let store: Arc<dyn StepStore> = match (&options.store, options.use_broker) {
            (Some(store), _) => store.clone(),
            (None, true) => {
                let broker = options.broker.clone().unwrap_or_else(Broker::shared);
                Arc::new(BrokerStepStore::new(broker))
            }
            (None, false) => Arc::new(SessionStepStore::new()),
        };

        let flow = Flow {
            inner: Arc::new(FlowInner {
                options,
                store,
                actions: RwLock::new(HashMap::new()),
                state: Mutex::new(FlowState::default()),
                events: Notifier::new(),
                key_hook: Mutex::new(None),
            }),
            run: None,
        };

        flow.install(END, EndAction, StepOptions::new())?;
        flow.install(DELAY, DelayAction, StepOptions::new().back_target(false))?;
        for action in flow.inner.options.actions.iter() {
            flow.install_arc(&action.name, action.handler.clone(), action.options.clone())?;
        }

        flow.install_key_hook();
        if let Some(init) = flow.inner.options.init.clone() {
            init(&flow)?;
        }

        debug!(flow_id = %flow.id(), use_broker = flow.inner.options.use_broker, "Flow created");
        Ok(flow)
    }

    /// Flow id
    pub fn id(&self) -> &FlowId {
        &self.inner.options.id
    }

    /// Options the flow was built from
    pub fn options(&self) -> &FlowOptions {
        &self.inner.options
    }

    /// String table
    pub fn strings(&self) -> &Strings {
        &self.inner.options.strings
    }

    /// Step store in use
    pub fn store(&self) -> Arc<dyn StepStore> {
        self.inner.store.clone()
    }

    /// Install an action under `name`
    pub fn install<H>(&self, name: &str, handler: H, options: StepOptions) -> FlowResult<&Self>
    where
        H: ActionHandler + 'static,
    {
        self.install_arc(name, Arc::new(handler), options)
    }

    /// Install a shared action handler under `name`
    pub fn install_arc(
        &self,
        name: &str,
        handler: Arc<dyn ActionHandler>,
        options: StepOptions,
    ) -> FlowResult<&Self> {
        let mut actions = self.inner.actions.write();
        if actions.contains_key(name) {
            return Err(FlowError::NameCollision(name.to_string()));
        }
        actions.insert(name.to_string(), InstalledAction { handler, options });
        debug!(flow_id = %self.id(), action = name, "Action installed");
        Ok(self)
    }

    /// Whether an action is installed under `name`
    pub fn is_installed(&self, name: &str) -> bool {
        self.inner.actions.read().contains_key(name)
    }

    /// Names of the installed actions, sorted
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.actions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Steps of the current run
    pub fn steps(&self) -> Vec<Step> {
        self.inner.state.lock().steps.clone()
    }

    /// Index of the current step
    pub fn step_index(&self) -> Option<usize> {
        self.inner.state.lock().step_index
    }

    /// The current step
    pub fn current_step(&self) -> Option<Step> {
        let state = self.inner.state.lock();
        state.step_index.and_then(|index| state.steps.get(index).cloned())
    }

    /// Replay snapshot captured by the last `back()`
    pub fn rerun_snapshot(&self) -> Option<Vec<RerunEntry>> {
        self.inner.state.lock().rerun.clone()
    }

    /// Listen to flow events
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&FlowEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(listener)
    }

    /// Stop listening
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub(crate) fn emit(&self, event: &FlowEvent) {
        debug!(flow_id = %self.id(), event = event.name(), "Flow event");
        self.inner.events.emit(event);
    }

    /// Invoke the action installed under `name`.
    ///
    /// Resolves with the committed step value once the step completes.
    pub async fn act(
        &self,
        name: &str,
        topic: Value,
        options: StepOptions,
    ) -> FlowResult<StepValue> {
        let action = self
            .inner
            .actions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::UnknownAction(name.to_string()))?;
        let options = options.merged_over(&action.options);

        let (ordinal, first) = {
            let state = self.inner.state.lock();
            self.ensure_current(&state)?;
            (state.steps.len(), state.steps.is_empty())
        };
        if first {
            self.emit(&FlowEvent::FlowInitialized);
            self.emit(&FlowEvent::FlowStarted);
        }

        let step = Step::new(self.id(), ordinal, name, topic, options);
        step.initialize(self.inner.store.as_ref()).await?;
        self.set_current_step(&step)?;

        let timeout = step
            .timeout()
            .or(self.inner.options.step_timeout)
            .unwrap_or(Duration::from_millis(DEFAULT_STEP_TIMEOUT_MS));
        let key = step.key().0.clone();

        let result = with_timeout(self.run_step(step.clone(), action.handler), timeout, &key).await;
        if result.as_ref().is_err_and(FlowError::is_timeout) {
            step.abandon();
        }
        result
    }

    async fn run_step(&self, step: Step, handler: Arc<dyn ActionHandler>) -> FlowResult<StepValue> {
        if let Some(value) = step.take_rerun_value() {
            step.replay(value.clone())?;
            debug!(step_key = %step.key(), "Step replayed");
            return Ok(value);
        }

        let completion = step.arm();
        step.set_state(StepState::Running)?;
        handler.handle(self.clone(), step.clone()).await?;
        let result = completion.await.map_err(|_| FlowError::Superseded)?;
        self.emit(&FlowEvent::StepCompleting(step.clone()));

        let delay = self.inner.options.resolve_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        {
            let state = self.inner.state.lock();
            self.ensure_current(&state)?;
        }

        let value = step.complete(result, self.inner.store.as_ref()).await?;
        self.emit(&FlowEvent::StepComplete(step));
        Ok(value)
    }

    /// Make `step` the current step.
    ///
    /// A step without an index is appended and gets the next one; a step
    /// that already has one truncates the list after its position.
    pub fn set_current_step(&self, step: &Step) -> FlowResult<()> {
        let index = {
            let mut state = self.inner.state.lock();
            self.ensure_current(&state)?;
            let index = match step.index() {
                Some(index) => {
                    state.steps.truncate(index);
                    state.steps.push(step.clone());
                    index
                }
                None => {
                    state.steps.push(step.clone());
                    let index = state.steps.len() - 1;
                    step.assign_index(index)?;
                    index
                }
            };
            state.step_index = Some(index);
            if let Some(entry) = state.rerun.as_ref().and_then(|rerun| rerun.get(index)) {
                step.set_rerun_value(entry.value.clone());
            }
            index
        };

        if step.state() == StepState::Initialized {
            step.set_state(StepState::Started)?;
        }
        debug!(flow_id = %self.id(), step_key = %step.key(), index, "Step started");
        self.emit(&FlowEvent::StepStarted(step.clone()));
        Ok(())
    }

    fn ensure_current(&self, state: &FlowState) -> FlowResult<()> {
        match self.run {
            Some(run) if run != state.run => Err(FlowError::Superseded),
            _ => Ok(()),
        }
    }

    fn begin_run(&self, keep_snapshot: bool) -> u64 {
        let mut state = self.inner.state.lock();
        state.run += 1;
        for step in state.steps.drain(..) {
            step.abandon();
        }
        state.step_index = None;
        if !keep_snapshot {
            state.rerun = None;
        }
        state.run
    }

    fn has_ended(&self) -> bool {
        let state = self.inner.state.lock();
        state.ended_run == Some(self.run.unwrap_or(state.run))
    }

    /// Clear the steps of this run and release the key hook
    pub(crate) fn finish_run(&self) {
        {
            let mut state = self.inner.state.lock();
            state.ended_run = Some(self.run.unwrap_or(state.run));
            state.steps.clear();
            state.step_index = None;
            state.rerun = None;
        }
        self.remove_key_hook();
    }

    /// Run the entry function.
    ///
    /// Ends the flow when the entry function returns without doing so. A
    /// step timeout is reported as a `flow-timeout` event instead of an
    /// error; any other failure is returned.
    pub async fn start(&self) -> FlowResult<()> {
        self.start_run(false).await
    }

    async fn start_run(&self, keep_snapshot: bool) -> FlowResult<()> {
        let run = self.begin_run(keep_snapshot);
        self.install_key_hook();
        info!(flow_id = %self.id(), run, "Starting flow");

        let handle = Flow {
            inner: self.inner.clone(),
            run: Some(run),
        };
        let mut result = (self.inner.options.run)(handle.clone()).await;
        if result.is_ok() && !handle.has_ended() {
            result = handle.end().await.map(|_| ());
        }

        match result {
            Ok(()) => Ok(()),
            Err(FlowError::Superseded) => {
                debug!(flow_id = %self.id(), run, "Run superseded");
                Ok(())
            }
            Err(err) if err.is_timeout() => {
                warn!(flow_id = %self.id(), run, error = %err, "Flow timed out");
                self.emit(&FlowEvent::FlowTimeout(err));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Navigate back and replay.
    ///
    /// Without `to_step` the target is the step before the current one,
    /// otherwise the step named `to_step`. The target moves further back
    /// past steps that are not back targets, stopping at the first step.
    /// Steps before the target are replayed from their committed values,
    /// the target and everything after it run again.
    pub async fn back(&self, to_step: Option<&str>) -> FlowResult<()> {
        let target = {
            let mut state = self.inner.state.lock();
            let steps = &state.steps;
            let mut target = match to_step {
                Some(name) => steps
                    .iter()
                    .position(|step| step.name() == name)
                    .map(|index| index as isize)
                    .unwrap_or(-1),
                None => steps.len() as isize - 2,
            };
            while target >= 0 && !steps[target as usize].options().is_back_target() {
                target -= 1;
            }
            let target = target.max(0) as usize;

            let snapshot: Vec<RerunEntry> = steps.iter().take(target).map(RerunEntry::capture).collect();
            state.rerun = Some(snapshot);
            target
        };

        info!(flow_id = %self.id(), target, to_step = ?to_step, "Navigating back");
        self.start_run(true).await
    }

    /// Ask the current step to resolve through its continue-request listeners
    pub fn request_resolve(&self) -> usize {
        match self.current_step() {
            Some(step) => step.request_resolve(),
            None => 0,
        }
    }

    /// Report that the renderer mounted the current step
    pub fn notify_rendered(&self) {
        if let Some(step) = self.current_step() {
            step.call_rendered();
            self.emit(&FlowEvent::StepRendered(step));
        }
    }

    /// Run the built-in `end` action
    pub async fn end(&self) -> FlowResult<StepValue> {
        self.act(END, Value::Null, StepOptions::new()).await
    }

    /// Run the built-in `delay` action
    pub async fn delay(&self, ms: u64) -> FlowResult<StepValue> {
        self.act(DELAY, Value::from(ms), StepOptions::new()).await
    }

    fn install_key_hook(&self) {
        let Some(hub) = self.inner.options.key_hub.clone() else {
            return;
        };
        let mut hook = self.inner.key_hook.lock();
        if hook.is_some() {
            return;
        }

        let flow = Arc::downgrade(&self.inner);
        *hook = Some(hub.subscribe(move |press| {
            if !press.continues_flow() {
                return;
            }
            if let Some(inner) = flow.upgrade() {
                inner.events.emit(&FlowEvent::EnterDetected(press.clone()));
            }
        }));
    }

    fn remove_key_hook(&self) {
        let hook = self.inner.key_hook.lock().take();
        if let (Some(id), Some(hub)) = (hook, self.inner.options.key_hub.as_ref()) {
            hub.unsubscribe(id);
        }
    }
}

impl Drop for FlowInner {
    fn drop(&mut self) {
        if let (Some(id), Some(hub)) = (self.key_hook.get_mut().take(), self.options.key_hub.as_ref()) {
            hub.unsubscribe(id);
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flow '{}'", self.id())
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Flow")
            .field("id", self.id())
            .field("run", &self.run)
            .field("steps", &state.steps.len())
            .field("step_index", &state.step_index)
            .finish()
    }
}
