//! Flow Options and their builder.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::application::actions::ActionHandler;
use crate::application::flow::Flow;
use crate::broker::Broker;
use crate::config::{FlowConfig, DEFAULT_RESOLVE_DELAY_MS};
use crate::domain::keyboard::KeyHub;
use crate::domain::step_options::StepOptions;
use crate::domain::store::StepStore;
use crate::error::{FlowError, FlowResult};
use crate::types::FlowId;

/// Entry function of a flow
pub type EntryFn = Arc<dyn Fn(Flow) -> BoxFuture<'static, FlowResult<()>> + Send + Sync>;

/// Hook run once by the flow factory
pub type InitFn = Arc<dyn Fn(&Flow) -> FlowResult<()> + Send + Sync>;

/// Mutable string table shared with renderers
#[derive(Debug, Clone, Default)]
pub struct Strings {
    table: Arc<RwLock<HashMap<String, String>>>,
}

impl Strings {
    /// Look up a string
    pub fn get(&self, key: &str) -> Option<String> {
        self.table.read().get(key).cloned()
    }

    /// Look up a string, falling back to `default`
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Set a string
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.table.write().insert(key.into(), value.into());
    }
}

pub(crate) struct ActionRegistration {
    pub(crate) name: String,
    pub(crate) handler: Arc<dyn ActionHandler>,
    pub(crate) options: StepOptions,
}

/// Configuration a flow is built from
#[derive(Clone)]
pub struct FlowOptions {
    pub(crate) id: FlowId,
    pub(crate) run: EntryFn,
    pub(crate) init: Option<InitFn>,
    pub(crate) strings: Strings,
    pub(crate) use_broker: bool,
    pub(crate) resolve_delay: Duration,
    pub(crate) step_timeout: Option<Duration>,
    pub(crate) actions: Arc<Vec<ActionRegistration>>,
    pub(crate) store: Option<Arc<dyn StepStore>>,
    pub(crate) broker: Option<Arc<Broker>>,
    pub(crate) key_hub: Option<Arc<KeyHub>>,
}

impl FlowOptions {
    /// Start building options for the flow `id`
    pub fn builder(id: impl Into<String>) -> FlowOptionsBuilder {
        FlowOptionsBuilder::new(id)
    }

    /// Flow id
    pub fn id(&self) -> &FlowId {
        &self.id
    }

    /// String table
    pub fn strings(&self) -> &Strings {
        &self.strings
    }

    /// Whether the broker-mediated store is selected
    pub fn use_broker(&self) -> bool {
        self.use_broker
    }

    /// Pause between resolution and completion
    pub fn resolve_delay(&self) -> Duration {
        self.resolve_delay
    }

    /// Flow-wide step timeout
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }

    /// Key hub the flow listens to
    pub fn key_hub(&self) -> Option<&Arc<KeyHub>> {
        self.key_hub.as_ref()
    }
}

impl fmt::Debug for FlowOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowOptions")
            .field("id", &self.id)
            .field("use_broker", &self.use_broker)
            .field("resolve_delay", &self.resolve_delay)
            .field("step_timeout", &self.step_timeout)
            .field(
                "actions",
                &self.actions.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for [`FlowOptions`]
pub struct FlowOptionsBuilder {
    id: String,
    run: Option<EntryFn>,
    init: Option<InitFn>,
    strings: Strings,
    use_broker: bool,
    resolve_delay: Duration,
    step_timeout: Option<Duration>,
    actions: Vec<ActionRegistration>,
    store: Option<Arc<dyn StepStore>>,
    broker: Option<Arc<Broker>>,
    key_hub: Option<Arc<KeyHub>>,
}

impl FlowOptionsBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            run: None,
            init: None,
            strings: Strings::default(),
            use_broker: false,
            resolve_delay: Duration::from_millis(DEFAULT_RESOLVE_DELAY_MS),
            step_timeout: None,
            actions: Vec::new(),
            store: None,
            broker: None,
            key_hub: None,
        }
    }

    /// Entry function, called by `start()` with a handle bound to the run
    pub fn run<F, Fut>(mut self, run: F) -> Self
    where
        F: Fn(Flow) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FlowResult<()>> + Send + 'static,
    {
        self.run = Some(Arc::new(move |flow| run(flow).boxed()));
        self
    }

    /// Hook run once when the flow is constructed
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn(&Flow) -> FlowResult<()> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    /// Seed the string table
    pub fn string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.strings.set(key, value);
        self
    }

    /// Select the broker-mediated store
    pub fn use_broker(mut self, use_broker: bool) -> Self {
        self.use_broker = use_broker;
        self
    }

    /// Pause between a step's resolution and its completion
    pub fn resolve_delay(mut self, delay: Duration) -> Self {
        self.resolve_delay = delay;
        self
    }

    /// Timeout for steps that set none themselves
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Apply loaded configuration
    pub fn config(mut self, config: &FlowConfig) -> Self {
        self.use_broker = config.use_broker;
        self.resolve_delay = config.resolve_delay();
        self.step_timeout = Some(config.step_timeout());
        self
    }

    /// Action installed by the factory
    pub fn action<H>(mut self, name: impl Into<String>, handler: H, options: StepOptions) -> Self
    where
        H: ActionHandler + 'static,
    {
        self.actions.push(ActionRegistration {
            name: name.into(),
            handler: Arc::new(handler),
            options,
        });
        self
    }

    /// Explicit step store; wins over `use_broker`
    pub fn store(mut self, store: Arc<dyn StepStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Broker for the broker-mediated store, instead of the shared one
    pub fn broker(mut self, broker: Arc<Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Key hub delivering Enter presses
    pub fn key_hub(mut self, hub: Arc<KeyHub>) -> Self {
        self.key_hub = Some(hub);
        self
    }

    /// Validate and build
    pub fn build(self) -> FlowResult<FlowOptions> {
        if self.id.trim().is_empty() {
            return Err(FlowError::InvalidConfiguration(
                "Flow must have an id".to_string(),
            ));
        }
        let run = self.run.ok_or_else(|| {
            FlowError::InvalidConfiguration(format!("Flow '{}' has no run function", self.id))
        })?;

        Ok(FlowOptions {
            id: FlowId(self.id),
            run,
            init: self.init,
            strings: self.strings,
            use_broker: self.use_broker,
            resolve_delay: self.resolve_delay,
            step_timeout: self.step_timeout,
            actions: Arc::new(self.actions),
            store: self.store,
            broker: self.broker,
            key_hub: self.key_hub,
        })
    }
}
