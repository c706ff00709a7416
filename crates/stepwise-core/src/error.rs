use thiserror::Error;

/// Error type for the Stepwise engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Flow options or step configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Illegal step state transition
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidState {
        /// State the step was in
        from: String,
        /// State that was requested
        to: String,
    },

    /// State name outside the known enumeration
    #[error("Unknown step state: {0}")]
    UnknownState(String),

    /// An action with the same name is already installed
    #[error("Action name collision: {0} is already in use")]
    NameCollision(String),

    /// A step index can only be assigned once
    #[error("Step {step} already has an index ({index})")]
    IndexAlreadyAssigned {
        /// Key of the step
        step: String,
        /// Index that was already assigned
        index: usize,
    },

    /// A step did not resolve within its bound
    #[error("Timeout: step {step} did not resolve within {after_ms}ms")]
    Timeout {
        /// Key of the step
        step: String,
        /// The bound that elapsed
        after_ms: u64,
    },

    /// Continue was requested on a step that is not running
    #[error("Cannot resolve step {step}, it is not running (state: {state})")]
    ResolveOutOfState {
        /// Key of the step
        step: String,
        /// State the step was in
        state: String,
    },

    /// No action is installed under the name
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The run this action belonged to was replaced by a newer run
    #[error("Flow run was superseded")]
    Superseded,

    /// Step store failure
    #[error("Step store error: {0}")]
    Store(String),

    /// Broker failure
    #[error("Broker error: {0}")]
    Broker(String),

    /// Failure raised by an action handler or the entry function
    #[error("Handler error: {0}")]
    Handler(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FlowError {
    /// Returns true for the timeout kind, the only one the flow recovers from
    pub fn is_timeout(&self) -> bool {
        matches!(self, FlowError::Timeout { .. })
    }

    /// Wraps an arbitrary handler failure
    pub fn handler(err: impl std::fmt::Display) -> Self {
        FlowError::Handler(err.to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for FlowError {
    fn from(err: serde_yaml::Error) -> Self {
        FlowError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for FlowError {
    fn from(err: anyhow::Error) -> Self {
        FlowError::Handler(format!("{:#}", err))
    }
}

/// Result alias used throughout the crate
pub type FlowResult<T> = Result<T, FlowError>;
