//!
//! Stepwise Core - step-by-step interaction engine
//!
//! A flow is an async entry function that awaits a sequence of actions.
//! Each action call becomes a [`Step`] with a strict lifecycle, resolved by a
//! handler or a renderer. Completed values are persisted through a pluggable
//! [`StepStore`], and [`Flow::back`] re-runs the entry function while
//! replaying the values of earlier steps.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Application services - flows, actions, options, navigation
pub mod application;

/// Topic-based broker and the broker-mediated step store
pub mod broker;

/// Flow configuration
pub mod config;

/// Domain layer - steps, events, stores
pub mod domain;

/// Error types
pub mod error;

/// Core types and helpers
pub mod types;

// Re-export main API types for easy use
pub use application::actions::{handler_fn, ActionHandler, DelayAction, EndAction, FnAction};
pub use application::flow::{Flow, RerunEntry};
pub use application::flow_options::{FlowOptions, FlowOptionsBuilder, Strings};
pub use application::navigation::{FlowNav, History, HistoryEntry, MemoryHistory};
pub use broker::{Broker, BrokerStepStore, Message, StepMessage, SubscriptionId};
pub use config::FlowConfig;
pub use domain::events::{ContinueRequest, EventSummary, FlowEvent, StepEvent};
pub use domain::keyboard::{KeyHub, KeyPress, KeyTarget};
pub use domain::notifier::{ListenerId, Notifier};
pub use domain::step::{Step, StepState};
pub use domain::step_options::{StepOptions, Transform};
pub use domain::store::{SessionStepStore, StepStore};
pub use error::{FlowError, FlowResult};
pub use types::{take_simple_properties, FlowId, StepId, StepKey, StepValue};
