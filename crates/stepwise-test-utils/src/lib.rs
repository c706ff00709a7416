//! Testing utilities for Stepwise.
//!
//! Mocks of the step store seam, scripted actions that answer steps in order,
//! recorders for flow events and assertion helpers over both.

pub mod assertions;
pub mod mocks;
pub mod recorder;
pub mod scripted;

/// Re-export commonly used types for convenience
pub use mockall;

pub use assertions::{assert_event_sequence, assert_step_states, assert_step_values, FlowAssertionError};
pub use mocks::{create_mock_step_store, MockStepStore};
pub use recorder::{EventRecorder, StepWatcher};
pub use scripted::ScriptedAction;
