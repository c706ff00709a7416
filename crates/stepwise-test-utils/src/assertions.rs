//! Assertion utilities for validating flow and step state.

use serde_json::Value;
use stepwise_core::{Flow, StepState};
use thiserror::Error;

use crate::recorder::EventRecorder;

/// Error type for flow validation failures
#[derive(Debug, Error)]
pub enum FlowAssertionError {
    #[error("Step count mismatch: expected {expected}, got {actual}")]
    StepCount { expected: usize, actual: usize },

    #[error("Invalid step state at {index}: expected {expected}, got {actual}")]
    StepState {
        index: usize,
        expected: StepState,
        actual: StepState,
    },

    #[error("Invalid step value at {index}: expected {expected:?}, got {actual:?}")]
    StepValue {
        index: usize,
        expected: Option<Value>,
        actual: Option<Value>,
    },

    #[error("Event sequence mismatch: expected {expected:?}, got {actual:?}")]
    EventSequence {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Asserts that the flow's steps are, in order, in the expected states.
pub fn assert_step_states(flow: &Flow, expected: &[StepState]) -> Result<(), FlowAssertionError> {
    let steps = flow.steps();
    if steps.len() != expected.len() {
        return Err(FlowAssertionError::StepCount {
            expected: expected.len(),
            actual: steps.len(),
        });
    }

    for (index, (step, expected)) in steps.iter().zip(expected).enumerate() {
        let actual = step.state();
        if actual != *expected {
            return Err(FlowAssertionError::StepState {
                index,
                expected: *expected,
                actual,
            });
        }
    }

    Ok(())
}

/// Asserts that the flow's steps hold the expected values.
pub fn assert_step_values(flow: &Flow, expected: &[Option<Value>]) -> Result<(), FlowAssertionError> {
    let steps = flow.steps();
    if steps.len() != expected.len() {
        return Err(FlowAssertionError::StepCount {
            expected: expected.len(),
            actual: steps.len(),
        });
    }

    for (index, (step, expected)) in steps.iter().zip(expected).enumerate() {
        let actual = step.value();
        if actual != *expected {
            return Err(FlowAssertionError::StepValue {
                index,
                expected: expected.clone(),
                actual,
            });
        }
    }

    Ok(())
}

/// Asserts that the recorder saw exactly `expected`, in order.
pub fn assert_event_sequence(recorder: &EventRecorder, expected: &[&str]) -> Result<(), FlowAssertionError> {
    let actual = recorder.names();
    if actual != expected {
        return Err(FlowAssertionError::EventSequence {
            expected: expected.iter().map(|name| name.to_string()).collect(),
            actual: actual.iter().map(|name| name.to_string()).collect(),
        });
    }
    Ok(())
}
