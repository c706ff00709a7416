//! Flow and step events.

use serde::Serialize;

use crate::domain::keyboard::KeyPress;
use crate::domain::step::{Step, StepState};
use crate::error::{FlowError, FlowResult};

/// Events emitted by a flow, in lifecycle order
#[derive(Debug, Clone)]
pub enum FlowEvent {
    /// First action of a run is about to create its step
    FlowInitialized,
    /// Emitted right after [`FlowEvent::FlowInitialized`]
    FlowStarted,
    /// A step was appended and became current
    StepStarted(Step),
    /// The running step received its resolution value
    StepCompleting(Step),
    /// The step value was committed and saved
    StepComplete(Step),
    /// The renderer finished mounting the current step
    StepRendered(Step),
    /// The `end` action ran
    FlowEnded(Step),
    /// A step exceeded its timeout
    FlowTimeout(FlowError),
    /// An Enter key press reached the flow
    EnterDetected(KeyPress),
}

impl FlowEvent {
    /// Event name, e.g. `step-started`
    pub fn name(&self) -> &'static str {
        match self {
            FlowEvent::FlowInitialized => "flow-initialized",
            FlowEvent::FlowStarted => "flow-started",
            FlowEvent::StepStarted(_) => "step-started",
            FlowEvent::StepCompleting(_) => "step-completing",
            FlowEvent::StepComplete(_) => "step-complete",
            FlowEvent::StepRendered(_) => "step-rendered",
            FlowEvent::FlowEnded(_) => "flow-ended",
            FlowEvent::FlowTimeout(_) => "flow-timeout",
            FlowEvent::EnterDetected(_) => "enter-detected",
        }
    }

    /// Step carried by the event, if any
    pub fn step(&self) -> Option<&Step> {
        match self {
            FlowEvent::StepStarted(step)
            | FlowEvent::StepCompleting(step)
            | FlowEvent::StepComplete(step)
            | FlowEvent::StepRendered(step)
            | FlowEvent::FlowEnded(step) => Some(step),
            _ => None,
        }
    }

    /// Loggable summary of the event
    pub fn summary(&self) -> EventSummary {
        EventSummary {
            name: self.name(),
            step: self.step().map(|step| step.key().0.clone()),
            state: self.step().map(Step::state),
        }
    }
}

/// Serializable view of a [`FlowEvent`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    /// Event name
    pub name: &'static str,
    /// Key of the step involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// State of that step when the summary was taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StepState>,
}

/// Events emitted by a single step
#[derive(Debug, Clone)]
pub enum StepEvent {
    /// Someone asked the step to resolve, e.g. the user pressed Enter
    ContinueRequest(ContinueRequest),
}

/// Request to resolve a running step without a value
#[derive(Debug, Clone)]
pub struct ContinueRequest {
    step: Step,
}

impl ContinueRequest {
    pub(crate) fn new(step: Step) -> Self {
        Self { step }
    }

    /// Step the request targets
    pub fn step(&self) -> &Step {
        &self.step
    }

    /// Resolve the step; fails unless it is running
    pub fn continue_step(&self) -> FlowResult<()> {
        let state = self.step.state();
        if state != StepState::Running {
            return Err(FlowError::ResolveOutOfState {
                step: self.step.key().0.clone(),
                state: state.to_string(),
            });
        }
        self.step.resolve(None);
        Ok(())
    }
}
