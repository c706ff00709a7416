//! Action handlers and the built-in `end` and `delay` actions.

use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::application::flow::Flow;
use crate::domain::events::FlowEvent;
use crate::domain::step::Step;
use crate::error::FlowResult;

/// Name of the built-in action that ends a flow
pub const END: &str = "end";

/// Name of the built-in action that waits before resolving
pub const DELAY: &str = "delay";

/// Default wait of the `delay` action
pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Behaviour behind an action name.
///
/// The handler receives the step in the running state and arranges for
/// [`Step::resolve`] to be called, either right away or later from a
/// renderer. Returning an error fails the action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Handle one invocation of the action
    async fn handle(&self, flow: Flow, step: Step) -> FlowResult<()>;
}

/// Adapter turning an async closure into an [`ActionHandler`]
pub struct FnAction<F>(F);

/// Wrap `f` as an action handler
pub fn handler_fn<F, Fut>(f: F) -> FnAction<F>
where
    F: Fn(Flow, Step) -> Fut + Send + Sync,
    Fut: Future<Output = FlowResult<()>> + Send,
{
    FnAction(f)
}

#[async_trait]
impl<F, Fut> ActionHandler for FnAction<F>
where
    F: Fn(Flow, Step) -> Fut + Send + Sync,
    Fut: Future<Output = FlowResult<()>> + Send,
{
    async fn handle(&self, flow: Flow, step: Step) -> FlowResult<()> {
        (self.0)(flow, step).await
    }
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnAction")
    }
}

/// Ends the flow: notifies, resolves, drops key hooks and clears the steps
#[derive(Debug, Default, Clone, Copy)]
pub struct EndAction;

#[async_trait]
impl ActionHandler for EndAction {
    async fn handle(&self, flow: Flow, step: Step) -> FlowResult<()> {
        info!(flow_id = %flow.id(), steps = flow.steps().len(), "Flow ended");
        flow.emit(&FlowEvent::FlowEnded(step.clone()));
        step.resolve(None);
        flow.finish_run();
        Ok(())
    }
}

/// Resolves with `true` after the number of milliseconds in the topic
#[derive(Debug, Default, Clone, Copy)]
pub struct DelayAction;

#[async_trait]
impl ActionHandler for DelayAction {
    async fn handle(&self, _flow: Flow, step: Step) -> FlowResult<()> {
        let ms = step.topic().as_u64().unwrap_or(DEFAULT_DELAY_MS);
        debug!(step_key = %step.key(), ms, "Delaying");
        tokio::time::sleep(Duration::from_millis(ms)).await;
        step.resolve(Some(json!(true)));
        Ok(())
    }
}
