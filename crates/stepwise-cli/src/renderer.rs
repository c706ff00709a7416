//! Terminal renderer
//!
//! Prints each step to the output and resolves it from the next input line.
//! `back` navigates back; an empty line keeps the loaded value of an `ask`
//! step or continues a `show` step.

use parking_lot::Mutex;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use stepwise_core::{
    handler_fn, ActionHandler, Flow, FlowError, FlowResult, Step, StepEvent,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Input = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;
type Run = JoinHandle<FlowResult<()>>;

/// What the user typed for a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Navigate back
    Back,
    /// Empty line
    Continue,
    /// Anything else, trimmed
    Answer(String),
}

impl Reply {
    /// Classify an input line
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Reply::Continue,
            "back" => Reply::Back,
            answer => Reply::Answer(answer.to_string()),
        }
    }
}

/// Line-oriented renderer for a single flow
pub struct TerminalRenderer {
    input: tokio::sync::Mutex<Input>,
    output: Mutex<Box<dyn Write + Send>>,
    runs: Mutex<Option<mpsc::UnboundedSender<Run>>>,
}

impl TerminalRenderer {
    /// Renderer reading `input` and writing to `output`
    pub fn new<R, W>(input: R, output: W) -> Arc<Self>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: Write + Send + 'static,
    {
        let input: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(input);
        Arc::new(Self {
            input: tokio::sync::Mutex::new(input.lines()),
            output: Mutex::new(Box::new(output)),
            runs: Mutex::new(None),
        })
    }

    /// Renderer on stdin and stdout
    pub fn stdio() -> Arc<Self> {
        Self::new(tokio::io::BufReader::new(tokio::io::stdin()), std::io::stdout())
    }

    /// Handler for `ask` steps: prints the question and resolves with the answer
    pub fn ask_action(self: &Arc<Self>) -> impl ActionHandler + 'static {
        let renderer = self.clone();
        handler_fn(move |flow: Flow, step: Step| {
            let renderer = renderer.clone();
            async move {
                let prompt = match step.value() {
                    Some(value) => format!("{} [{}]", text_of(step.topic()), text_of(&value)),
                    None => text_of(step.topic()),
                };
                renderer.print(&format!("{}\n> ", prompt))?;

                match renderer.read_reply().await? {
                    Reply::Back => renderer.go_back(&flow),
                    Reply::Continue => {
                        step.resolve(step.value());
                    }
                    Reply::Answer(answer) => {
                        step.resolve(Some(Value::String(answer)));
                    }
                }
                Ok(())
            }
        })
    }

    /// Handler for `show` steps: prints the message and waits for a continue request
    pub fn show_action(self: &Arc<Self>) -> impl ActionHandler + 'static {
        let renderer = self.clone();
        handler_fn(move |flow: Flow, step: Step| {
            let renderer = renderer.clone();
            async move {
                step.on(|event| match event {
                    StepEvent::ContinueRequest(request) => {
                        if let Err(err) = request.continue_step() {
                            warn!(error = %err, "Continue request ignored");
                        }
                    }
                });

                let label = flow.strings().get_or("continue", "continue");
                renderer.print(&format!("{}\n(Enter to {}) ", text_of(step.topic()), label))?;

                match renderer.read_reply().await? {
                    Reply::Back => renderer.go_back(&flow),
                    _ => {
                        flow.request_resolve();
                    }
                }
                Ok(())
            }
        })
    }

    /// Run `flow` until every run it spawned has finished
    pub async fn drive(&self, flow: &Flow) -> FlowResult<()> {
        let (sender, mut runs) = mpsc::unbounded_channel();
        *self.runs.lock() = Some(sender.clone());

        let first = flow.clone();
        let _ = sender.send(tokio::spawn(async move { first.start().await }));
        drop(sender);

        let mut result = Ok(());
        while let Ok(run) = runs.try_recv() {
            let outcome = run
                .await
                .map_err(|err| FlowError::Handler(format!("flow task failed: {}", err)))
                .and_then(|outcome| outcome);
            if let Err(err) = outcome {
                result = Err(err);
                break;
            }
        }

        self.runs.lock().take();
        result
    }

    fn go_back(&self, flow: &Flow) {
        info!(flow_id = %flow.id(), "Back requested");
        let flow = flow.clone();
        let run = tokio::spawn(async move { flow.back(None).await });
        match self.runs.lock().as_ref() {
            Some(runs) => {
                let _ = runs.send(run);
            }
            None => debug!("Back requested outside of drive"),
        }
    }

    async fn read_reply(&self) -> FlowResult<Reply> {
        let line = self
            .input
            .lock()
            .await
            .next_line()
            .await
            .map_err(|err| FlowError::Handler(format!("reading input: {}", err)))?;
        match line {
            Some(line) => Ok(Reply::parse(&line)),
            None => Err(FlowError::Handler("input closed".to_string())),
        }
    }

    fn print(&self, text: &str) -> FlowResult<()> {
        let mut output = self.output.lock();
        output
            .write_all(text.as_bytes())
            .and_then(|_| output.flush())
            .map_err(|err| FlowError::Handler(format!("writing output: {}", err)))
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
