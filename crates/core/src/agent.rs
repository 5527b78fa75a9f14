mod builder;
mod state;

use std::error::Error as StdError;

use relay_agent_model::{ErrorKind, ModelProviderError, ToolSpec};
use thiserror::Error;
use tracing::Instrument;

use crate::conversation::{Conversation, Message};
use crate::model_client::{ModelClient, ModelReply};
use crate::tool::{Dispatch, Registry, truncate_chars};
pub use builder::AgentBuilder;
use state::LoopRunState;

/// The maximum number of model calls in one run, unless configured
/// otherwise.
pub const DEFAULT_MAX_ITERATIONS: usize = 6;

/// The system prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that may call tools. Keep answers concise.";

type MessageCallback = Box<dyn Fn(&Message) + Send + Sync>;

/// Why a run stopped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The model gave a final answer.
    Answered,
    /// The model asked for a tool that isn't registered.
    UnknownTool(String),
    /// The run used up all of its model calls while still calling tools.
    IterationCap,
}

/// What a finished run did.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RunSummary {
    /// How many times the model was called.
    pub model_calls: usize,
    /// Why the run stopped.
    pub stop_reason: StopReason,
}

/// An error that ended a run early.
#[derive(Debug, Error)]
pub enum RunError {
    /// The model request failed. Nothing was appended for that request.
    #[error("model request failed: {source}")]
    Model {
        /// The kind reported by the provider.
        kind: ErrorKind,
        /// The provider error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl From<Box<dyn ModelProviderError>> for RunError {
    fn from(err: Box<dyn ModelProviderError>) -> Self {
        RunError::Model {
            kind: err.kind(),
            source: err,
        }
    }
}

impl RunError {
    /// Returns the kind of the underlying provider error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::Model { kind, .. } => *kind,
        }
    }
}

/// The agent loop controller.
///
/// An agent holds a model provider, a toolset and the system prompt. It
/// doesn't own any conversation: each run borrows one mutably, so two runs
/// can never touch the same conversation at the same time.
///
/// A run calls the model with the whole conversation, runs the requested
/// tool, appends its result and calls the model again, until the model
/// answers, asks for an unknown tool, or the iteration cap is reached.
pub struct Agent {
    model_client: ModelClient,
    registry: Registry,
    system_prompt: String,
    max_iterations: usize,
    on_message: Option<MessageCallback>,
}

impl Agent {
    /// Appends the user input to the conversation and runs the loop.
    pub async fn send<S: Into<String>>(
        &self,
        conversation: &mut Conversation,
        input: S,
    ) -> Result<RunSummary, RunError> {
        self.append(conversation, Message::user(input));
        self.run(conversation).await
    }

    /// Runs the loop on a conversation whose last message is usually a
    /// user input.
    ///
    /// A failed model request ends the run with an error. Tool failures
    /// don't, they are appended like any other tool result.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
    ) -> Result<RunSummary, RunError> {
        let span = info_span!("agent run", max_iterations = self.max_iterations);
        self.run_loop(conversation).instrument(span).await
    }

    /// Returns the specs of the registered tools, in the order they're
    /// advertised to the model.
    #[inline]
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    /// Returns the maximum number of model calls per run.
    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    async fn run_loop(
        &self,
        conversation: &mut Conversation,
    ) -> Result<RunSummary, RunError> {
        let mut state = LoopRunState::default();

        while state.is_dispatching() {
            if !state.begin_iteration(self.max_iterations) {
                debug!("iteration cap reached");
                break;
            }

            if conversation.ensure_system_prompt(&self.system_prompt) {
                if let Some(on_message) = &self.on_message {
                    on_message(&conversation.messages()[0]);
                }
            }

            let reply = self
                .model_client
                .complete(conversation, self.registry.specs())
                .await
                .map_err(|err| {
                    error!("run aborted: {err}");
                    RunError::from(err)
                })?;

            match reply {
                ModelReply::Final(text) => {
                    self.append(conversation, Message::assistant(text));
                    state.settle(StopReason::Answered);
                }
                ModelReply::ToolCall { name, arguments } => {
                    match self.registry.dispatch(&name, arguments).await {
                        Dispatch::Completed {
                            output,
                            output_limit,
                        } => {
                            let mut content = output.render();
                            if let Some(limit) = output_limit {
                                let len = truncate_chars(&content, limit).len();
                                content.truncate(len);
                            }
                            self.append(conversation, Message::tool(name, content));
                        }
                        Dispatch::UnknownTool => {
                            let note = format!("(requested unknown tool {name})");
                            self.append(conversation, Message::assistant(note));
                            state.settle(StopReason::UnknownTool(name));
                        }
                    }
                }
            }
        }

        let summary = state.into_summary();
        debug!("run finished: {summary:?}");
        Ok(summary)
    }

    fn append(&self, conversation: &mut Conversation, msg: Message) {
        trace!("appending a {} message", msg.role());
        if let Some(on_message) = &self.on_message {
            on_message(&msg);
        }
        conversation.push(msg);
    }
}
