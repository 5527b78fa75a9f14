use relay_agent_model::ModelProvider;

use super::{Agent, DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT};
use crate::conversation::Message;
use crate::model_client::ModelClient;
use crate::tool::{Registry, Tool};

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    system_prompt: Option<String>,
    max_iterations: usize,
    registry: Registry,
    on_message: Option<super::MessageCallback>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            registry: Registry::new(),
            on_message: None,
        }
    }

    /// Sets the system prompt inserted at the start of every conversation.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the maximum number of model calls per run. Values below 1 are
    /// raised to 1.
    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.registry.add_tool(tool);
        self
    }

    /// Attaches a callback to be invoked for every message added to a
    /// conversation, including the system prompt.
    #[inline]
    pub fn on_message(
        mut self,
        on_message: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Some(Box::new(on_message));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent {
            model_client: self.model_client,
            registry: self.registry,
            system_prompt: self
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_owned()),
            max_iterations: self.max_iterations,
            on_message: self.on_message,
        }
    }
}
