use std::collections::VecDeque;

use relay_agent_core::conversation::{Conversation, Message};
use relay_agent_core::tool::Tool;
use relay_agent_core::{Agent, AgentBuilder, RunError};
use relay_agent_model::ModelProvider;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::config::Settings;
use crate::tools::*;

/// The system prompt of sessions that don't set one.
pub const SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

type IdleCallback = Box<dyn Fn() + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&RunError) + Send + Sync>;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    on_idle: Option<IdleCallback>,
    on_error: Option<ErrorCallback>,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider)
            .with_system_prompt(SYSTEM_PROMPT.trim());
        Self {
            agent_builder,
            on_idle: None,
            on_error: None,
        }
    }

    /// Registers the built-in tools configured by `settings` and applies
    /// its iteration cap.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.agent_builder = self
            .agent_builder
            .with_max_iterations(settings.max_iterations)
            .with_tool(SearchTool::new(settings.search_config()))
            .with_tool(AIPipeTool::new(settings.aipipe_config()))
            .with_tool(RunJsTool::new(&settings.js_sandbox_url));
        self
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets the maximum number of model calls per input.
    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.agent_builder =
            self.agent_builder.with_max_iterations(max_iterations);
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.agent_builder = self.agent_builder.with_tool(tool);
        self
    }

    /// Attaches a callback to be invoked when a message is added to the
    /// conversation.
    #[inline]
    pub fn on_message(
        mut self,
        on_message: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_message(on_message);
        self
    }

    /// Attaches a callback to be invoked when all queued messages have been
    /// handled.
    #[inline]
    pub fn on_idle(
        mut self,
        on_idle: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_idle = Some(Box::new(on_idle));
        self
    }

    /// Attaches a callback to be invoked when a run fails because the model
    /// couldn't be reached.
    #[inline]
    pub fn on_error(
        mut self,
        on_error: impl Fn(&RunError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Builds a new session.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn build(self) -> Session {
        let worker = Worker {
            agent: self.agent_builder.build(),
            on_idle: self.on_idle,
            on_error: self.on_error,
        };
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(worker.run(cmd_rx).instrument(debug_span!("session")));
        Session { cmd_tx }
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session owns one conversation and a fully configured agent running
/// in a background task. Messages sent while the agent is busy are queued
/// and handled one after another, in the order they were sent.
///
/// Dropping the session lets the queued messages finish, then stops the
/// background task.
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Session {
    /// Sends a message to the session.
    #[inline]
    pub fn send_message(&self, message: &str) {
        if self.cmd_tx.send(Command::Input(message.to_owned())).is_err() {
            warn!("session has terminated, message dropped");
        }
    }

    /// Returns a copy of the conversation once every message sent before
    /// this call has been handled.
    ///
    /// Returns `None` if the session has terminated.
    pub async fn conversation(&self) -> Option<Conversation> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx.send(Command::Snapshot(reply_tx)).ok()?;
        reply_rx.await.ok()
    }
}

enum Command {
    Input(String),
    Snapshot(oneshot::Sender<Conversation>),
}

impl Command {
    #[inline]
    fn is_input(&self) -> bool {
        matches!(self, Command::Input(_))
    }
}

struct Worker {
    agent: Agent,
    on_idle: Option<IdleCallback>,
    on_error: Option<ErrorCallback>,
}

impl Worker {
    async fn run(self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        debug!("started");
        let mut conversation = Conversation::new();
        let mut backlog = VecDeque::new();

        loop {
            let cmd = match backlog.pop_front() {
                Some(cmd) => cmd,
                None => match cmd_rx.recv().await {
                    Some(cmd) => cmd,
                    None => break,
                },
            };

            match cmd {
                Command::Input(input) => {
                    match self.agent.send(&mut conversation, input).await {
                        Ok(summary) => debug!("input handled: {summary:?}"),
                        Err(err) => {
                            if let Some(on_error) = &self.on_error {
                                on_error(&err);
                            }
                        }
                    }

                    while let Ok(cmd) = cmd_rx.try_recv() {
                        backlog.push_back(cmd);
                    }
                    if !backlog.iter().any(Command::is_input) {
                        if let Some(on_idle) = &self.on_idle {
                            on_idle();
                        }
                    }
                }
                Command::Snapshot(reply_tx) => {
                    reply_tx.send(conversation.clone()).ok();
                }
            }
        }
        debug!("will terminate");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use relay_agent_core::conversation::Role;
    use relay_agent_core::tool::ToolOutput;
    use relay_agent_test_model::TestModelProvider;

    use super::*;

    #[tokio::test]
    async fn test_inputs_are_queued() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_final_response("first");
        model_provider.add_final_response("second");
        model_provider.add_final_response("third");

        let idle_count = Arc::new(Mutex::new(0));
        let session = SessionBuilder::with_model_provider(model_provider.clone())
            .on_idle({
                let idle_count = Arc::clone(&idle_count);
                move || *idle_count.lock().unwrap() += 1
            })
            .build();
        session.send_message("a");
        session.send_message("b");
        session.send_message("c");

        let conversation = session.conversation().await.unwrap();
        let contents: Vec<_> = conversation
            .iter()
            .map(|msg| (msg.role(), msg.content()))
            .collect();
        assert_eq!(
            contents,
            [
                (Role::System, SYSTEM_PROMPT.trim()),
                (Role::User, "a"),
                (Role::Assistant, "first"),
                (Role::User, "b"),
                (Role::Assistant, "second"),
                (Role::User, "c"),
                (Role::Assistant, "third"),
            ]
        );
        // Each run saw only the inputs before it.
        let requests = model_provider.requests();
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[1].messages.len(), 4);
        assert_eq!(requests[2].messages.len(), 6);
        assert!(*idle_count.lock().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_on_error() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_failure("connection refused");
        model_provider.add_final_response("recovered");

        let errors = Arc::new(Mutex::new(Vec::new()));
        let session = SessionBuilder::with_model_provider(model_provider)
            .with_system_prompt("Be brief.")
            .on_error({
                let errors = Arc::clone(&errors);
                move |err| errors.lock().unwrap().push(err.to_string())
            })
            .build();
        session.send_message("Hi");
        session.send_message("Again");

        let conversation = session.conversation().await.unwrap();
        assert_eq!(conversation.system_prompt(), Some("Be brief."));
        assert_eq!(
            conversation.last().map(Message::content),
            Some("recovered")
        );
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("connection refused"));
    }

    struct ClockTool(serde_json::Value);

    impl Tool for ClockTool {
        type Input = serde_json::Value;

        fn name(&self) -> &str {
            "clock"
        }

        fn description(&self) -> &str {
            "Tells the time"
        }

        fn parameter_schema(&self) -> &serde_json::Value {
            &self.0
        }

        fn execute(
            &self,
            _input: Self::Input,
        ) -> impl Future<Output = ToolOutput> + Send + 'static {
            std::future::ready(ToolOutput::text("noon"))
        }
    }

    #[tokio::test]
    async fn test_custom_tool_and_messages() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_tool_call("clock", "{}");
        model_provider.add_final_response("It's noon.");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let session = SessionBuilder::with_model_provider(model_provider)
            .with_tool(ClockTool(serde_json::json!({ "type": "object" })))
            .on_message({
                let seen = Arc::clone(&seen);
                move |msg| seen.lock().unwrap().push(msg.role())
            })
            .build();
        session.send_message("What time is it?");

        let conversation = session.conversation().await.unwrap();
        assert_eq!(conversation.messages()[2], Message::tool("clock", "noon"));
        assert_eq!(seen.lock().unwrap().len(), conversation.len());
    }
}
