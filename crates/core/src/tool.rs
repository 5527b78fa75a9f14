//! Tool call supports.

mod error;
mod object;
mod registry;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use registry::{Dispatch, Registry};

/// The result of a tool call.
///
/// There is no error variant: a tool reports failures through its output,
/// so the model can read them and decide what to do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutput {
    /// Free-form text.
    Text(String),
    /// JSON data, rendered pretty-printed.
    Structured(Value),
}

impl ToolOutput {
    /// Creates a text output.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::Text(text.into())
    }

    /// Creates a structured output.
    #[inline]
    pub fn structured(value: Value) -> Self {
        Self::Structured(value)
    }

    /// Renders the output as the text sent back to the model.
    pub fn render(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Structured(value) => serde_json::to_string_pretty(value)
                .unwrap_or_else(|_| value.to_string()),
        }
    }
}

impl From<Error> for ToolOutput {
    #[inline]
    fn from(err: Error) -> Self {
        Self::Text(err.to_string())
    }
}

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as credentials or endpoints. To do
/// this, make the context an immutable state of the tool, which can be set
/// during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    ///
    /// Arguments the model sends are decoded into this type. When the model
    /// sends malformed arguments, an empty object is decoded instead, so
    /// fields should have defaults where that makes sense.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Returns the maximum number of characters of the rendered output that
    /// will be kept in the conversation. `None` keeps everything.
    fn output_limit(&self) -> Option<usize> {
        None
    }

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`.
    /// The future never fails; errors are part of the output.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolOutput> + Send + 'static;
}

/// Returns the longest prefix of `text` with at most `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
