use serde::{Deserialize, Serialize};

/// A complete response from the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelResponse {
    /// The model answered directly.
    Final {
        /// The answer text.
        text: String,
    },
    /// The model elected to call a tool instead of answering.
    ToolCall(ToolCallRequest),
}

/// Describes a tool call request from the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The name of the tool to call.
    pub name: String,
    /// The arguments exactly as the model produced them.
    ///
    /// This is usually a JSON object, but nothing guarantees that. It's up
    /// to the consumer to decide what to do with a malformed payload.
    pub arguments: String,
}

impl ModelResponse {
    /// Creates a final response.
    #[inline]
    pub fn final_text<S: Into<String>>(text: S) -> Self {
        Self::Final { text: text.into() }
    }

    /// Creates a tool call response.
    #[inline]
    pub fn tool_call<N: Into<String>, A: Into<String>>(
        name: N,
        arguments: A,
    ) -> Self {
        Self::ToolCall(ToolCallRequest {
            name: name.into(),
            arguments: arguments.into(),
        })
    }
}
