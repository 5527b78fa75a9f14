use relay_agent_model::{ModelResponse, ToolCallRequest};
use serde::{Deserialize, Serialize};

/// One scripted reply of the test model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetResponse {
    /// Answer with a final text.
    #[serde(rename = "final")]
    Final(String),
    /// Request a tool call. Arguments are passed through unparsed.
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
    /// Fail the request with a transport error and this message.
    #[serde(rename = "failure")]
    Failure(String),
}

impl PresetResponse {
    /// Creates a `PresetResponse` answering with `text`.
    #[inline]
    pub fn final_text<S: Into<String>>(text: S) -> Self {
        Self::Final(text.into())
    }

    /// Creates a `PresetResponse` requesting the tool `name`.
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

    pub(crate) fn into_result(self) -> Result<ModelResponse, String> {
        match self {
            PresetResponse::Final(text) => Ok(ModelResponse::final_text(text)),
            PresetResponse::ToolCall(req) => Ok(ModelResponse::ToolCall(req)),
            PresetResponse::Failure(message) => Err(message),
        }
    }
}
