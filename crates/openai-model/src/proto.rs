use relay_agent_model::{
    ErrorKind, ModelMessage, ModelRequest, ModelResponse, ToolSpec,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, OpenAIConfig};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FunctionCall {
    pub name: Option<String>,
    // Usually a JSON-encoded string, but some compatible servers send the
    // object itself.
    pub arguments: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ToolCall {
    pub function: Option<FunctionCall>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    pub function_call: Option<FunctionCall>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Function {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    Function { name: String, content: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    functions: Vec<Function>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'static str>,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let functions: Vec<_> = req.tools.iter().map(create_function).collect();
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        function_call: (!functions.is_empty()).then_some("auto"),
        functions,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant(content) => Message::Assistant {
            content: content.clone(),
        },
        ModelMessage::Tool(result) => Message::Function {
            name: result.name.clone(),
            content: result.content.clone(),
        },
    }
}

#[inline]
fn create_function(tool: &ToolSpec) -> Function {
    Function {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: tool.parameters.clone(),
    }
}

/// Picks the reply out of a completion. A function call wins over text,
/// then the first modern tool call.
pub fn parse_response(completion: ChatCompletion) -> Result<ModelResponse, Error> {
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(Error::new(
            "response contains no choices",
            ErrorKind::InvalidResponse,
        ));
    };
    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(Error::new(
            "response was blocked by the content filter",
            ErrorKind::Moderated,
        ));
    }

    let message = choice.message;
    let call = message.function_call.or_else(|| {
        message
            .tool_calls
            .into_iter()
            .flatten()
            .find_map(|tool_call| tool_call.function)
    });
    if let Some(FunctionCall {
        name: Some(name),
        arguments,
    }) = call
    {
        let arguments = match arguments {
            Some(Value::String(raw)) => raw,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        return Ok(ModelResponse::tool_call(name, arguments));
    }

    Ok(ModelResponse::final_text(message.content.unwrap_or_default()))
}
