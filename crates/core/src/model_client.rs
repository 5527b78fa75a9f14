use std::pin::Pin;
use std::sync::Arc;

use relay_agent_model::{
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse, ToolSpec,
};
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::conversation::Conversation;

type SendRequestResult = Result<ModelResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    match fut.await {
                        Ok(resp) => {
                            trace!("got a response: {resp:?}");
                            Ok(resp)
                        }
                        Err(err) => {
                            debug!("got an error: {err:?}");
                            Err(Box::new(err) as Box<dyn ModelProviderError>)
                        }
                    }
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends the whole conversation with the given tools and returns the
    /// model's reply.
    ///
    /// Provider errors are returned as is. Malformed tool call arguments
    /// are not an error, see [`parse_arguments`].
    pub async fn complete(
        &self,
        conversation: &Conversation,
        tools: Vec<ToolSpec>,
    ) -> Result<ModelReply, Box<dyn ModelProviderError>> {
        let req = ModelRequest {
            messages: conversation.to_model_messages(),
            tools,
        };
        let reply = match (self.handler_fn)(req).await? {
            ModelResponse::Final { text } => ModelReply::Final(text),
            ModelResponse::ToolCall(call) => ModelReply::ToolCall {
                arguments: parse_arguments(&call.arguments),
                name: call.name,
            },
        };
        Ok(reply)
    }
}

/// A reply from the model, with tool call arguments already decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelReply {
    Final(String),
    ToolCall {
        name: String,
        arguments: Map<String, Value>,
    },
}

/// Decodes raw tool call arguments into an object.
///
/// Anything that isn't a JSON object decodes to an empty object, so the
/// tool still runs (with no arguments) instead of aborting the run.
fn parse_arguments(raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(arguments)) => arguments,
        Ok(other) => {
            warn!("tool arguments are not an object: {other}");
            Map::new()
        }
        Err(err) => {
            warn!("malformed tool arguments ({err}): {raw}");
            Map::new()
        }
    }
}
