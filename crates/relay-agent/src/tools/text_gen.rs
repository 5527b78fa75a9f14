use std::fmt::{self, Debug};
use std::time::Duration;

use relay_agent_core::tool::{Error as ToolError, Tool, ToolOutput};
use reqwest::Client;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RAW_BODY_LIMIT, compact_json, require};

/// The AI Pipe OpenRouter chat completion endpoint.
pub const DEFAULT_AIPIPE_URL: &str =
    "https://aipipe.org/openrouter/v1/chat/completions";

const NOT_CONFIGURED: &str = "AIPipe token not configured. Set AIPIPE_TOKEN.";
const MAX_TOKENS: u32 = 600;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Deserialize, JsonSchema)]
#[schemars(transform = require(&["prompt"]))]
pub struct AIPipeToolParameters {
    #[serde(default)]
    #[schemars(description = "The prompt to send.")]
    prompt: String,
}

#[derive(Serialize)]
struct PromptMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [PromptMessage<'a>; 1],
    max_tokens: u32,
}

/// Endpoint and credential for [`AIPipeTool`].
#[derive(Clone)]
pub struct AIPipeConfig {
    token: Option<String>,
    endpoint: String,
    model: String,
}

impl AIPipeConfig {
    /// Creates a config for the given model, without a token.
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            token: None,
            endpoint: DEFAULT_AIPIPE_URL.to_owned(),
            model: model.into(),
        }
    }

    /// Sets the bearer token.
    #[inline]
    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Overrides the endpoint.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Debug for AIPipeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AIPipeConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

/// A tool for generating text through the AI Pipe proxy.
pub struct AIPipeTool {
    client: Client,
    config: AIPipeConfig,
    parameter_schema: Value,
}

impl AIPipeTool {
    /// Creates a new AI Pipe tool.
    #[inline]
    pub fn new(config: AIPipeConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a new AI Pipe tool that sends requests through `client`.
    pub fn with_client(client: Client, config: AIPipeConfig) -> Self {
        AIPipeTool {
            client,
            config,
            parameter_schema: schema_for!(AIPipeToolParameters).to_value(),
        }
    }
}

impl Tool for AIPipeTool {
    type Input = AIPipeToolParameters;

    fn name(&self) -> &str {
        "aipipe"
    }

    fn description(&self) -> &str {
        "Call AI Pipe proxy with a prompt"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: AIPipeToolParameters,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        let client = self.client.clone();
        let config = self.config.clone();
        async move {
            let Some(token) = config.token.as_deref().filter(|t| !t.is_empty())
            else {
                return ToolOutput::text(NOT_CONFIGURED);
            };
            match generate(&client, &config, token, &input.prompt).await {
                Ok(text) => ToolOutput::text(text),
                Err(err) => {
                    warn!("aipipe request failed: {err}");
                    ToolOutput::text(format!("AIPipe error: {err}"))
                }
            }
        }
    }
}

async fn generate(
    client: &Client,
    config: &AIPipeConfig,
    token: &str,
    prompt: &str,
) -> Result<String, ToolError> {
    let endpoint = &config.endpoint;
    let body = CompletionRequest {
        model: &config.model,
        messages: [PromptMessage {
            role: "user",
            content: prompt,
        }],
        max_tokens: MAX_TOKENS,
    };
    let resp = client
        .post(endpoint)
        .bearer_auth(token)
        .timeout(REQUEST_TIMEOUT)
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            ToolError::transport()
                .with_reason(format!("{endpoint} unreachable: {err}"))
        })?;
    let body: Value = resp.json().await.map_err(|err| {
        ToolError::invalid_response()
            .with_reason(format!("invalid response from {endpoint}: {err}"))
    })?;
    Ok(extract_text(&body))
}

/// Picks the generated text out of a completion body, falling back to
/// whatever is there.
fn extract_text(body: &Value) -> String {
    let first_choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first());
    let Some(choice) = first_choice else {
        return compact_json(body, RAW_BODY_LIMIT);
    };

    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };
    non_empty(choice.pointer("/message/content"))
        .or_else(|| non_empty(choice.get("text")))
        .unwrap_or_else(|| choice.to_string())
}
