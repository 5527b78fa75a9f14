use std::time::Duration;

use relay_agent_core::tool::{Error as ToolError, Tool, ToolOutput};
use reqwest::Client;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::require;

/// The endpoint of a sandbox running on the local machine.
pub const DEFAULT_SANDBOX_URL: &str = "http://localhost:8081/run_js";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const OUTPUT_LIMIT: usize = 4000;

#[derive(Serialize, Deserialize, JsonSchema)]
#[schemars(transform = require(&["code"]))]
pub struct RunJsToolParameters {
    #[serde(default)]
    #[schemars(description = "The JavaScript code to run.")]
    code: String,
}

/// A tool for running JavaScript in an external sandbox service.
///
/// The sandbox replies with JSON, which is handed to the model as is.
pub struct RunJsTool {
    client: Client,
    endpoint: String,
    parameter_schema: Value,
}

impl RunJsTool {
    /// Creates a new sandbox tool posting to `endpoint`.
    #[inline]
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Creates a new sandbox tool that sends requests through `client`.
    pub fn with_client<S: Into<String>>(client: Client, endpoint: S) -> Self {
        RunJsTool {
            client,
            endpoint: endpoint.into(),
            parameter_schema: schema_for!(RunJsToolParameters).to_value(),
        }
    }
}

impl Default for RunJsTool {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_SANDBOX_URL)
    }
}

impl Tool for RunJsTool {
    type Input = RunJsToolParameters;

    fn name(&self) -> &str {
        "run_js"
    }

    fn description(&self) -> &str {
        "Execute JS code in a sandbox and return result"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn output_limit(&self) -> Option<usize> {
        Some(OUTPUT_LIMIT)
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: RunJsToolParameters,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        async move {
            match run(&client, &endpoint, &input).await {
                Ok(value) => ToolOutput::structured(value),
                Err(err) => {
                    warn!("sandbox request failed: {err}");
                    ToolOutput::structured(json!({ "error": err.to_string() }))
                }
            }
        }
    }
}

async fn run(
    client: &Client,
    endpoint: &str,
    input: &RunJsToolParameters,
) -> Result<Value, ToolError> {
    let resp = client
        .post(endpoint)
        .timeout(REQUEST_TIMEOUT)
        .json(input)
        .send()
        .await
        .map_err(|err| {
            ToolError::transport()
                .with_reason(format!("{endpoint} unreachable: {err}"))
        })?;
    resp.json().await.map_err(|err| {
        ToolError::invalid_response()
            .with_reason(format!("{endpoint} returned invalid JSON: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn input(code: &str) -> RunJsToolParameters {
        RunJsToolParameters {
            code: code.to_owned(),
        }
    }

    #[test]
    fn test_required_parameters() {
        let tool = RunJsTool::default();
        assert_eq!(tool.parameter_schema()["required"], json!(["code"]));
    }

    #[tokio::test]
    async fn test_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run_js"))
            .and(body_json(json!({ "code": "return 1 + 1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "2",
                "logs": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = RunJsTool::new(format!("{}/run_js", server.uri()));
        let output = tool.execute(input("return 1 + 1")).await;
        assert_eq!(
            output,
            ToolOutput::structured(json!({ "result": "2", "logs": [] }))
        );
        assert_eq!(tool.output_limit(), Some(4000));
    }

    #[tokio::test]
    async fn test_sandbox_errors_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "code (string) required"
            })))
            .mount(&server)
            .await;

        let tool = RunJsTool::new(format!("{}/run_js", server.uri()));
        let output = tool.execute(input("")).await;
        assert_eq!(
            output,
            ToolOutput::structured(json!({ "error": "code (string) required" }))
        );
    }

    #[tokio::test]
    async fn test_unreachable() {
        let tool = RunJsTool::new("http://127.0.0.1:1/run_js");
        let ToolOutput::Structured(value) = tool.execute(input("1")).await else {
            panic!("expected structured output");
        };
        let error = value["error"].as_str().unwrap();
        assert!(error.starts_with("http://127.0.0.1:1/run_js unreachable: "));
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>"))
            .mount(&server)
            .await;

        let endpoint = format!("{}/run_js", server.uri());
        let ToolOutput::Structured(value) =
            RunJsTool::new(&endpoint).execute(input("1")).await
        else {
            panic!("expected structured output");
        };
        let error = value["error"].as_str().unwrap();
        assert!(error.starts_with(&format!("{endpoint} returned invalid JSON: ")));
    }
}
