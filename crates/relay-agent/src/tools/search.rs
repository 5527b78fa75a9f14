use std::fmt::{self, Debug};
use std::time::Duration;

use relay_agent_core::tool::{Error as ToolError, Tool, ToolOutput};
use reqwest::{Client, Url};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{RAW_BODY_LIMIT, compact_json, require};

/// Returned instead of results when no provider has credentials.
pub const NOT_CONFIGURED: &str = "No search provider configured. Set SERPAPI_API_KEY or GOOGLE_API_KEY + GOOGLE_CX.";

/// The number of results returned when the model doesn't ask for a count.
pub const DEFAULT_RESULTS: usize = 3;

/// The largest number of results the model may ask for.
pub const DEFAULT_MAX_RESULTS: usize = 5;

const SERPAPI_BASE_URL: &str = "https://serpapi.com";
const GOOGLE_BASE_URL: &str = "https://www.googleapis.com";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Deserialize, JsonSchema)]
#[schemars(transform = require(&["query"]))]
pub struct SearchToolParameters {
    #[serde(alias = "q", default)]
    #[schemars(description = "What to search for.")]
    query: String,
    #[serde(default, deserialize_with = "lenient_count")]
    #[schemars(
        with = "Option<i64>",
        description = "How many results to return."
    )]
    k: Option<i64>,
}

/// Accepts a count given as a whole number, possibly inside a string.
/// Anything else counts as not given.
fn lenient_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_count))
}

fn parse_count(value: &Value) -> Option<i64> {
    let whole = |f: f64| (f.is_finite() && f.fract() == 0.0).then_some(f as i64);
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole))
        }
        _ => None,
    }
}

/// Credentials and limits for [`SearchTool`].
///
/// SerpApi is used when its key is set. Otherwise Google Custom Search is
/// used when both its key and engine id are set.
#[derive(Clone)]
pub struct SearchConfig {
    serpapi_key: Option<String>,
    serpapi_base_url: String,
    google_api_key: Option<String>,
    google_cx: Option<String>,
    google_base_url: String,
    default_results: usize,
    max_results: usize,
}

impl SearchConfig {
    /// Creates a config with no provider configured.
    pub fn new() -> Self {
        Self {
            serpapi_key: None,
            serpapi_base_url: SERPAPI_BASE_URL.to_owned(),
            google_api_key: None,
            google_cx: None,
            google_base_url: GOOGLE_BASE_URL.to_owned(),
            default_results: DEFAULT_RESULTS,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Sets the SerpApi key.
    #[inline]
    pub fn with_serpapi_key<S: Into<String>>(mut self, key: S) -> Self {
        self.serpapi_key = Some(key.into());
        self
    }

    /// Sets the Google Custom Search key and engine id.
    #[inline]
    pub fn with_google<K: Into<String>, C: Into<String>>(
        mut self,
        api_key: K,
        cx: C,
    ) -> Self {
        self.google_api_key = Some(api_key.into());
        self.google_cx = Some(cx.into());
        self
    }

    /// Overrides the SerpApi base URL.
    #[inline]
    pub fn with_serpapi_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.serpapi_base_url = url.into();
        self
    }

    /// Overrides the Google API base URL.
    #[inline]
    pub fn with_google_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.google_base_url = url.into();
        self
    }

    /// Sets the number of results used when the model doesn't ask for one.
    #[inline]
    pub fn with_default_results(mut self, count: usize) -> Self {
        self.default_results = count;
        self
    }

    /// Sets the upper bound of the result count.
    #[inline]
    pub fn with_max_results(mut self, count: usize) -> Self {
        self.max_results = count;
        self
    }

    fn provider(&self) -> Option<Provider> {
        let set = |v: &Option<String>| v.clone().filter(|v| !v.is_empty());
        if let Some(key) = set(&self.serpapi_key) {
            return Some(Provider::SerpApi {
                key,
                base_url: self.serpapi_base_url.clone(),
            });
        }
        match (set(&self.google_api_key), set(&self.google_cx)) {
            (Some(key), Some(cx)) => Some(Provider::Google {
                key,
                cx,
                base_url: self.google_base_url.clone(),
            }),
            _ => None,
        }
    }

    fn result_count(&self, requested: Option<i64>) -> usize {
        let max = self.max_results.max(1);
        match requested {
            Some(k) => {
                let max = i64::try_from(max).unwrap_or(i64::MAX);
                // In range, so the cast can't truncate.
                k.clamp(1, max) as usize
            }
            None => self.default_results.clamp(1, max),
        }
    }
}

impl Default for SearchConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("SearchConfig")
            .field("serpapi_key", &redact(&self.serpapi_key))
            .field("serpapi_base_url", &self.serpapi_base_url)
            .field("google_api_key", &redact(&self.google_api_key))
            .field("google_cx", &self.google_cx)
            .field("google_base_url", &self.google_base_url)
            .field("default_results", &self.default_results)
            .field("max_results", &self.max_results)
            .finish()
    }
}

enum Provider {
    SerpApi { key: String, base_url: String },
    Google { key: String, cx: String, base_url: String },
}

impl Provider {
    fn label(&self) -> &'static str {
        match self {
            Provider::SerpApi { .. } => "SerpApi",
            Provider::Google { .. } => "Google CSE",
        }
    }

    fn url(&self, query: &str, count: usize) -> Result<Url, ToolError> {
        let num = count.to_string();
        let url = match self {
            Provider::SerpApi { key, base_url } => Url::parse_with_params(
                &format!("{}/search.json", base_url.trim_end_matches('/')),
                [("q", query), ("api_key", key.as_str()), ("num", num.as_str())],
            ),
            Provider::Google { key, cx, base_url } => Url::parse_with_params(
                &format!("{}/customsearch/v1", base_url.trim_end_matches('/')),
                [
                    ("q", query),
                    ("key", key.as_str()),
                    ("cx", cx.as_str()),
                    ("num", num.as_str()),
                ],
            ),
        };
        url.map_err(|err| ToolError::not_configured().with_reason(err.to_string()))
    }

    fn parse(&self, body: Value) -> SearchResults {
        let hits: Vec<Hit> = match self {
            Provider::SerpApi { .. } => SerpApiBody::deserialize(&body)
                .map(|parsed| {
                    parsed.organic_results.into_iter().map(Hit::from).collect()
                })
                .unwrap_or_default(),
            Provider::Google { .. } => GoogleBody::deserialize(&body)
                .map(|parsed| parsed.items.into_iter().map(Hit::from).collect())
                .unwrap_or_default(),
        };
        if hits.is_empty() {
            SearchResults::Unrecognized(body)
        } else {
            SearchResults::Hits(hits)
        }
    }
}

#[derive(Deserialize)]
struct SerpApiBody {
    organic_results: Vec<SerpApiResult>,
}

#[derive(Deserialize)]
struct SerpApiResult {
    title: Option<String>,
    snippet: Option<String>,
    snippet_text: Option<String>,
    link: Option<String>,
}

#[derive(Deserialize)]
struct GoogleBody {
    items: Vec<GoogleItem>,
}

#[derive(Deserialize)]
struct GoogleItem {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Hit {
    title: String,
    snippet: String,
    link: String,
}

impl From<SerpApiResult> for Hit {
    fn from(result: SerpApiResult) -> Self {
        Self {
            title: result.title.unwrap_or_default(),
            snippet: result
                .snippet
                .filter(|s| !s.is_empty())
                .or(result.snippet_text)
                .unwrap_or_default(),
            link: result.link.unwrap_or_default(),
        }
    }
}

impl From<GoogleItem> for Hit {
    fn from(item: GoogleItem) -> Self {
        Self {
            title: item.title.unwrap_or_default(),
            snippet: item.snippet.unwrap_or_default(),
            link: item.link.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum SearchResults {
    Hits(Vec<Hit>),
    Unrecognized(Value),
}

impl SearchResults {
    fn render(&self, count: usize) -> String {
        match self {
            SearchResults::Hits(hits) => hits
                .iter()
                .take(count)
                .map(|hit| format!("- {}\n{}\n{}", hit.title, hit.snippet, hit.link))
                .collect::<Vec<_>>()
                .join("\n\n"),
            SearchResults::Unrecognized(body) => {
                compact_json(body, RAW_BODY_LIMIT)
            }
        }
    }
}

/// A tool for searching the web through SerpApi or Google Custom Search.
pub struct SearchTool {
    client: Client,
    config: SearchConfig,
    parameter_schema: Value,
}

impl SearchTool {
    /// Creates a new search tool.
    #[inline]
    pub fn new(config: SearchConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a new search tool that sends requests through `client`.
    pub fn with_client(client: Client, config: SearchConfig) -> Self {
        SearchTool {
            client,
            config,
            parameter_schema: schema_for!(SearchToolParameters).to_value(),
        }
    }
}

impl Tool for SearchTool {
    type Input = SearchToolParameters;

    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web and return snippet results"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: SearchToolParameters,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        let provider = self.config.provider();
        let count = self.config.result_count(input.k);
        let client = self.client.clone();
        async move {
            let Some(provider) = provider else {
                debug!("no search provider configured");
                return ToolOutput::text(NOT_CONFIGURED);
            };
            match search(&client, &provider, &input.query, count).await {
                Ok(results) => ToolOutput::text(results.render(count)),
                Err(err) => {
                    warn!("{} request failed: {err}", provider.label());
                    ToolOutput::text(format!("{} error: {err}", provider.label()))
                }
            }
        }
    }
}

async fn search(
    client: &Client,
    provider: &Provider,
    query: &str,
    count: usize,
) -> Result<SearchResults, ToolError> {
    let url = provider.url(query, count)?;
    let resp = client
        .get(url)
        .timeout(SEARCH_TIMEOUT)
        .send()
        .await
        .map_err(|err| ToolError::transport().with_reason(err.to_string()))?;
    let body: Value = resp.json().await.map_err(|err| {
        ToolError::invalid_response().with_reason(err.to_string())
    })?;
    Ok(provider.parse(body))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn input(query: &str, k: Option<i64>) -> SearchToolParameters {
        SearchToolParameters {
            query: query.to_owned(),
            k,
        }
    }

    #[test]
    fn test_lenient_k() {
        let parse = |value: Value| {
            serde_json::from_value::<SearchToolParameters>(value).unwrap().k
        };
        assert_eq!(parse(json!({ "query": "weather", "k": 2 })), Some(2));
        assert_eq!(parse(json!({ "query": "weather", "k": "2" })), Some(2));
        assert_eq!(parse(json!({ "query": "weather", "k": " 4 " })), Some(4));
        assert_eq!(parse(json!({ "query": "weather", "k": 2.0 })), Some(2));
        assert_eq!(parse(json!({ "query": "weather", "k": "3.0" })), Some(3));
        assert_eq!(parse(json!({ "query": "weather", "k": 2.5 })), None);
        assert_eq!(parse(json!({ "query": "weather", "k": "many" })), None);
        assert_eq!(parse(json!({ "query": "weather", "k": null })), None);
        assert_eq!(parse(json!({ "query": "weather", "k": [2] })), None);
        assert_eq!(parse(json!({ "q": "weather" })), None);
    }

    #[test]
    fn test_required_parameters() {
        let tool = SearchTool::new(SearchConfig::new());
        assert_eq!(tool.parameter_schema()["required"], json!(["query"]));
        assert!(tool.parameter_schema()["properties"]["k"].is_object());
    }

    #[test]
    fn test_result_count() {
        let config = SearchConfig::new();
        assert_eq!(config.result_count(None), 3);
        assert_eq!(config.result_count(Some(2)), 2);
        assert_eq!(config.result_count(Some(0)), 1);
        assert_eq!(config.result_count(Some(-4)), 1);
        assert_eq!(config.result_count(Some(50)), 5);

        let config = SearchConfig::new().with_default_results(9);
        assert_eq!(config.result_count(None), 5);
    }

    #[test]
    fn test_provider_precedence() {
        assert!(SearchConfig::new().provider().is_none());
        assert!(
            SearchConfig::new()
                .with_google("key", "")
                .provider()
                .is_none()
        );

        let config = SearchConfig::new().with_google("key", "cx");
        assert_eq!(config.provider().unwrap().label(), "Google CSE");

        let config = config.with_serpapi_key("serp");
        assert_eq!(config.provider().unwrap().label(), "SerpApi");
    }

    #[test]
    fn test_parse_and_render() {
        let provider = Provider::SerpApi {
            key: "key".to_owned(),
            base_url: SERPAPI_BASE_URL.to_owned(),
        };
        let results = provider.parse(json!({
            "organic_results": [
                { "title": "A", "snippet": "first", "link": "https://a" },
                { "title": "B", "snippet_text": "second", "link": "https://b" },
                { "title": "C", "snippet": "third", "link": "https://c" }
            ]
        }));
        assert_eq!(
            results.render(2),
            "- A\nfirst\nhttps://a\n\n- B\nsecond\nhttps://b"
        );

        let body = json!({ "error": "Invalid API key", "padding": "x".repeat(3000) });
        let results = provider.parse(body);
        assert!(matches!(results, SearchResults::Unrecognized(_)));
        let rendered = results.render(3);
        assert_eq!(rendered.chars().count(), 1500);
        assert!(rendered.starts_with("{\"error\":\"Invalid API key\""));
    }

    #[tokio::test]
    async fn test_string_k_still_searches() {
        let input: SearchToolParameters =
            serde_json::from_value(json!({ "query": "weather", "k": "2" }))
                .unwrap();
        let output = SearchTool::new(SearchConfig::new()).execute(input).await;
        assert_eq!(output, ToolOutput::text(NOT_CONFIGURED));
    }

    #[tokio::test]
    async fn test_not_configured() {
        let tool = SearchTool::new(SearchConfig::new());
        let output = tool.execute(input("weather", Some(2))).await;
        assert_eq!(output, ToolOutput::text(NOT_CONFIGURED));
    }

    #[tokio::test]
    async fn test_serpapi() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "rust lang"))
            .and(query_param("api_key", "serp-key"))
            .and(query_param("num", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [
                    { "title": "Rust", "snippet": "A language", "link": "https://rust-lang.org" },
                    { "title": "Rust (game)", "snippet": "A game", "link": "https://rust.facepunch.com" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = SearchConfig::new()
            .with_serpapi_key("serp-key")
            .with_serpapi_base_url(server.uri());
        let tool = SearchTool::new(config);
        let output = tool.execute(input("rust lang", Some(1))).await;
        assert_eq!(
            output,
            ToolOutput::text("- Rust\nA language\nhttps://rust-lang.org")
        );
    }

    #[tokio::test]
    async fn test_google() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("key", "g-key"))
            .and(query_param("cx", "engine"))
            .and(query_param("num", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "title": "Weather", "snippet": "Sunny", "link": "https://w" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = SearchConfig::new()
            .with_google("g-key", "engine")
            .with_google_base_url(server.uri());
        let tool = SearchTool::new(config);
        let output = tool.execute(input("weather", None)).await;
        assert_eq!(output, ToolOutput::text("- Weather\nSunny\nhttps://w"));
    }

    #[tokio::test]
    async fn test_errors_are_inline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let config = SearchConfig::new()
            .with_serpapi_key("serp-key")
            .with_serpapi_base_url(server.uri());
        let output = SearchTool::new(config)
            .execute(input("weather", None))
            .await;
        assert!(output.render().starts_with("SerpApi error: "));

        let config = SearchConfig::new()
            .with_google("g-key", "engine")
            .with_google_base_url("http://127.0.0.1:1");
        let output = SearchTool::new(config)
            .execute(input("weather", None))
            .await;
        assert!(output.render().starts_with("Google CSE error: "));
    }
}
