//! Configuration loaded from environment variables.
//!
//! - `OPENAI_API_KEY`: model credential, required to build the provider.
//! - `OPENAI_BASE_URL`: model endpoint. Defaults to the OpenAI API.
//! - `OPENAI_MODEL`: model identifier, also used by the AI Pipe tool.
//!   Defaults to `gpt-4o-mini`.
//! - `SERPAPI_API_KEY`: SerpApi credential.
//! - `GOOGLE_API_KEY` and `GOOGLE_CX`: Google Custom Search credential and
//!   engine id.
//! - `AIPIPE_TOKEN`: AI Pipe bearer token.
//! - `AIPIPE_URL`: AI Pipe endpoint.
//! - `JS_SANDBOX_URL`: sandbox endpoint. Defaults to
//!   `http://localhost:8081/run_js`.
//! - `MAX_SEARCH_RESULTS`: results returned when the model doesn't ask for a
//!   count. Defaults to `3`.
//! - `AGENT_MAX_ITERATIONS`: model calls allowed per run. Defaults to `6`.
//!
//! Empty values are treated as unset.

use std::env;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use relay_agent_core::DEFAULT_MAX_ITERATIONS;
use relay_agent_openai_model::{OpenAIConfig, OpenAIConfigBuilder};
use thiserror::Error;

use crate::tools::{
    AIPipeConfig, DEFAULT_AIPIPE_URL, DEFAULT_RESULTS, DEFAULT_SANDBOX_URL,
    SearchConfig,
};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// An error that occurred while loading [`Settings`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// A variable is set to something that can't be used.
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Everything the agent needs to know about its environment.
#[derive(Clone)]
pub struct Settings {
    /// The model credential.
    pub openai_api_key: Option<String>,
    /// A custom model endpoint.
    pub openai_base_url: Option<String>,
    /// The model identifier.
    pub model: String,
    /// The SerpApi credential.
    pub serpapi_api_key: Option<String>,
    /// The Google Custom Search credential.
    pub google_api_key: Option<String>,
    /// The Google Custom Search engine id.
    pub google_cx: Option<String>,
    /// The AI Pipe bearer token.
    pub aipipe_token: Option<String>,
    /// The AI Pipe endpoint.
    pub aipipe_url: String,
    /// The sandbox endpoint.
    pub js_sandbox_url: String,
    /// The number of search results when the model doesn't ask for one.
    pub max_search_results: usize,
    /// The maximum number of model calls per run.
    pub max_iterations: usize,
}

impl Settings {
    /// Loads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable doesn't
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads settings from an arbitrary lookup function, which returns the
    /// value of a variable by name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL"),
            model: var("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            serpapi_api_key: var("SERPAPI_API_KEY"),
            google_api_key: var("GOOGLE_API_KEY"),
            google_cx: var("GOOGLE_CX"),
            aipipe_token: var("AIPIPE_TOKEN"),
            aipipe_url: var("AIPIPE_URL")
                .unwrap_or_else(|| DEFAULT_AIPIPE_URL.to_owned()),
            js_sandbox_url: var("JS_SANDBOX_URL")
                .unwrap_or_else(|| DEFAULT_SANDBOX_URL.to_owned()),
            max_search_results: parse_var(
                "MAX_SEARCH_RESULTS",
                var("MAX_SEARCH_RESULTS"),
                DEFAULT_RESULTS,
            )?,
            max_iterations: parse_var(
                "AGENT_MAX_ITERATIONS",
                var("AGENT_MAX_ITERATIONS"),
                DEFAULT_MAX_ITERATIONS,
            )?,
        })
    }

    /// Builds the model provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if there's no API key.
    pub fn openai_config(&self) -> Result<OpenAIConfig, ConfigError> {
        let Some(api_key) = &self.openai_api_key else {
            return Err(ConfigError::MissingEnvVar("OPENAI_API_KEY".to_owned()));
        };
        let mut builder =
            OpenAIConfigBuilder::with_api_key(api_key).with_model(&self.model);
        if let Some(base_url) = &self.openai_base_url {
            builder = builder.with_base_url(base_url);
        }
        Ok(builder.build())
    }

    /// Builds the search tool configuration.
    pub fn search_config(&self) -> SearchConfig {
        let mut config =
            SearchConfig::new().with_default_results(self.max_search_results);
        if let Some(key) = &self.serpapi_api_key {
            config = config.with_serpapi_key(key);
        }
        if let (Some(key), Some(cx)) = (&self.google_api_key, &self.google_cx) {
            config = config.with_google(key, cx);
        }
        config
    }

    /// Builds the AI Pipe tool configuration.
    pub fn aipipe_config(&self) -> AIPipeConfig {
        let config =
            AIPipeConfig::new(&self.model).with_endpoint(&self.aipipe_url);
        match &self.aipipe_token {
            Some(token) => config.with_token(token),
            None => config,
        }
    }
}

fn parse_var<T>(
    name: &str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        Some(value) => value.trim().parse().map_err(|err: T::Err| {
            ConfigError::InvalidValue(name.to_owned(), format!("{err}"))
        }),
        None => Ok(default),
    }
}

impl Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Settings")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("serpapi_api_key", &redact(&self.serpapi_api_key))
            .field("google_api_key", &redact(&self.google_api_key))
            .field("google_cx", &self.google_cx)
            .field("aipipe_token", &redact(&self.aipipe_token))
            .field("aipipe_url", &self.aipipe_url)
            .field("js_sandbox_url", &self.js_sandbox_url)
            .field("max_search_results", &self.max_search_results)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}
