use std::time::Duration;

use crate::errors::SetupError;

pub(crate) const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Configuration for the Gemini client.
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Base URL of the Generative Language API.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Model name, for example `gemini-2.0-flash`.
    pub model: String,
    /// Connect timeout, and the longest gap allowed between two body reads.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Creates a config with sensible defaults and a provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, SetupError> {
        let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(SetupError::Config(
                "missing GEMINI_API_KEY for Gemini provider".into(),
            ));
        }
        Ok(Self::new(api_key))
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the default connect and read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SetupError> {
        if self.api_key.trim().is_empty() {
            return Err(SetupError::Config(
                "Gemini config api_key must not be empty".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(SetupError::Config("Gemini model must not be empty".into()));
        }
        Ok(())
    }

    pub(crate) fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
