use std::time::Duration;

use crate::errors::SetupError;

pub(crate) const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for the Claude client.
#[derive(Clone)]
pub struct ClaudeConfig {
    /// API key sent in the `x-api-key` header.
    pub api_key: String,
    /// Base URL of the Anthropic API.
    pub base_url: String,
    pub model: String,
    /// Value of the `anthropic-version` header.
    pub api_version: String,
    /// Connect timeout, and the longest gap allowed between two body reads.
    pub timeout: Duration,
}

impl ClaudeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            model: DEFAULT_CLAUDE_MODEL.to_string(),
            api_version: ANTHROPIC_VERSION.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, SetupError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(SetupError::Config(
                "missing ANTHROPIC_API_KEY for Claude provider".into(),
            ));
        }
        Ok(Self::new(api_key))
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SetupError> {
        if self.api_key.trim().is_empty() {
            return Err(SetupError::Config(
                "Claude config api_key must not be empty".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(SetupError::Config("Claude model must not be empty".into()));
        }
        Ok(())
    }

    pub(crate) fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
