//! Provider-specific configuration and request bodies.

pub mod claude;
pub mod gemini;

use std::time::Duration;

use crate::errors::SetupError;
use crate::message::Message;
use crate::model::{GenerationOptions, ProviderKind};
use crate::parser::FrameParser;
use crate::transport::StreamRequest;

pub use claude::ClaudeConfig;
pub use gemini::GeminiConfig;

/// Approximate context size of Gemini models, in tokens.
pub const GEMINI_TOKEN_BUDGET: usize = 1_000_000;
/// Approximate context size of Claude models, in tokens.
pub const CLAUDE_TOKEN_BUDGET: usize = 200_000;

/// Selects a provider and carries its configuration.
#[derive(Clone, Debug)]
pub enum ProviderConfig {
    Gemini(GeminiConfig),
    Claude(ClaudeConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Gemini(_) => ProviderKind::Gemini,
            Self::Claude(_) => ProviderKind::Claude,
        }
    }

    /// Reads the API key of `kind` from its usual environment variable.
    pub fn from_env(kind: ProviderKind) -> Result<Self, SetupError> {
        match kind {
            ProviderKind::Gemini => GeminiConfig::from_env().map(Self::Gemini),
            ProviderKind::Claude => ClaudeConfig::from_env().map(Self::Claude),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Gemini(config) => &config.model,
            Self::Claude(config) => &config.model,
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            Self::Gemini(config) => config.timeout,
            Self::Claude(config) => config.timeout,
        }
    }

    /// Token budget used for context trimming when none is set explicitly.
    pub fn default_token_budget(&self) -> usize {
        match self {
            Self::Gemini(_) => GEMINI_TOKEN_BUDGET,
            Self::Claude(_) => CLAUDE_TOKEN_BUDGET,
        }
    }

    pub fn parser(&self) -> FrameParser {
        FrameParser::for_provider(self.kind())
    }

    pub(crate) fn validate(&self) -> Result<(), SetupError> {
        match self {
            Self::Gemini(config) => config.validate(),
            Self::Claude(config) => config.validate(),
        }
    }

    /// Builds the streaming request for an already trimmed history.
    pub fn build_request(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> StreamRequest {
        match self {
            Self::Gemini(config) => gemini::request::build_request(config, messages, options),
            Self::Claude(config) => claude::request::build_request(config, messages, options),
        }
    }
}

impl From<GeminiConfig> for ProviderConfig {
    fn from(config: GeminiConfig) -> Self {
        Self::Gemini(config)
    }
}

impl From<ClaudeConfig> for ProviderConfig {
    fn from(config: ClaudeConfig) -> Self {
        Self::Claude(config)
    }
}
