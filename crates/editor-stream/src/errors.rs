use crate::model::ProviderKind;

/// Failure of a generation, delivered through `StreamCallbacks::on_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The call could not be established or the byte stream broke mid-read.
    #[error("transport error ({provider}): {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
    },
    /// The provider answered with a non-success HTTP status.
    #[error("provider returned status {status} ({provider}): {message}")]
    Status {
        provider: ProviderKind,
        status: u16,
        message: String,
    },
    /// The provider reported an error inside the stream body.
    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: ProviderKind,
        message: String,
    },
    /// The caller aborted the generation.
    #[error("generation cancelled")]
    Cancelled,
}

impl StreamError {
    /// Creates a transport-level error.
    pub fn transport(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Transport {
            provider,
            message: message.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn status(provider: ProviderKind, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            provider,
            status,
            message: message.into(),
        }
    }

    /// Creates an in-body provider error.
    pub fn provider_error(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// True when the caller aborted the generation.
    ///
    /// Callers use this to suppress error UI for user-initiated cancels.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the provider associated with this error, if any.
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            Self::Transport { provider, .. }
            | Self::Status { provider, .. }
            | Self::Provider { provider, .. } => Some(*provider),
            Self::Cancelled => None,
        }
    }

    /// Short machine-friendly code used in structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Provider { .. } => "provider",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Errors raised while configuring a generator or preparing a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    /// Invalid client configuration (missing key, bad base URL, ...).
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input (empty history, zero budget, ...).
    #[error("validation error: {0}")]
    Validation(String),
}
