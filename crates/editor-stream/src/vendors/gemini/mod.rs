//! Gemini (`streamGenerateContent`) integration.
mod config;
pub(crate) mod request;

pub use config::GeminiConfig;
