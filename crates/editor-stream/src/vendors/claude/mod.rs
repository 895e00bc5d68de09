//! Claude (Messages API) integration.
mod config;
pub(crate) mod request;

pub use config::ClaudeConfig;
