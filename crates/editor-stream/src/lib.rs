//! Streaming response layer for editor LLM providers.
//!
//! A [`Generator`] trims the conversation to the provider's context budget,
//! opens one streaming call per attempt, decodes the provider's frames as
//! bytes arrive and hands batched text to [`StreamCallbacks`]. Transient
//! failures are retried with exponential backoff; an [`AbortHandle`] cancels
//! at any point.
//!
//! ```no_run
//! use editor_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let generator = Generator::builder()
//!     .provider(ClaudeConfig::from_env()?)
//!     .build()?;
//!
//! let mut spawned = generator
//!     .start(&[Message::user("Fix the typo: teh cat")])?
//!     .spawn();
//! while let Some(update) = spawned.next_update().await {
//!     if let StreamUpdate::Fragment(text) = update {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Output batching between the read loop and the consumer.
pub mod batcher;
/// Context window trimming.
pub mod context;
/// Read loop, callbacks and cancellation.
pub mod coordinator;
/// Error types.
pub mod errors;
/// Generator entry point and per-request generations.
pub mod generator;
/// Conversation messages.
pub mod message;
/// Provider identifiers and generation parameters.
pub mod model;
/// Tracing subscriber setup.
pub mod observability;
/// Wire-format frame decoders.
pub mod parser;
/// Common imports for typical usage.
pub mod prelude;
/// Retry with exponential backoff.
pub mod retry;
/// Per-attempt stream state.
pub mod session;
/// Channel and collector sinks.
pub mod stream;
/// HTTP transport seam.
pub mod transport;
/// Incremental UTF-8 decoding.
pub mod utf8;
/// Provider configuration and request bodies.
pub mod vendors;

pub use batcher::OutputBatcher;
pub use context::ContextWindow;
pub use coordinator::{AbortHandle, AbortSignal, StreamCallbacks, StreamCoordinator, abort_pair};
pub use errors::{SetupError, StreamError};
pub use generator::{Generation, Generator, GeneratorBuilder, SpawnedGeneration};
pub use message::{Message, Role};
pub use model::{GenerationOptions, ProviderKind};
pub use observability::init_observability;
pub use parser::{ClaudeParser, FrameParser, GeminiParser, ParseResult, StreamEvent};
pub use retry::RetryPolicy;
pub use session::StreamSession;
pub use stream::{StreamUpdate, TextCollector};
pub use transport::{ByteStream, ReqwestTransport, StreamRequest, Transport};
pub use utf8::Utf8Decoder;
pub use vendors::{ClaudeConfig, GeminiConfig, ProviderConfig};
