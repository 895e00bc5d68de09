//! Common imports for embedding the streaming layer in an editor.
pub use crate::{
    AbortHandle, ClaudeConfig, GeminiConfig, Generation, GenerationOptions, Generator,
    Message, ProviderConfig, ProviderKind, RetryPolicy, Role, SetupError, SpawnedGeneration,
    StreamCallbacks, StreamError, StreamUpdate, TextCollector, init_observability,
};
