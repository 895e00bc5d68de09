//! Incremental decoders for the provider wire formats.
//!
//! Both decoders are stateless: the caller keeps the unconsumed `remainder`
//! and prepends it to the next chunk. Feeding a stream in any number of pieces
//! yields the same events as feeding it whole.
mod claude;
mod gemini;

pub use claude::ClaudeParser;
pub use gemini::GeminiParser;

use crate::model::ProviderKind;

/// One decoded unit of provider output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental fragment of the answer, order-significant.
    TextDelta { text: String },
    /// Explicit end-of-message marker.
    Stop,
    /// Error reported inside the stream body.
    ProviderError { message: String },
}

/// Output of one `feed` call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseResult {
    /// Events decoded from complete frames, in arrival order.
    pub events: Vec<StreamEvent>,
    /// Unconsumed tail of the input (an incomplete frame).
    pub remainder: String,
}

/// Provider-specific frame decoder, selected once per request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameParser {
    Gemini(GeminiParser),
    Claude(ClaudeParser),
}

impl FrameParser {
    /// Returns the decoder for the given provider.
    pub fn for_provider(provider: ProviderKind) -> Self {
        match provider {
            ProviderKind::Gemini => Self::Gemini(GeminiParser),
            ProviderKind::Claude => Self::Claude(ClaudeParser),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::Gemini(_) => ProviderKind::Gemini,
            Self::Claude(_) => ProviderKind::Claude,
        }
    }

    /// Decodes every complete frame in `buffer`.
    pub fn feed(&self, buffer: &str) -> ParseResult {
        match self {
            Self::Gemini(parser) => parser.feed(buffer),
            Self::Claude(parser) => parser.feed(buffer),
        }
    }
}

/// Extracts `error.message` (or a top-level `message`) from a JSON payload.
pub(crate) fn error_message(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
        .or_else(|| value.get("message").and_then(|v| v.as_str()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Feeds `chunks` one after another, seeding each call with the previous
    /// remainder, and returns all events plus the final remainder.
    pub(crate) fn feed_in_chunks(parser: FrameParser, chunks: &[&str]) -> ParseResult {
        let mut buffer = String::new();
        let mut events = Vec::new();
        for chunk in chunks {
            buffer.push_str(chunk);
            let result = parser.feed(&buffer);
            events.extend(result.events);
            buffer = result.remainder;
        }
        ParseResult {
            events,
            remainder: buffer,
        }
    }

    /// Asserts that splitting `input` at every char boundary decodes to the
    /// same result as a single feed. Three-way splits are sampled.
    pub(crate) fn assert_resumable(parser: FrameParser, input: &str) {
        let whole = parser.feed(input);
        let boundaries: Vec<usize> = (0..=input.len())
            .filter(|i| input.is_char_boundary(*i))
            .collect();
        for &i in &boundaries {
            let split = feed_in_chunks(parser, &[&input[..i], &input[i..]]);
            assert_eq!(split, whole, "split at {i}");
        }
        let sampled: Vec<usize> = boundaries.iter().copied().step_by(5).collect();
        for (n, &i) in sampled.iter().enumerate() {
            for &j in &sampled[n..] {
                let split = feed_in_chunks(parser, &[&input[..i], &input[i..j], &input[j..]]);
                assert_eq!(split.events, whole.events, "split at {i}/{j}");
            }
        }
    }

    pub(crate) fn text_of(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
