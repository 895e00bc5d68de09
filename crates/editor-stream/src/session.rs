use std::time::Duration;

use tracing::debug;

use crate::batcher::OutputBatcher;
use crate::parser::{FrameParser, StreamEvent};
use crate::utf8::Utf8Decoder;

/// Per-attempt mutable state of one streaming call.
///
/// Created when an attempt starts and dropped when it ends; never shared
/// between attempts or requests.
#[derive(Debug)]
pub struct StreamSession {
    parser: FrameParser,
    decoder: Utf8Decoder,
    /// Unconsumed tail from the last `feed`.
    buffer: String,
    full_text: String,
    pub(crate) batcher: OutputBatcher,
    deltas: u64,
}

/// Outcome of ingesting one chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum Ingest {
    Continue,
    /// The provider reported an error inside the body; the attempt must end.
    ProviderError(String),
}

impl StreamSession {
    pub fn new(parser: FrameParser, flush_interval: Duration) -> Self {
        Self {
            parser,
            decoder: Utf8Decoder::default(),
            buffer: String::new(),
            full_text: String::new(),
            batcher: OutputBatcher::new(flush_interval),
            deltas: 0,
        }
    }

    /// Decodes `chunk`, parses complete frames and queues their text.
    pub fn ingest(&mut self, chunk: &[u8]) -> Ingest {
        let text = self.decoder.push_chunk(chunk);
        if text.is_empty() {
            return Ingest::Continue;
        }
        self.buffer.push_str(&text);
        let parsed = self.parser.feed(&self.buffer);
        self.buffer = parsed.remainder;

        for event in parsed.events {
            match event {
                StreamEvent::TextDelta { text } => {
                    self.deltas += 1;
                    self.full_text.push_str(&text);
                    self.batcher.add(&text);
                }
                StreamEvent::Stop => {
                    debug!(
                        event = "stream.stop_received",
                        domain = "stream",
                        provider = %self.parser.provider(),
                        deltas = self.deltas
                    );
                }
                StreamEvent::ProviderError { message } => {
                    return Ingest::ProviderError(message);
                }
            }
        }
        Ingest::Continue
    }

    /// Called at natural end of stream. Incomplete trailing data is dropped.
    pub fn close(&mut self) {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        if !self.buffer.trim().is_empty() {
            debug!(
                event = "stream.trailing_data_dropped",
                domain = "stream",
                provider = %self.parser.provider(),
                bytes = self.buffer.len() as u64
            );
        }
        self.buffer.clear();
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn into_full_text(self) -> String {
        self.full_text
    }

    /// Number of text deltas received so far.
    pub fn deltas(&self) -> u64 {
        self.deltas
    }
}
