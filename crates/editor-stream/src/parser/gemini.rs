use tracing::{debug, warn};

use super::{ParseResult, StreamEvent, error_message};

const DATA_PREFIX: &str = "data:";
const DONE_TOKEN: &str = "[DONE]";

/// Decoder for Gemini's `streamGenerateContent?alt=sse` output.
///
/// Every complete line is an independent frame; a line is complete once its
/// terminating `\n` has arrived.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GeminiParser;

impl GeminiParser {
    pub fn feed(&self, buffer: &str) -> ParseResult {
        let Some(idx) = buffer.rfind('\n') else {
            return ParseResult {
                events: Vec::new(),
                remainder: buffer.to_string(),
            };
        };

        let events = buffer[..idx]
            .split('\n')
            .filter_map(|raw_line| decode_line(raw_line.trim_end_matches('\r')))
            .collect();

        ParseResult {
            events,
            remainder: buffer[idx + 1..].to_string(),
        }
    }
}

fn decode_line(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() || payload == DONE_TOKEN {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                event = "parser.frame_skipped",
                domain = "parser",
                provider = "gemini",
                error = %err,
                payload_len = payload.len() as u64,
                "skipping undecodable data line"
            );
            return None;
        }
    };

    if value.get("error").is_some() {
        let message = error_message(&value).unwrap_or("Gemini stream error");
        return Some(StreamEvent::ProviderError {
            message: message.to_string(),
        });
    }

    let text = candidate_text(&value);
    if text.is_empty() {
        debug!(
            event = "parser.frame_without_text",
            domain = "parser",
            provider = "gemini"
        );
        return None;
    }
    Some(StreamEvent::TextDelta { text })
}

/// Concatenates `candidates[0].content.parts[*].text`.
fn candidate_text(value: &serde_json::Value) -> String {
    let mut out = String::new();
    let parts = value
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());
    if let Some(parts) = parts {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                out.push_str(text);
            }
        }
    }
    out
}
