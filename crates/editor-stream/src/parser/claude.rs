use tracing::{debug, warn};

use super::{ParseResult, StreamEvent, error_message};

/// Decoder for Claude's Messages API server-sent events.
///
/// A frame is the group of lines up to the next blank line. A frame whose
/// closing blank line has not arrived stays in the remainder untouched.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ClaudeParser;

#[derive(Default)]
struct Frame<'a> {
    event: Option<&'a str>,
    data: Vec<&'a str>,
}

impl Frame<'_> {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }
}

impl ClaudeParser {
    pub fn feed(&self, buffer: &str) -> ParseResult {
        let mut events = Vec::new();
        let mut frame = Frame::default();
        // Byte offset where the currently open frame begins.
        let mut frame_start = 0;
        let mut line_start = 0;

        while let Some(rel) = buffer[line_start..].find('\n') {
            let line_end = line_start + rel;
            let line = buffer[line_start..line_end].trim_end_matches('\r');
            line_start = line_end + 1;

            if line.is_empty() {
                if !frame.is_empty() {
                    if let Some(event) = decode_frame(&frame) {
                        events.push(event);
                    }
                    frame = Frame::default();
                }
                frame_start = line_start;
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("event:") {
                frame.event = Some(rest.trim());
            } else if let Some(rest) = line.strip_prefix("data:") {
                frame.data.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }

        ParseResult {
            events,
            remainder: buffer[frame_start..].to_string(),
        }
    }
}

fn decode_frame(frame: &Frame<'_>) -> Option<StreamEvent> {
    let event = frame.event.unwrap_or_default();
    let data = frame.data.join("\n");
    match event {
        "content_block_delta" => {
            let value = decode_data(event, &data)?;
            let delta = value.get("delta")?;
            if delta.get("type").and_then(|v| v.as_str()) != Some("text_delta") {
                return None;
            }
            let text = delta.get("text").and_then(|v| v.as_str())?;
            Some(StreamEvent::TextDelta {
                text: text.to_string(),
            })
        }
        "message_stop" => Some(StreamEvent::Stop),
        "error" => {
            let message = decode_data(event, &data)
                .as_ref()
                .and_then(|value| error_message(value).map(ToOwned::to_owned))
                .unwrap_or(data);
            Some(StreamEvent::ProviderError { message })
        }
        _ => {
            debug!(
                event = "parser.frame_ignored",
                domain = "parser",
                provider = "claude",
                frame_event = event
            );
            None
        }
    }
}

fn decode_data(event: &str, data: &str) -> Option<serde_json::Value> {
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                event = "parser.frame_skipped",
                domain = "parser",
                provider = "claude",
                frame_event = event,
                error = %err,
                payload_len = data.len() as u64,
                "skipping undecodable frame data"
            );
            None
        }
    }
}
