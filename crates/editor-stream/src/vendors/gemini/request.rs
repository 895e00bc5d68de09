use crate::message::{Message, Role, dialogue_turns, system_prompt};
use crate::model::{GenerationOptions, ProviderKind};
use crate::transport::StreamRequest;

use super::config::GeminiConfig;

/// Builds the `streamGenerateContent` request for `messages`.
pub(crate) fn build_request(
    config: &GeminiConfig,
    messages: &[Message],
    options: &GenerationOptions,
) -> StreamRequest {
    StreamRequest {
        provider: ProviderKind::Gemini,
        url: config.stream_url(),
        headers: vec![("x-goog-api-key".to_string(), config.api_key.clone())],
        body: build_body(messages, options),
    }
}

pub(crate) fn build_body(messages: &[Message], options: &GenerationOptions) -> serde_json::Value {
    let contents: Vec<serde_json::Value> = dialogue_turns(messages)
        .map(|m| {
            let role = match m.role() {
                Role::Assistant => "model",
                _ => "user",
            };
            serde_json::json!({
                "role": role,
                "parts": [{ "text": m.content() }],
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "contents": contents,
        "generationConfig": {
            "temperature": options.temperature,
            "maxOutputTokens": options.max_output_tokens,
        },
    });
    if let Some(system) = system_prompt(messages) {
        body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
    }
    body
}
