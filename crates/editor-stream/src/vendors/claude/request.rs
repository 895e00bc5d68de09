use crate::message::{Message, Role, dialogue_turns, system_prompt};
use crate::model::{GenerationOptions, ProviderKind};
use crate::transport::StreamRequest;

use super::config::ClaudeConfig;

/// Builds the streaming Messages API request for `messages`.
pub(crate) fn build_request(
    config: &ClaudeConfig,
    messages: &[Message],
    options: &GenerationOptions,
) -> StreamRequest {
    StreamRequest {
        provider: ProviderKind::Claude,
        url: config.messages_url(),
        headers: vec![
            ("x-api-key".to_string(), config.api_key.clone()),
            ("anthropic-version".to_string(), config.api_version.clone()),
            ("content-type".to_string(), "application/json".to_string()),
        ],
        body: build_body(&config.model, messages, options),
    }
}

pub(crate) fn build_body(
    model: &str,
    messages: &[Message],
    options: &GenerationOptions,
) -> serde_json::Value {
    let api_messages: Vec<serde_json::Value> = dialogue_turns(messages)
        .map(|m| {
            let role = match m.role() {
                Role::Assistant => "assistant",
                _ => "user",
            };
            serde_json::json!({ "role": role, "content": m.content() })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "max_tokens": options.max_output_tokens,
        "temperature": options.temperature,
        "messages": api_messages,
        "stream": true,
    });
    if let Some(system) = system_prompt(messages) {
        body["system"] = serde_json::json!(system);
    }
    body
}
