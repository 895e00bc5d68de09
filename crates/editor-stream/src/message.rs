use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message of the conversation history.
///
/// Messages are immutable once built; the conversation layer creates them and
/// this crate only reads them when building a request body.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Creates a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::at(role, content, Utc::now())
    }

    /// Creates a message with an explicit timestamp.
    pub fn at(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            metadata: HashMap::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Returns a copy of this message with one extra metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }
}

/// Joins the content of every system message, in order, with blank lines.
///
/// Returns `None` when the history has no non-empty system message.
pub(crate) fn system_prompt(messages: &[Message]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// User and assistant turns to send: system and blank messages are left out,
/// and so are assistant turns before the first user turn.
pub(crate) fn dialogue_turns(messages: &[Message]) -> impl Iterator<Item = &Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
        .skip_while(|m| m.role == Role::Assistant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_is_attached_without_touching_content() {
        let msg = Message::user("hi").with_metadata("doc", serde_json::json!("notes.md"));
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), "hi");
        assert_eq!(
            msg.metadata().get("doc"),
            Some(&serde_json::json!("notes.md"))
        );
    }

    #[test]
    fn system_prompt_joins_non_empty_system_messages() {
        let history = vec![
            Message::system("Be brief."),
            Message::user("hello"),
            Message::system("  "),
            Message::system("Use Markdown."),
        ];
        assert_eq!(
            system_prompt(&history).as_deref(),
            Some("Be brief.\n\nUse Markdown.")
        );
        assert_eq!(system_prompt(&[Message::user("x")]), None);
    }

    #[test]
    fn serde_uses_lowercase_roles() {
        let msg = Message::assistant("ok");
        let value = serde_json::to_value(&msg).expect("encode");
        assert_eq!(value["role"], "assistant");
        assert!(value.get("metadata").is_none());
        let back: Message = serde_json::from_value(value).expect("decode");
        assert_eq!(back, msg);
    }

    #[test]
    fn dialogue_turns_start_at_the_first_user_turn() {
        let history = vec![
            Message::assistant("earlier answer"),
            Message::system("rules"),
            Message::user(" "),
            Message::user("next question"),
            Message::assistant("reply"),
        ];
        let turns: Vec<&str> = dialogue_turns(&history).map(Message::content).collect();
        assert_eq!(turns, vec!["next question", "reply"]);
        assert_eq!(dialogue_turns(&[Message::system("only rules")]).count(), 0);
    }
}
