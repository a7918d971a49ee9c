//! Conversation message roles and the model-input projection.

use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `{role, content}` pair fed to a model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: MessageRole,
    pub content: String,
}

impl InputMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Keep only the last `n` messages, preserving their order.
pub fn window(messages: Vec<InputMessage>, n: usize) -> Vec<InputMessage> {
    let skip = messages.len().saturating_sub(n);
    messages.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn role_rejects_unknown_names() {
        assert!(serde_json::from_str::<MessageRole>("\"system\"").is_err());
        assert_eq!(
            serde_json::from_str::<MessageRole>("\"assistant\"").unwrap(),
            MessageRole::Assistant
        );
    }

    #[test]
    fn window_keeps_last_messages_in_order() {
        let messages: Vec<InputMessage> = (1..=5)
            .map(|i| InputMessage::user(format!("m{i}")))
            .collect();

        let windowed = window(messages, 2);

        assert_eq!(windowed.len(), 2);
        assert_eq!(windowed[0].content, "m4");
        assert_eq!(windowed[1].content, "m5");
    }

    #[test]
    fn window_larger_than_history_is_noop() {
        let messages = vec![InputMessage::user("a"), InputMessage::assistant("b")];
        let windowed = window(messages.clone(), 10);
        assert_eq!(windowed, messages);
    }
}
