//! Conversation records and store configuration.

use chrono::{DateTime, Utc};
use scholar_common::{InputMessage, MessageRole};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One turn in a conversation. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A persisted conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique ID, also the file stem on disk
    pub id: String,

    /// Display name, empty when the user gave none
    #[serde(default)]
    pub name: String,

    /// Turns in append order
    #[serde(default)]
    pub messages: Vec<Message>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Free-form data carried along with the record
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: serde_json::Map::new(),
        }
    }

    /// Append a turn stamped with the current time.
    ///
    /// `updated_at` never moves backwards, even if the wall clock does.
    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) {
        let now = Utc::now();
        self.messages.push(Message {
            role,
            content: content.into(),
            timestamp: now,
        });
        self.updated_at = self.updated_at.max(now);
    }

    /// The turns as `(role, content)` pairs for a model call.
    pub fn to_input_list(&self) -> Vec<InputMessage> {
        self.messages
            .iter()
            .map(|m| InputMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            message_count: self.messages.len(),
            updated_at: self.updated_at,
        }
    }
}

/// What the conversation picker shows for each record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub name: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Configuration for the conversation store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one `{id}.json` file per conversation
    #[serde(default = "default_conversations_dir")]
    pub conversations_dir: PathBuf,
}

fn default_conversations_dir() -> PathBuf {
    PathBuf::from("conversations")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            conversations_dir: default_conversations_dir(),
        }
    }
}
