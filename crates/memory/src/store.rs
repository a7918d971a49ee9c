//! File-backed conversation storage.

use crate::types::{Conversation, ConversationSummary, StoreConfig};
use scholar_common::{InputMessage, MessageRole, Result, validate_file_component};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stores each conversation as `{dir}/{id}.json`.
///
/// Writes are plain rewrites of the whole file with no locking, so two
/// writers appending to the same conversation race and the last one wins.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    /// Open the store, creating its directory if needed.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let dir = config.conversations_dir.clone();
        tokio::fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "Conversation store ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_file_component("conversation", id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Create an empty conversation and persist it immediately.
    pub async fn create(&self, name: Option<&str>) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conversation = Conversation::new(id.clone(), name.unwrap_or_default());
        self.save(&conversation).await?;
        debug!(conversation_id = %id, "Conversation created");
        Ok(id)
    }

    /// Append a turn, starting a fresh record if `id` has none.
    pub async fn append(&self, id: &str, role: MessageRole, content: &str) -> Result<Conversation> {
        let mut conversation = match self.get(id).await? {
            Some(existing) => existing,
            None => {
                debug!(conversation_id = %id, "No record found, starting a new one");
                Conversation::new(id, "")
            }
        };

        conversation.push(role, content);
        self.save(&conversation).await?;

        debug!(
            conversation_id = %id,
            role = %role,
            messages = conversation.messages.len(),
            "Message appended"
        );
        Ok(conversation)
    }

    /// Load a conversation. Missing and unreadable records both yield `None`.
    pub async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let path = self.path_for(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(conversation) => Ok(Some(conversation)),
            Err(e) => {
                warn!(
                    conversation_id = %id,
                    path = %path.display(),
                    error = %e,
                    "Failed to load conversation"
                );
                Ok(None)
            }
        }
    }

    /// IDs of every stored conversation, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Summaries of all readable conversations, most recently updated first.
    pub async fn summaries(&self) -> Result<Vec<ConversationSummary>> {
        let mut summaries = Vec::new();
        for id in self.list().await? {
            if validate_file_component("conversation", &id).is_err() {
                continue;
            }
            if let Some(conversation) = self.get(&id).await? {
                summaries.push(conversation.summary());
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// The conversation's turns as model input; empty when it does not exist.
    pub async fn as_input_list(&self, id: &str) -> Result<Vec<InputMessage>> {
        Ok(self
            .get(id)
            .await?
            .map(|conversation| conversation.to_input_list())
            .unwrap_or_default())
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let path = self.path_for(&conversation.id)?;
        let json = serde_json::to_string_pretty(conversation)?;
        tokio::fs::write(&path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_common::ScholarError;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> ConversationStore {
        ConversationStore::open(&StoreConfig {
            conversations_dir: dir.path().join("conversations"),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn rejects_ids_that_escape_the_directory() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        for id in ["../secret", "a/b", "", "..", "a\\b"] {
            assert!(matches!(store.get(id).await, Err(ScholarError::Validation(_))));
            assert!(matches!(
                store.append(id, MessageRole::User, "x").await,
                Err(ScholarError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn file_is_pretty_printed_utf8() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let id = store.create(Some("História")).await.unwrap();
        store
            .append(&id, MessageRole::User, "Quem descobriu o Brasil?")
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.dir().join(format!("{id}.json"))).unwrap();
        assert!(raw.contains('\n'));
        assert!(raw.contains("Quem descobriu o Brasil?"));
        assert!(raw.contains("\"name\": \"História\""));
    }
}
