//! History storage trait and file-backed implementation

use crate::error::Result;
use crate::structs::ConversationMeta;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use conversation_core::Conversation;

const INDEX_FILE: &str = "index.json";

/// Persistence boundary for conversations and their index.
#[async_trait]
pub trait HistoryStorage: Send + Sync {
    /// Save a conversation, overwriting any previous version.
    async fn save_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Load a conversation. `Ok(None)` means it was never saved.
    async fn load_conversation(&self, id: Uuid) -> Result<Option<Conversation>>;

    /// Check if a conversation exists.
    async fn conversation_exists(&self, id: Uuid) -> bool;

    /// Delete a conversation. Deleting an absent one is not an error.
    async fn delete_conversation(&self, id: Uuid) -> Result<()>;

    /// Save the index of conversation metadata.
    async fn save_index(&self, index: &[ConversationMeta]) -> Result<()>;

    /// Load the index of conversation metadata.
    async fn load_index(&self) -> Result<Vec<ConversationMeta>>;
}

/// File-based history storage: one pretty-printed JSON file per
/// conversation id, plus `index.json` for the metadata list.
#[derive(Clone)]
pub struct FileHistoryStorage {
    base_path: PathBuf,
}

impl FileHistoryStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn conversation_path(&self, id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.json", id))
    }

    fn index_path(&self) -> PathBuf {
        self.base_path.join(INDEX_FILE)
    }
}

#[async_trait]
impl HistoryStorage for FileHistoryStorage {
    async fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;

        let path = self.conversation_path(conversation.id);
        let contents = serde_json::to_string_pretty(conversation)?;
        fs::write(&path, contents).await?;

        tracing::debug!(
            conversation_id = %conversation.id,
            turns = conversation.len(),
            "FileHistoryStorage: saved conversation"
        );
        Ok(())
    }

    async fn load_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        let path = self.conversation_path(id);

        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).await?;
        let mut conversation: Conversation = serde_json::from_str(&contents)?;

        // Older files may reference turns that were since removed; the path
        // must only hold resolvable ids after a load.
        conversation.retain_valid_path();
        conversation.clear_dirty();

        Ok(Some(conversation))
    }

    async fn conversation_exists(&self, id: Uuid) -> bool {
        self.conversation_path(id).exists()
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<()> {
        let path = self.conversation_path(id);

        if path.exists() {
            fs::remove_file(&path).await?;
        }

        Ok(())
    }

    async fn save_index(&self, index: &[ConversationMeta]) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;

        let contents = serde_json::to_string_pretty(index)?;
        fs::write(self.index_path(), contents).await?;

        Ok(())
    }

    async fn load_index(&self) -> Result<Vec<ConversationMeta>> {
        let path = self.index_path();

        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&path).await?;
        match serde_json::from_str(&contents) {
            Ok(index) => Ok(index),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "FileHistoryStorage: unreadable index, starting empty"
                );
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use conversation_core::Turn;
    use tempfile::tempdir;

    fn sample_conversation() -> Conversation {
        let mut conversation = Conversation::new(Uuid::new_v4());
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let system = conversation.append_turn(Turn::system("be helpful").with_timestamp(base));
        let user = conversation.append_turn(
            Turn::user("hello", Some(system)).with_timestamp(base + chrono::Duration::seconds(1)),
        );
        conversation.append_turn(
            Turn::assistant("hi", Some(user)).with_timestamp(base + chrono::Duration::seconds(2)),
        );
        conversation
    }

    #[tokio::test]
    async fn test_save_and_load_round_trips_path_and_timestamps() {
        let dir = tempdir().unwrap();
        let storage = FileHistoryStorage::new(dir.path());

        let conversation = sample_conversation();
        storage.save_conversation(&conversation).await.unwrap();

        let loaded = storage
            .load_conversation(conversation.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(loaded.active_path, conversation.active_path);
        assert_eq!(loaded.len(), conversation.len());
        for id in &conversation.active_path {
            assert_eq!(
                loaded.turn(*id).unwrap().timestamp,
                conversation.turn(*id).unwrap().timestamp
            );
        }
        assert!(!loaded.is_dirty());
    }

    #[tokio::test]
    async fn test_load_missing_conversation_returns_none() {
        let dir = tempdir().unwrap();
        let storage = FileHistoryStorage::new(dir.path());

        let loaded = storage.load_conversation(Uuid::new_v4()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_load_drops_dangling_path_entries() {
        let dir = tempdir().unwrap();
        let storage = FileHistoryStorage::new(dir.path());

        let mut conversation = sample_conversation();
        conversation.active_path.push(Uuid::new_v4());
        storage.save_conversation(&conversation).await.unwrap();

        let loaded = storage
            .load_conversation(conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.active_path.len(), 3);
        assert!(loaded
            .active_path
            .iter()
            .all(|id| loaded.turn(*id).is_some()));
    }

    #[tokio::test]
    async fn test_load_minimal_legacy_file() {
        let dir = tempdir().unwrap();
        let storage = FileHistoryStorage::new(dir.path());

        let id = Uuid::new_v4();
        let raw = format!(r#"{{ "id": "{}" }}"#, id);
        tokio::fs::write(dir.path().join(format!("{}.json", id)), raw)
            .await
            .unwrap();

        let loaded = storage.load_conversation(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert!(loaded.is_empty());
        assert!(loaded.active_path.is_empty());
    }

    #[tokio::test]
    async fn test_delete_conversation() {
        let dir = tempdir().unwrap();
        let storage = FileHistoryStorage::new(dir.path());

        let conversation = sample_conversation();
        storage.save_conversation(&conversation).await.unwrap();
        assert!(storage.conversation_exists(conversation.id).await);

        storage.delete_conversation(conversation.id).await.unwrap();
        assert!(!storage.conversation_exists(conversation.id).await);

        // A second delete is a no-op.
        storage.delete_conversation(conversation.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_index_round_trip() {
        let dir = tempdir().unwrap();
        let storage = FileHistoryStorage::new(dir.path());

        let conversation = sample_conversation();
        let index = vec![ConversationMeta::from_conversation(&conversation)];
        storage.save_index(&index).await.unwrap();

        let loaded = storage.load_index().await.unwrap();
        assert_eq!(loaded, index);
    }

    #[tokio::test]
    async fn test_corrupt_index_yields_empty() {
        let dir = tempdir().unwrap();
        let storage = FileHistoryStorage::new(dir.path());

        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("index.json"), "not json")
            .await
            .unwrap();

        let loaded = storage.load_index().await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_missing_index_yields_empty() {
        let dir = tempdir().unwrap();
        let storage = FileHistoryStorage::new(dir.path());

        let loaded = storage.load_index().await.unwrap();
        assert!(loaded.is_empty());
    }
}
