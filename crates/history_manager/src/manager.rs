//! History manager service

use crate::error::Result;
use crate::storage::HistoryStorage;
use crate::structs::ConversationMeta;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use conversation_core::Conversation;

/// Keeps the conversation index cached in memory and writes it through to
/// storage alongside every conversation save or delete.
pub struct HistoryManager<S: HistoryStorage> {
    storage: Arc<S>,
    index: Arc<RwLock<Vec<ConversationMeta>>>,
}

impl<S: HistoryStorage> HistoryManager<S> {
    /// Create a manager, loading the existing index from storage.
    pub async fn new(storage: S) -> Result<Self> {
        let storage = Arc::new(storage);
        let index = storage.load_index().await?;

        Ok(Self {
            storage,
            index: Arc::new(RwLock::new(index)),
        })
    }

    /// Save a conversation and refresh its index entry. Clears the dirty
    /// flag on success.
    pub async fn save(&self, conversation: &mut Conversation) -> Result<()> {
        self.storage.save_conversation(conversation).await?;

        let mut index = self.index.write().await;
        match index.iter_mut().find(|meta| meta.id == conversation.id) {
            Some(meta) => meta.refresh(conversation),
            None => index.push(ConversationMeta::from_conversation(conversation)),
        }
        self.storage.save_index(&index).await?;

        conversation.clear_dirty();
        Ok(())
    }

    /// Save only if the conversation was mutated since its last save.
    pub async fn save_if_dirty(&self, conversation: &mut Conversation) -> Result<bool> {
        if !conversation.is_dirty() {
            return Ok(false);
        }
        self.save(conversation).await?;
        Ok(true)
    }

    pub async fn load(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.storage.load_conversation(id).await
    }

    /// Delete a conversation and drop it from the index.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.storage.delete_conversation(id).await?;

        let mut index = self.index.write().await;
        let before = index.len();
        index.retain(|meta| meta.id != id);
        if index.len() != before {
            self.storage.save_index(&index).await?;
        }

        Ok(())
    }

    /// Index entries, most recently updated first.
    pub async fn list(&self) -> Vec<ConversationMeta> {
        let mut index = self.index.read().await.clone();
        index.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileHistoryStorage;
    use conversation_core::Turn;
    use tempfile::tempdir;

    fn conversation_with_user(content: &str) -> Conversation {
        let mut conversation = Conversation::new(Uuid::new_v4());
        conversation.append_turn(Turn::user(content, None));
        conversation
    }

    #[tokio::test]
    async fn test_save_updates_index_and_clears_dirty() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(FileHistoryStorage::new(dir.path()))
            .await
            .unwrap();

        let mut conversation = conversation_with_user("plan my week");
        assert!(conversation.is_dirty());

        manager.save(&mut conversation).await.unwrap();
        assert!(!conversation.is_dirty());

        let index = manager.list().await;
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].id, conversation.id);
        assert_eq!(index[0].title, "plan my week");
        assert_eq!(index[0].turn_count, 1);
    }

    #[tokio::test]
    async fn test_resave_keeps_created_at_and_bumps_updated_at() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(FileHistoryStorage::new(dir.path()))
            .await
            .unwrap();

        let mut conversation = conversation_with_user("first");
        manager.save(&mut conversation).await.unwrap();
        let first = manager.list().await.remove(0);

        let user = conversation.active_leaf().unwrap();
        conversation.append_turn(Turn::assistant("reply", Some(user)));
        manager.save(&mut conversation).await.unwrap();

        let index = manager.list().await;
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].created_at, first.created_at);
        assert!(index[0].updated_at >= first.updated_at);
        assert_eq!(index[0].turn_count, 2);
    }

    #[tokio::test]
    async fn test_save_if_dirty_skips_clean_conversation() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(FileHistoryStorage::new(dir.path()))
            .await
            .unwrap();

        let mut conversation = conversation_with_user("once");
        assert!(manager.save_if_dirty(&mut conversation).await.unwrap());
        assert!(!manager.save_if_dirty(&mut conversation).await.unwrap());
    }

    #[tokio::test]
    async fn test_index_survives_restart() {
        let dir = tempdir().unwrap();

        let mut conversation = conversation_with_user("persisted");
        {
            let manager = HistoryManager::new(FileHistoryStorage::new(dir.path()))
                .await
                .unwrap();
            manager.save(&mut conversation).await.unwrap();
        }

        let manager = HistoryManager::new(FileHistoryStorage::new(dir.path()))
            .await
            .unwrap();
        let index = manager.list().await;
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].id, conversation.id);

        let loaded = manager.load(conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.active_path, conversation.active_path);
    }

    #[tokio::test]
    async fn test_delete_removes_file_and_index_entry() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(FileHistoryStorage::new(dir.path()))
            .await
            .unwrap();

        let mut conversation = conversation_with_user("short lived");
        manager.save(&mut conversation).await.unwrap();

        manager.delete(conversation.id).await.unwrap();
        assert!(manager.list().await.is_empty());
        assert!(manager.load(conversation.id).await.unwrap().is_none());
    }
}
