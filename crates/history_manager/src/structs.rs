//! Index metadata for persisted conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use conversation_core::{Conversation, Role};

const TITLE_MAX_CHARS: usize = 50;

/// Per-conversation entry in the history index. Small enough that the whole
/// index stays loadable without touching any conversation file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConversationMeta {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub turn_count: usize,
}

impl ConversationMeta {
    /// Build a fresh entry from the conversation's current state.
    pub fn from_conversation(conversation: &Conversation) -> Self {
        let now = Utc::now();
        Self {
            id: conversation.id,
            title: derive_title(conversation),
            created_at: now,
            updated_at: now,
            turn_count: conversation.len(),
        }
    }

    /// Refresh the mutable fields after a save, keeping `created_at`.
    pub fn refresh(&mut self, conversation: &Conversation) {
        self.title = derive_title(conversation);
        self.updated_at = Utc::now();
        self.turn_count = conversation.len();
    }
}

/// Title is the first user turn along the active path, truncated. Falls back
/// to the earliest user turn anywhere in the pool so a conversation whose
/// path was rewritten still gets a meaningful title.
fn derive_title(conversation: &Conversation) -> String {
    let active_user = conversation
        .active_turns()
        .into_iter()
        .find(|turn| turn.role == Role::User);

    let turn = active_user.or_else(|| {
        conversation
            .messages
            .values()
            .filter(|turn| turn.role == Role::User)
            .min_by_key(|turn| (turn.timestamp, turn.id))
    });

    match turn {
        Some(turn) => truncate_title(&turn.content),
        None => "New conversation".to_string(),
    }
}

fn truncate_title(content: &str) -> String {
    let line = content.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return "New conversation".to_string();
    }
    if line.chars().count() <= TITLE_MAX_CHARS {
        line.to_string()
    } else {
        let mut title: String = line.chars().take(TITLE_MAX_CHARS).collect();
        title.push('…');
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conversation_core::Turn;

    #[test]
    fn test_title_from_first_user_turn() {
        let mut conversation = Conversation::new(Uuid::new_v4());
        let system = conversation.append_turn(Turn::system("be helpful"));
        conversation.append_turn(Turn::user("Summarize my notes", Some(system)));

        let meta = ConversationMeta::from_conversation(&conversation);
        assert_eq!(meta.title, "Summarize my notes");
        assert_eq!(meta.turn_count, 2);
    }

    #[test]
    fn test_title_truncated_to_limit() {
        let mut conversation = Conversation::new(Uuid::new_v4());
        conversation.append_turn(Turn::user("x".repeat(80), None));

        let meta = ConversationMeta::from_conversation(&conversation);
        assert_eq!(meta.title.chars().count(), 51);
        assert!(meta.title.ends_with('…'));
    }

    #[test]
    fn test_title_falls_back_without_user_turns() {
        let mut conversation = Conversation::new(Uuid::new_v4());
        conversation.append_turn(Turn::system("be helpful"));

        let meta = ConversationMeta::from_conversation(&conversation);
        assert_eq!(meta.title, "New conversation");
    }
}
