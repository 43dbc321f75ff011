use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::structs::turn::Turn;

/// A complete conversational session: a flat pool of turns plus the active
/// root-to-leaf path currently used as model context.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Conversation {
    pub id: Uuid,

    /// The single source of truth for all turn data in this conversation.
    /// Provides O(1) lookup for any turn by its ID.
    #[serde(default)]
    pub messages: HashMap<Uuid, Turn>,

    /// Ordered ids from a root down to the currently active leaf. Every
    /// consecutive pair satisfies `path[i + 1].parent_id == path[i]`, and
    /// every id resolves in `messages`.
    #[serde(default)]
    pub active_path: Vec<Uuid>,

    /// Runtime flag to track if the conversation needs persistence (not serialized).
    /// Used to optimize auto-save by skipping redundant writes.
    #[serde(skip)]
    dirty: bool,
}

impl Conversation {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            messages: HashMap::new(),
            active_path: Vec::new(),
            dirty: false,
        }
    }

    pub fn turn(&self, id: Uuid) -> Option<&Turn> {
        self.messages.get(&id)
    }

    pub fn turn_mut(&mut self, id: Uuid) -> Option<&mut Turn> {
        self.messages.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Id of the turn currently rendered/used as the end of the context.
    pub fn active_leaf(&self) -> Option<Uuid> {
        self.active_path.last().copied()
    }

    /// Turns along the active path, root first.
    pub fn active_turns(&self) -> Vec<&Turn> {
        self.active_path
            .iter()
            .filter_map(|id| self.messages.get(id))
            .collect()
    }

    /// Insert a new turn and extend the active path with it.
    pub fn append_turn(&mut self, turn: Turn) -> Uuid {
        tracing::debug!(
            conversation_id = %self.id,
            turn_id = %turn.id,
            role = ?turn.role,
            parent_id = ?turn.parent_id,
            "Conversation: appending turn"
        );

        let id = turn.id;
        self.messages.insert(id, turn);
        self.active_path.push(id);
        self.mark_dirty();
        id
    }

    /// Root-to-target chain resolved through parent links.
    ///
    /// Requests must be assembled from this chain, not from the active path:
    /// the path may gain turns after a generation started.
    pub fn ancestor_chain(&self, id: Uuid) -> Vec<&Turn> {
        let mut chain = Vec::new();
        let mut cursor = self.messages.get(&id);
        while let Some(turn) = cursor {
            chain.push(turn);
            cursor = turn.parent_id.and_then(|pid| self.messages.get(&pid));
        }
        chain.reverse();
        chain
    }

    /// Drop path entries that no longer resolve to a stored turn.
    pub fn retain_valid_path(&mut self) {
        let before = self.active_path.len();
        self.active_path.retain(|id| self.messages.contains_key(id));
        if self.active_path.len() != before {
            self.mark_dirty();
        }
    }

    /// Mark the conversation as dirty (needs persistence)
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty flag (after successful persistence)
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Check if the conversation needs to be persisted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
