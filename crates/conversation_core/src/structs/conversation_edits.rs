use std::collections::HashMap;

use uuid::Uuid;

use crate::structs::conversation::Conversation;
use crate::structs::metadata::TurnMetadata;
use crate::structs::turn::{Role, Turn};

/// Outcome of [`Conversation::delete_turn_and_siblings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Ids removed from the pool: every rejected sibling with its whole
    /// subtree, plus the target itself.
    pub removed: Vec<Uuid>,
    /// The target's former children, now re-parented one level up.
    pub promoted: Vec<Uuid>,
}

impl Conversation {
    /// Insert `turn` as a new sibling of `target` (same parent) and make it
    /// the new active leaf. The path keeps everything before `target`, then
    /// switches to the new turn; ids after `target` belonged to the old
    /// branch and are dropped. If `target` is not on the active path the new
    /// turn is appended instead.
    pub fn add_sibling_turn(&mut self, target: Uuid, mut turn: Turn) -> Option<Uuid> {
        let parent_id = self.messages.get(&target)?.parent_id;
        turn.parent_id = parent_id;
        let new_id = turn.id;
        self.messages.insert(new_id, turn);

        match self.active_path.iter().position(|id| *id == target) {
            Some(pos) => {
                self.active_path.truncate(pos);
                self.active_path.push(new_id);
            }
            None => self.active_path.push(new_id),
        }

        tracing::debug!(
            conversation_id = %self.id,
            target = %target,
            new_turn = %new_id,
            "Conversation: added sibling turn"
        );
        self.mark_dirty();
        Some(new_id)
    }

    /// Insert `turn` as a child of `parent` and make it the active leaf.
    pub fn add_child_turn(&mut self, parent: Uuid, mut turn: Turn) -> Option<Uuid> {
        if !self.messages.contains_key(&parent) {
            return None;
        }
        turn.parent_id = Some(parent);
        let new_id = turn.id;
        self.messages.insert(new_id, turn);

        match self.active_path.iter().position(|id| *id == parent) {
            Some(pos) => {
                self.active_path.truncate(pos + 1);
                self.active_path.push(new_id);
            }
            None => self.active_path.push(new_id),
        }

        tracing::debug!(
            conversation_id = %self.id,
            parent = %parent,
            new_turn = %new_id,
            "Conversation: added child turn"
        );
        self.mark_dirty();
        Some(new_id)
    }

    /// Edit a user turn by creating a replacement sibling; the original stays
    /// browsable as an alternative branch. Returns the replacement's id, or
    /// `None` when the target is unknown or not a user turn.
    pub fn edit_user_turn(&mut self, target: Uuid, new_content: impl Into<String>) -> Option<Uuid> {
        let original = self.messages.get(&target)?;
        if original.role != Role::User {
            tracing::warn!(
                conversation_id = %self.id,
                target = %target,
                role = ?original.role,
                "Conversation: edit_user_turn on non-user turn ignored"
            );
            return None;
        }

        let content = new_content.into();
        let mut components = original.components.clone().unwrap_or_default();
        components.user_input = Some(content.clone());
        components.optimized_input = None;

        let replacement = Turn::user(content, original.parent_id).with_components(components);
        self.add_sibling_turn(target, replacement)
    }

    /// In-place content replacement for an assistant turn; the only mutation
    /// that does not create a new branch.
    pub fn update_assistant_turn(&mut self, target: Uuid, content: impl Into<String>) -> bool {
        match self.messages.get_mut(&target) {
            Some(turn) if turn.role == Role::Assistant => {
                turn.content = content.into();
                self.mark_dirty();
                true
            }
            Some(turn) => {
                tracing::warn!(
                    conversation_id = %self.id,
                    target = %target,
                    role = ?turn.role,
                    "Conversation: update_assistant_turn on non-assistant turn ignored"
                );
                false
            }
            None => {
                tracing::warn!(
                    conversation_id = %self.id,
                    target = %target,
                    "Conversation: update_assistant_turn target not found"
                );
                false
            }
        }
    }

    /// Replace a placeholder assistant turn with its final streamed content.
    pub fn finalize_assistant_turn(
        &mut self,
        target: Uuid,
        content: impl Into<String>,
        reasoning_content: Option<String>,
        metadata: Option<TurnMetadata>,
    ) -> bool {
        match self.messages.get_mut(&target) {
            Some(turn) if turn.role == Role::Assistant => {
                turn.content = content.into();
                turn.reasoning_content = reasoning_content;
                if metadata.is_some() {
                    turn.metadata = metadata;
                }
                self.mark_dirty();
                true
            }
            _ => {
                tracing::warn!(
                    conversation_id = %self.id,
                    target = %target,
                    "Conversation: finalize_assistant_turn target missing or not assistant"
                );
                false
            }
        }
    }

    /// Collapse the branch point around `target`: every sibling other than
    /// `target` is removed together with its whole subtree, `target` itself
    /// is removed, and `target`'s direct children are promoted to its parent.
    /// Already-generated continuations of the chosen branch survive while
    /// competing branches are discarded.
    pub fn delete_turn_and_siblings(&mut self, target: Uuid) -> Option<DeleteOutcome> {
        let parent_id = self.messages.get(&target)?.parent_id;

        let mut children_of: HashMap<Option<Uuid>, Vec<Uuid>> = HashMap::new();
        for turn in self.messages.values() {
            children_of.entry(turn.parent_id).or_default().push(turn.id);
        }

        let siblings = children_of.get(&parent_id).cloned().unwrap_or_default();
        let mut removed = Vec::new();
        for sibling in siblings {
            if sibling == target {
                continue;
            }
            let mut stack = vec![sibling];
            while let Some(id) = stack.pop() {
                removed.push(id);
                if let Some(kids) = children_of.get(&Some(id)) {
                    stack.extend(kids.iter().copied());
                }
            }
        }
        removed.push(target);

        let promoted = children_of.get(&Some(target)).cloned().unwrap_or_default();
        for child in &promoted {
            if let Some(turn) = self.messages.get_mut(child) {
                turn.parent_id = parent_id;
            }
        }

        for id in &removed {
            self.messages.remove(id);
        }
        self.retain_valid_path();

        tracing::info!(
            conversation_id = %self.id,
            target = %target,
            removed_count = removed.len(),
            promoted_count = promoted.len(),
            "Conversation: collapsed branch point"
        );
        self.mark_dirty();
        Some(DeleteOutcome { removed, promoted })
    }
}
