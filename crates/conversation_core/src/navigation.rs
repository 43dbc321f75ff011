//! Sibling-group navigation over the derived tree.
//!
//! A branch is the group of turns sharing a parent; navigating to a sibling
//! lands on the newest continuation of that branch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::structs::conversation::Conversation;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BranchDirection {
    Left,
    Right,
}

/// Position of a turn within its sibling group, for branch switch controls.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchNavigation {
    pub current_index: usize,
    pub total_branches: usize,
    pub can_navigate_left: bool,
    pub can_navigate_right: bool,
}

impl Conversation {
    /// Timestamp-ordered ids of all turns sharing `id`'s parent (or all
    /// roots, when `id` has no parent).
    pub fn sibling_group(&self, id: Uuid) -> Option<Vec<Uuid>> {
        let parent_id = self.messages.get(&id)?.parent_id;
        let mut group: Vec<Uuid> = self
            .messages
            .values()
            .filter(|turn| turn.parent_id == parent_id)
            .map(|turn| turn.id)
            .collect();
        group.sort_by_key(|gid| (self.messages[gid].timestamp, *gid));
        Some(group)
    }

    pub fn branch_navigation(&self, id: Uuid) -> Option<BranchNavigation> {
        let group = self.sibling_group(id)?;
        let current_index = group.iter().position(|gid| *gid == id)?;
        Some(BranchNavigation {
            current_index,
            total_branches: group.len(),
            can_navigate_left: current_index > 0,
            can_navigate_right: current_index + 1 < group.len(),
        })
    }

    /// Walk from `start` down to a leaf, always descending into the most
    /// recent child, and return the ids visited after `start`.
    fn deepest_recent_path(&self, start: Uuid) -> Vec<Uuid> {
        let mut path = Vec::new();
        let mut cursor = start;
        loop {
            let next = self
                .messages
                .values()
                .filter(|turn| turn.parent_id == Some(cursor))
                .max_by_key(|turn| (turn.timestamp, turn.id));
            match next {
                Some(turn) => {
                    path.push(turn.id);
                    cursor = turn.id;
                }
                None => break,
            }
        }
        path
    }

    /// Switch the active path to a sibling of `id`, landing on the newest
    /// continuation of that branch. Out-of-bounds moves, unknown ids, and
    /// turns not on the active path are no-ops. Returns the new active path.
    pub fn navigate_branch(&mut self, id: Uuid, direction: BranchDirection) -> Option<Vec<Uuid>> {
        let nav = self.branch_navigation(id)?;
        let group = self.sibling_group(id)?;
        let target_index = match direction {
            BranchDirection::Left => {
                if !nav.can_navigate_left {
                    return None;
                }
                nav.current_index - 1
            }
            BranchDirection::Right => {
                if !nav.can_navigate_right {
                    return None;
                }
                nav.current_index + 1
            }
        };
        let target = group[target_index];

        let pos = self.active_path.iter().position(|pid| *pid == id)?;
        let mut new_path: Vec<Uuid> = self.active_path[..pos].to_vec();
        new_path.push(target);
        new_path.extend(self.deepest_recent_path(target));

        tracing::debug!(
            conversation_id = %self.id,
            from = %id,
            to = %target,
            direction = ?direction,
            path_len = new_path.len(),
            "Conversation: switched branch"
        );

        self.active_path = new_path.clone();
        self.mark_dirty();
        Some(new_path)
    }
}
