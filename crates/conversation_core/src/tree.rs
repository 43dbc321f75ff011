//! Derived tree views over the flat turn pool.
//!
//! The tree is never stored: it is rebuilt from `Conversation::messages`
//! after each mutation, so the hierarchical view cannot drift from the pool.

use std::collections::HashMap;

use uuid::Uuid;

use crate::structs::turn::Turn;

/// A turn with its resolved children, produced by [`build_tree`].
#[derive(Clone, Debug)]
pub struct TurnNode {
    pub turn: Turn,
    pub children: Vec<TurnNode>,
    pub depth: usize,
}

/// Flattened tree entry with O(1) lookup by id, produced by [`build_node_map`].
#[derive(Clone, Debug)]
pub struct NodeEntry {
    pub turn: Turn,
    pub depth: usize,
    pub child_ids: Vec<Uuid>,
}

/// Rebuild the hierarchical view from the flat pool.
///
/// Roots are turns without a parent. Sibling lists (and the root list) are
/// ordered by timestamp ascending, with the id as a tie-break so the order is
/// stable across rebuilds. A turn whose parent id is unknown is unreachable
/// rather than an error; a delete can legally orphan nodes before cleanup
/// completes within the same operation.
pub fn build_tree(messages: &HashMap<Uuid, Turn>) -> Vec<TurnNode> {
    let mut children_of: HashMap<Option<Uuid>, Vec<Uuid>> = HashMap::new();
    for turn in messages.values() {
        children_of.entry(turn.parent_id).or_default().push(turn.id);
    }
    for ids in children_of.values_mut() {
        ids.sort_by_key(|id| (messages[id].timestamp, *id));
    }

    let roots = children_of.get(&None).cloned().unwrap_or_default();
    roots
        .into_iter()
        .map(|id| build_node(id, 0, messages, &children_of))
        .collect()
}

fn build_node(
    id: Uuid,
    depth: usize,
    messages: &HashMap<Uuid, Turn>,
    children_of: &HashMap<Option<Uuid>, Vec<Uuid>>,
) -> TurnNode {
    let child_ids = children_of.get(&Some(id)).cloned().unwrap_or_default();
    TurnNode {
        turn: messages[&id].clone(),
        children: child_ids
            .into_iter()
            .map(|child| build_node(child, depth + 1, messages, children_of))
            .collect(),
        depth,
    }
}

/// Flatten the tree back into an id-keyed map for O(1) lookups, so
/// operations stay O(n) instead of re-walking the tree per node.
pub fn build_node_map(roots: &[TurnNode]) -> HashMap<Uuid, NodeEntry> {
    let mut map = HashMap::new();
    let mut stack: Vec<&TurnNode> = roots.iter().collect();
    while let Some(node) = stack.pop() {
        map.insert(
            node.turn.id,
            NodeEntry {
                turn: node.turn.clone(),
                depth: node.depth,
                child_ids: node.children.iter().map(|c| c.turn.id).collect(),
            },
        );
        stack.extend(node.children.iter());
    }
    map
}
