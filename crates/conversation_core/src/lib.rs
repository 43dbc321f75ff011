//! `conversation_core` is a crate for robustly managing branching,
//! multi-turn conversations with LLMs.
//!
//! The flat turn pool ([`Conversation`]) is the single source of truth; the
//! hierarchical view ([`tree`]) and sibling navigation ([`navigation`]) are
//! derived from it on demand and never stored.

// Declare the modules
pub mod navigation;
pub mod structs;
pub mod tree;

// Re-export the public API
pub use navigation::{BranchDirection, BranchNavigation};
pub use structs::conversation::Conversation;
pub use structs::conversation_edits::DeleteOutcome;
pub use structs::metadata::{TokenUsage, TurnMetadata};
pub use structs::turn::{Role, TaskResultView, Turn, TurnComponents};
pub use tree::{build_node_map, build_tree, NodeEntry, TurnNode};
