use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::structs::metadata::TurnMetadata;

/// A single chat turn stored in the conversation's flat pool.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Turn {
    pub id: Uuid,
    pub role: Role,

    /// The canonical, flattened text of the turn.
    pub content: String,

    /// Model reasoning accompanying the answer, when the provider exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,

    /// Parent turn in the conversation tree. `None` marks a root.
    #[serde(default)]
    pub parent_id: Option<Uuid>,

    /// Creation time; siblings are ordered by this, ascending.
    pub timestamp: DateTime<Utc>,

    /// Provenance: what the user actually typed versus what was sent after
    /// optimization, plus any agent task results attached to this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<TurnComponents>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TurnMetadata>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            reasoning_content: None,
            parent_id,
            timestamp: Utc::now(),
            components: None,
            metadata: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, None)
    }

    pub fn user(content: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self::new(Role::User, content, parent_id)
    }

    pub fn assistant(content: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self::new(Role::Assistant, content, parent_id)
    }

    pub fn with_components(mut self, components: TurnComponents) -> Self {
        self.components = Some(components);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Records where a turn's text came from, so agent-rewritten input stays
/// distinguishable from what the user typed.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TurnComponents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_input: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_files: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agent_results: Vec<TaskResultView>,
}

/// Trimmed view of an agent task result, persisted with the turn it produced.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TaskResultView {
    pub task_id: String,
    pub task_type: String,
    pub name: String,
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}
