use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use conversation_core::Turn;
use llm_connector::ModelConfig;

use super::{TaskResult, TaskStatus};

/// Mutable scratchpad threaded through a pipeline run and discarded after.
///
/// Tasks communicate forward through `goal`, `data`, and `task_results`;
/// nothing here outlives the run except what the caller copies out.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PipelineContext {
    /// What the user typed, untouched.
    pub user_input: String,

    /// Refined statement of intent, set by the input optimizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_files: Vec<String>,

    /// Ancestor chain of the originating user turn, root first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Turn>,

    pub model: ModelConfig,

    /// Results of tasks attempted so far, keyed by task id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub task_results: HashMap<String, TaskResult>,

    /// Free-form values tasks pass to one another.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
}

impl PipelineContext {
    pub fn new(user_input: impl Into<String>, model: ModelConfig) -> Self {
        Self {
            user_input: user_input.into(),
            goal: None,
            attached_files: Vec::new(),
            history: Vec::new(),
            model,
            task_results: HashMap::new(),
            data: HashMap::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_attached_files(mut self, attached_files: Vec<String>) -> Self {
        self.attached_files = attached_files;
        self
    }

    /// The input later tasks should act on: the optimizer's rewrite when one
    /// was produced, the raw user input otherwise.
    pub fn effective_input(&self) -> &str {
        self.data
            .get("optimized_input")
            .and_then(|value| value.as_str())
            .unwrap_or(&self.user_input)
    }

    pub fn task_completed(&self, id: &str) -> bool {
        self.task_results
            .get(id)
            .map(|result| result.status == TaskStatus::Completed)
            .unwrap_or(false)
    }
}
