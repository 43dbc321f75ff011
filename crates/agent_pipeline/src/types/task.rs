//! Task-related type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use conversation_core::TaskResultView;

use super::PipelineContext;

/// Kind of work a task performs; selects the registered processor.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    OptimizeInput,
    Generate,
    Summarize,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::OptimizeInput => "optimize_input",
            TaskType::Generate => "generate",
            TaskType::Summarize => "summarize",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Context predicate deciding whether a task runs. A false condition skips
/// the task silently, without producing a result.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskCondition {
    /// Input is at least this many characters long.
    MinInputChars { min: usize },
    /// The context carries at least one attached file.
    HasAttachedFiles,
    /// A truthy flag was written into the context data map.
    DataFlagSet { key: String },
}

impl TaskCondition {
    pub fn evaluate(&self, context: &PipelineContext) -> bool {
        match self {
            TaskCondition::MinInputChars { min } => context.user_input.chars().count() >= *min,
            TaskCondition::HasAttachedFiles => !context.attached_files.is_empty(),
            TaskCondition::DataFlagSet { key } => context
                .data
                .get(key)
                .and_then(|value| value.as_bool())
                .unwrap_or(false),
        }
    }
}

/// Static configuration of one pipeline step.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TaskConfig {
    /// Unique id within the pipeline; `requires` entries refer to these.
    pub id: String,
    pub task_type: TaskType,
    /// Human-readable name used for event attribution.
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Ids of tasks that must have completed before this one may run.
    /// An unmet requirement records a failed result without invoking the
    /// processor.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<TaskCondition>,
}

fn default_enabled() -> bool {
    true
}

impl TaskConfig {
    pub fn new(id: impl Into<String>, task_type: TaskType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type,
            name: name.into(),
            enabled: true,
            requires: Vec::new(),
            condition: None,
        }
    }

    pub fn with_requires(mut self, requires: Vec<String>) -> Self {
        self.requires = requires;
        self
    }

    pub fn with_condition(mut self, condition: TaskCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Outcome of one attempted task. Terminal once status reaches
/// completed/failed/cancelled.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TaskResult {
    pub id: String,
    pub task_type: TaskType,
    pub name: String,
    pub status: TaskStatus,

    /// The input the task saw when it started.
    pub input: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl TaskResult {
    pub fn started(config: &TaskConfig, input: impl Into<String>) -> Self {
        Self {
            id: config.id.clone(),
            task_type: config.task_type,
            name: config.name.clone(),
            status: TaskStatus::Running,
            input: input.into(),
            output: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        }
    }

    pub fn finish(&mut self, status: TaskStatus, output: Option<String>, error: Option<String>) {
        let completed_at = Utc::now();
        self.status = status;
        self.output = output;
        self.error = error;
        self.duration_ms = Some(
            (completed_at - self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.completed_at = Some(completed_at);
    }

    /// Trimmed form persisted with the turn the pipeline produced.
    pub fn to_view(&self) -> TaskResultView {
        TaskResultView {
            task_id: self.id.clone(),
            task_type: self.task_type.as_str().to_string(),
            name: self.name.clone(),
            status: self.status.as_str().to_string(),
            output: self.output.clone(),
            error: self.error.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_connector::ModelConfig;

    #[test]
    fn condition_min_input_chars() {
        let context = PipelineContext::new("short", ModelConfig::new("m"));
        assert!(TaskCondition::MinInputChars { min: 3 }.evaluate(&context));
        assert!(!TaskCondition::MinInputChars { min: 30 }.evaluate(&context));
    }

    #[test]
    fn condition_data_flag() {
        let mut context = PipelineContext::new("input", ModelConfig::new("m"));
        let condition = TaskCondition::DataFlagSet {
            key: "use_summary".to_string(),
        };
        assert!(!condition.evaluate(&context));

        context
            .data
            .insert("use_summary".to_string(), serde_json::json!(true));
        assert!(condition.evaluate(&context));

        context
            .data
            .insert("use_summary".to_string(), serde_json::json!("yes"));
        assert!(!condition.evaluate(&context));
    }

    #[test]
    fn result_finish_records_duration_and_timestamp() {
        let config = TaskConfig::new("generate", TaskType::Generate, "Main Generation");
        let mut result = TaskResult::started(&config, "input");
        result.finish(TaskStatus::Completed, Some("output".to_string()), None);

        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.completed_at.is_some());
        assert!(result.duration_ms.is_some());
        assert!(result.status.is_terminal());
    }
}
