//! Progress events emitted during a pipeline run.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::TaskResult;

/// Observer events for one pipeline run.
///
/// `TaskStarted`/`TaskCompleted` fire exactly once per attempted task, with a
/// snapshot of all results so far. `Message` relays a task's incremental
/// stream; its `text` is cumulative, so the latest event always carries the
/// complete text so far.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    TaskStarted {
        task_id: String,
        task_name: String,
        results: Vec<TaskResult>,
    },
    TaskCompleted {
        task_id: String,
        task_name: String,
        result: TaskResult,
        results: Vec<TaskResult>,
    },
    Message {
        task_name: String,
        text: String,
    },
}

/// Handle a processor uses to stream incremental text, pre-bound to the
/// running task's name for attribution.
pub struct TaskStream<'a> {
    events: &'a mpsc::Sender<PipelineEvent>,
    task_name: &'a str,
}

impl<'a> TaskStream<'a> {
    pub fn new(events: &'a mpsc::Sender<PipelineEvent>, task_name: &'a str) -> Self {
        Self { events, task_name }
    }

    /// Emit the cumulative text so far. Send failures mean the observer went
    /// away; the pipeline keeps running.
    pub async fn message(&self, text: impl Into<String>) {
        let _ = self
            .events
            .send(PipelineEvent::Message {
                task_name: self.task_name.to_string(),
                text: text.into(),
            })
            .await;
    }
}
