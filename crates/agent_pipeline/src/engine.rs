//! Pipeline engine: sequential execution of configured tasks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use llm_connector::StreamingConnector;

use crate::events::{PipelineEvent, TaskStream};
use crate::processors::{GenerationProcessor, InputOptimizerProcessor, SummarizerProcessor};
use crate::types::{PipelineContext, PipelineError, TaskConfig, TaskResult, TaskStatus, TaskType};

/// One task implementation. Expected no-op conditions (input too short to
/// optimize, nothing to summarize) must return `Ok` with the input passed
/// through, not an error.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(
        &self,
        context: &mut PipelineContext,
        config: &TaskConfig,
        cancel_token: &CancellationToken,
        stream: &TaskStream<'_>,
    ) -> Result<String, PipelineError>;
}

/// Outcome of a full pipeline run. `cancelled` marks a truncated-but-valid
/// result set, not an error.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub results: Vec<TaskResult>,
    pub cancelled: bool,
}

impl PipelineRun {
    /// The pipeline's output by convention: the designated main generation
    /// task's output. Missing or non-completed main task fails the whole run.
    pub fn final_output(&self, main_task_id: &str) -> Result<String, PipelineError> {
        let result = self
            .results
            .iter()
            .find(|result| result.id == main_task_id)
            .ok_or_else(|| PipelineError::MainTaskMissing(main_task_id.to_string()))?;
        match (&result.status, &result.output) {
            (TaskStatus::Completed, Some(output)) => Ok(output.clone()),
            _ => Err(PipelineError::MainTaskNotCompleted(
                main_task_id.to_string(),
            )),
        }
    }
}

/// Executes ordered task lists against registered processors.
pub struct PipelineEngine {
    processors: HashMap<TaskType, Arc<dyn TaskProcessor>>,
}

impl PipelineEngine {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Engine with the built-in processors, all backed by `connector`.
    pub fn with_default_processors(connector: Arc<dyn StreamingConnector>) -> Self {
        let mut engine = Self::new();
        engine.register(
            TaskType::OptimizeInput,
            Arc::new(InputOptimizerProcessor::new(connector.clone())),
        );
        engine.register(
            TaskType::Generate,
            Arc::new(GenerationProcessor::new(connector.clone())),
        );
        engine.register(
            TaskType::Summarize,
            Arc::new(SummarizerProcessor::new(connector)),
        );
        engine
    }

    pub fn register(&mut self, task_type: TaskType, processor: Arc<dyn TaskProcessor>) {
        self.processors.insert(task_type, processor);
    }

    /// Run `tasks` in list order against `context`.
    ///
    /// The cancellation token is checked before each task; once it fires the
    /// remaining tasks are not attempted and the collected results are
    /// returned. A task failure is recorded and execution continues. Every
    /// attempted task produces exactly one `TaskStarted` and one
    /// `TaskCompleted` event; disabled tasks and tasks whose condition is
    /// false are skipped silently.
    pub async fn run(
        &self,
        tasks: &[TaskConfig],
        context: &mut PipelineContext,
        events: &mpsc::Sender<PipelineEvent>,
        cancel_token: &CancellationToken,
    ) -> PipelineRun {
        let mut results: Vec<TaskResult> = Vec::new();
        let mut cancelled = false;

        for config in tasks {
            if cancel_token.is_cancelled() {
                tracing::info!(
                    task_id = %config.id,
                    "Pipeline: cancelled before task, stopping"
                );
                cancelled = true;
                break;
            }

            if !config.enabled {
                tracing::debug!(task_id = %config.id, "Pipeline: task disabled, skipping");
                continue;
            }
            if let Some(condition) = &config.condition {
                if !condition.evaluate(context) {
                    tracing::debug!(
                        task_id = %config.id,
                        condition = ?condition,
                        "Pipeline: condition not met, skipping"
                    );
                    continue;
                }
            }

            let mut result = TaskResult::started(config, context.effective_input());
            let _ = events
                .send(PipelineEvent::TaskStarted {
                    task_id: config.id.clone(),
                    task_name: config.name.clone(),
                    results: results.clone(),
                })
                .await;

            let unmet = config
                .requires
                .iter()
                .find(|required| !context.task_completed(required));

            if let Some(required) = unmet {
                result.finish(
                    TaskStatus::Failed,
                    None,
                    Some(format!("required task did not complete: {required}")),
                );
                tracing::warn!(
                    task_id = %config.id,
                    required = %required,
                    "Pipeline: requirement unmet, task not run"
                );
            } else if let Some(processor) = self.processors.get(&config.task_type) {
                let stream = TaskStream::new(events, &config.name);
                match processor
                    .process(context, config, cancel_token, &stream)
                    .await
                {
                    Ok(output) => {
                        result.finish(TaskStatus::Completed, Some(output), None);
                    }
                    Err(error) if error.is_cancelled() || cancel_token.is_cancelled() => {
                        result.finish(TaskStatus::Cancelled, None, Some(error.to_string()));
                        cancelled = true;
                    }
                    Err(error) => {
                        tracing::warn!(
                            task_id = %config.id,
                            error = %error,
                            "Pipeline: task failed, continuing"
                        );
                        result.finish(TaskStatus::Failed, None, Some(error.to_string()));
                    }
                }
            } else {
                result.finish(
                    TaskStatus::Failed,
                    None,
                    Some(format!(
                        "no processor registered for task type: {}",
                        config.task_type.as_str()
                    )),
                );
            }

            context
                .task_results
                .insert(config.id.clone(), result.clone());
            results.push(result.clone());

            let _ = events
                .send(PipelineEvent::TaskCompleted {
                    task_id: config.id.clone(),
                    task_name: config.name.clone(),
                    result,
                    results: results.clone(),
                })
                .await;

            if cancelled {
                break;
            }
        }

        tracing::info!(
            attempted = results.len(),
            cancelled,
            "Pipeline: run finished"
        );
        PipelineRun { results, cancelled }
    }
}

impl Default for PipelineEngine {
    fn default() -> Self {
        Self::new()
    }
}
