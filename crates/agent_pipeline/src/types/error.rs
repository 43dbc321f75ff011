//! Pipeline execution errors

use llm_connector::ConnectorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Task execution failed: {0}")]
    Task(String),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("Main generation task not found: {0}")]
    MainTaskMissing(String),

    #[error("Main generation task did not complete: {0}")]
    MainTaskNotCompleted(String),

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    InternalError(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PipelineError::Cancelled | PipelineError::Connector(ConnectorError::Cancelled)
        )
    }
}
