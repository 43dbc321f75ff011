//! Sequential agent task pipeline.
//!
//! An ordered list of [`TaskConfig`]s runs against a shared mutable
//! [`PipelineContext`]; later tasks read what earlier tasks wrote. Execution
//! is strictly sequential and cooperatively cancellable between tasks.

pub mod engine;
pub mod events;
pub mod processors;
pub mod types;

pub use engine::{PipelineEngine, PipelineRun, TaskProcessor};
pub use events::{PipelineEvent, TaskStream};
pub use processors::{GenerationProcessor, InputOptimizerProcessor, SummarizerProcessor};
pub use types::{
    PipelineContext, PipelineError, TaskCondition, TaskConfig, TaskResult, TaskStatus, TaskType,
};
