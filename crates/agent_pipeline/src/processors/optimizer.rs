use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use llm_connector::{ChatMessage, GenerationRequest, StreamingConnector};

use super::collect_answer;
use crate::engine::TaskProcessor;
use crate::events::TaskStream;
use crate::types::{PipelineContext, PipelineError, TaskConfig};

const OPTIMIZER_PROMPT: &str = "You rewrite a user's writing instruction into a clear, \
self-contained request. Keep the user's intent and language. Reply with the rewritten \
instruction only, no commentary.";

/// Inputs shorter than this are passed through unchanged.
const MIN_INPUT_CHARS: usize = 20;

/// Rewrites terse user input into an explicit instruction and records the
/// rewrite for downstream tasks.
pub struct InputOptimizerProcessor {
    connector: Arc<dyn StreamingConnector>,
}

impl InputOptimizerProcessor {
    pub fn new(connector: Arc<dyn StreamingConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl TaskProcessor for InputOptimizerProcessor {
    async fn process(
        &self,
        context: &mut PipelineContext,
        config: &TaskConfig,
        cancel_token: &CancellationToken,
        stream: &TaskStream<'_>,
    ) -> Result<String, PipelineError> {
        let input = context.user_input.clone();
        if input.chars().count() < MIN_INPUT_CHARS {
            // Too short to be worth a model round-trip; passing through is a
            // success, not a failure.
            tracing::debug!(task_id = %config.id, "Optimizer: input too short, passing through");
            return Ok(input);
        }

        let request = GenerationRequest::new(
            vec![
                ChatMessage::system(OPTIMIZER_PROMPT),
                ChatMessage::user(input.clone()),
            ],
            context.model.clone(),
        );
        let connector_stream = self.connector.stream_chat(&request).await?;
        let optimized = collect_answer(connector_stream, cancel_token).await?;

        stream.message(optimized.clone()).await;
        context.goal = Some(optimized.clone());
        context.data.insert(
            "optimized_input".to_string(),
            serde_json::Value::String(optimized.clone()),
        );
        tracing::debug!(
            task_id = %config.id,
            original_len = input.len(),
            optimized_len = optimized.len(),
            "Optimizer: rewrote input"
        );
        Ok(optimized)
    }
}
