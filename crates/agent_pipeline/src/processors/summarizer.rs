use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use llm_connector::{ChatMessage, GenerationRequest, StreamingConnector};

use super::collect_answer;
use crate::engine::TaskProcessor;
use crate::events::TaskStream;
use crate::types::{PipelineContext, PipelineError, TaskConfig};

const SUMMARIZER_PROMPT: &str = "Summarize the following text in two or three sentences. \
Reply with the summary only.";

/// Condenses the output of an earlier task, typically the main generation.
pub struct SummarizerProcessor {
    connector: Arc<dyn StreamingConnector>,
}

impl SummarizerProcessor {
    pub fn new(connector: Arc<dyn StreamingConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl TaskProcessor for SummarizerProcessor {
    async fn process(
        &self,
        context: &mut PipelineContext,
        config: &TaskConfig,
        cancel_token: &CancellationToken,
        stream: &TaskStream<'_>,
    ) -> Result<String, PipelineError> {
        // Summarize the first required task's output; with no requirement
        // configured, fall back to the effective input.
        let source = config
            .requires
            .iter()
            .filter_map(|id| context.task_results.get(id))
            .find_map(|result| result.output.clone())
            .unwrap_or_else(|| context.effective_input().to_string());

        if source.trim().is_empty() {
            tracing::debug!(task_id = %config.id, "Summarizer: nothing to summarize");
            return Ok(String::new());
        }

        let request = GenerationRequest::new(
            vec![
                ChatMessage::system(SUMMARIZER_PROMPT),
                ChatMessage::user(source),
            ],
            context.model.clone(),
        );
        let connector_stream = self.connector.stream_chat(&request).await?;
        let summary = collect_answer(connector_stream, cancel_token).await?;

        stream.message(summary.clone()).await;
        context.data.insert(
            "summary".to_string(),
            serde_json::Value::String(summary.clone()),
        );
        Ok(summary)
    }
}
