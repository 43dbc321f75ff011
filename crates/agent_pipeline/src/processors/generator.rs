use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use conversation_core::Role;
use llm_connector::{
    ChatMessage, ConnectorError, GenerationRequest, StreamChunk, StreamingConnector,
};

use crate::engine::TaskProcessor;
use crate::events::TaskStream;
use crate::types::{PipelineContext, PipelineError, TaskConfig};

/// The main generation step: streams the model's answer, relaying cumulative
/// text through the task stream as it grows.
pub struct GenerationProcessor {
    connector: Arc<dyn StreamingConnector>,
}

impl GenerationProcessor {
    pub fn new(connector: Arc<dyn StreamingConnector>) -> Self {
        Self { connector }
    }

    /// Request messages from the context history, with the optimizer's
    /// rewrite substituted for the last user message when one exists.
    fn build_messages(context: &PipelineContext) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> =
            context.history.iter().map(ChatMessage::from_turn).collect();

        let effective = context.effective_input();
        match messages.iter_mut().rev().find(|m| m.role == Role::User) {
            Some(last_user) if last_user.content != effective => {
                last_user.content = effective.to_string();
            }
            Some(_) => {}
            None => messages.push(ChatMessage::user(effective)),
        }
        messages
    }
}

#[async_trait]
impl TaskProcessor for GenerationProcessor {
    async fn process(
        &self,
        context: &mut PipelineContext,
        config: &TaskConfig,
        cancel_token: &CancellationToken,
        stream: &TaskStream<'_>,
    ) -> Result<String, PipelineError> {
        let request =
            GenerationRequest::new(Self::build_messages(context), context.model.clone());
        let mut connector_stream = self.connector.stream_chat(&request).await?;

        let mut answer = String::new();
        let mut reasoning = String::new();
        while let Some(chunk) = connector_stream.next().await {
            if cancel_token.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            match chunk? {
                StreamChunk::Answer(delta) => {
                    answer.push_str(&delta);
                    stream.message(answer.clone()).await;
                }
                StreamChunk::Thinking(delta) => reasoning.push_str(&delta),
                StreamChunk::Usage(usage) => {
                    if let Ok(value) = serde_json::to_value(&usage) {
                        context.data.insert("usage".to_string(), value);
                    }
                }
                StreamChunk::Done => break,
            }
        }

        if answer.is_empty() {
            return Err(PipelineError::Connector(ConnectorError::EmptyResponse));
        }
        if !reasoning.is_empty() {
            context.data.insert(
                "reasoning_content".to_string(),
                serde_json::Value::String(reasoning),
            );
        }
        tracing::debug!(
            task_id = %config.id,
            content_len = answer.len(),
            "Generator: stream finished"
        );
        Ok(answer)
    }
}
