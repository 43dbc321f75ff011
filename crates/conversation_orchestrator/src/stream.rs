//! Stream consumption and partial-output accumulation.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use conversation_core::TokenUsage;
use llm_connector::{ConnectorError, ConnectorStream, FinalResponse, StreamChunk};

use crate::events::ConversationEvent;

/// Accumulates deltas into cumulative thinking/answer text.
///
/// Kept separate from the consume loop so partial output survives whatever
/// ended the stream: on cancellation or error the caller still reads the
/// text collected so far.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    thinking: String,
    answer: String,
    usage: Option<TokenUsage>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn thinking(&self) -> Option<String> {
        if self.thinking.is_empty() {
            None
        } else {
            Some(self.thinking.clone())
        }
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        self.usage.clone()
    }

    pub fn has_answer(&self) -> bool {
        !self.answer.is_empty()
    }

    /// Final result on successful completion. An empty answer is a
    /// connector-level failure, never a success.
    pub fn finish(self) -> Result<FinalResponse, ConnectorError> {
        if self.answer.is_empty() {
            return Err(ConnectorError::EmptyResponse);
        }
        Ok(FinalResponse {
            content: self.answer,
            reasoning_content: if self.thinking.is_empty() {
                None
            } else {
                Some(self.thinking)
            },
            usage: self.usage,
        })
    }
}

/// Drain `stream` into `accumulator`, emitting cumulative updates for
/// `turn_id` along the way.
///
/// The cancellation token is checked once per received chunk, so at most one
/// more chunk lands after cancellation is requested. Whatever was
/// accumulated stays readable by the caller regardless of how the stream
/// ended.
pub async fn consume_stream(
    mut stream: ConnectorStream,
    accumulator: &mut StreamAccumulator,
    turn_id: Uuid,
    events: &mpsc::Sender<ConversationEvent>,
    cancel_token: &CancellationToken,
) -> Result<(), ConnectorError> {
    while let Some(chunk) = stream.next().await {
        if cancel_token.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        match chunk? {
            StreamChunk::Thinking(delta) => {
                accumulator.thinking.push_str(&delta);
                let _ = events
                    .send(ConversationEvent::ThinkingUpdate {
                        turn_id,
                        text: accumulator.thinking.clone(),
                    })
                    .await;
            }
            StreamChunk::Answer(delta) => {
                accumulator.answer.push_str(&delta);
                let _ = events
                    .send(ConversationEvent::AnswerUpdate {
                        turn_id,
                        text: accumulator.answer.clone(),
                    })
                    .await;
            }
            StreamChunk::Usage(usage) => accumulator.usage = Some(usage),
            StreamChunk::Done => break,
        }
    }
    Ok(())
}
