//! Built-in task processors, each one an LLM call through the connector.

pub mod generator;
pub mod optimizer;
pub mod summarizer;

pub use generator::GenerationProcessor;
pub use optimizer::InputOptimizerProcessor;
pub use summarizer::SummarizerProcessor;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use llm_connector::{ConnectorError, ConnectorStream, StreamChunk};

use crate::types::PipelineError;

/// Drain a stream into its full answer text, without relaying progress.
/// Used by the auxiliary processors; the main generation keeps its own loop
/// so it can stream cumulative text to the observer.
pub(crate) async fn collect_answer(
    mut stream: ConnectorStream,
    cancel_token: &CancellationToken,
) -> Result<String, PipelineError> {
    let mut answer = String::new();
    while let Some(chunk) = stream.next().await {
        if cancel_token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        match chunk? {
            StreamChunk::Answer(delta) => answer.push_str(&delta),
            StreamChunk::Thinking(_) | StreamChunk::Usage(_) => {}
            StreamChunk::Done => break,
        }
    }
    if answer.is_empty() {
        return Err(PipelineError::Connector(ConnectorError::EmptyResponse));
    }
    Ok(answer)
}
