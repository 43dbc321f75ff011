use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::types::{GenerationRequest, StreamChunk};

pub type ConnectorStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Contract every model provider implements.
///
/// Implementations must yield `Thinking`/`Answer` deltas in arrival order,
/// yield `Err(ConnectorError::Cancelled)` when the caller's cancellation
/// token fires during a read, and end the stream after `Done`. A stream that
/// finishes without answer text is treated as `EmptyResponse` by consumers.
#[async_trait]
pub trait StreamingConnector: Send + Sync {
    async fn stream_chat(&self, request: &GenerationRequest) -> Result<ConnectorStream>;
}
