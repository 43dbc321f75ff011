//! Provider-agnostic streaming contract for language model generation.
//!
//! Concrete wire protocols live behind [`StreamingConnector`]; everything
//! above this crate works in terms of [`StreamChunk`] deltas and
//! [`GenerationRequest`] message lists.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{ConnectorStream, StreamingConnector};
pub use error::{ConnectorError, Result};
pub use types::{
    ChatMessage, ExtraContext, ExtraContextPlacement, FinalResponse, GenerationRequest,
    ModelConfig, StreamChunk,
};
