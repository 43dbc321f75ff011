//! Generation orchestration over a branching conversation.
//!
//! Drives the send/edit/regenerate flows: placeholder insertion, request
//! assembly from ancestor chains, stream consumption with cooperative
//! cancellation, and routing through the agent pipeline.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod stream;

pub use error::OrchestratorError;
pub use events::ConversationEvent;
pub use orchestrator::{
    ConversationOrchestrator, GenerationRoute, GENERATING_PLACEHOLDER, INTERRUPTED_MARKER,
};
pub use stream::StreamAccumulator;
