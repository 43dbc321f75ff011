use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agent_pipeline::PipelineEvent;

/// Updates emitted while a generation is in flight, consumed by whoever
/// renders the conversation.
///
/// `ThinkingUpdate` and `AnswerUpdate` carry the cumulative text so far, not
/// a fragment: reading only the latest event always yields the complete
/// partial output.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    ThinkingUpdate {
        turn_id: Uuid,
        text: String,
    },
    AnswerUpdate {
        turn_id: Uuid,
        text: String,
    },
    /// Generation finished and the turn holds its final content.
    Completed {
        turn_id: Uuid,
    },
    /// Generation was cancelled; the turn keeps the accumulated partial.
    Interrupted {
        turn_id: Uuid,
    },
    /// Generation failed; the turn's content is the error message.
    Failed {
        turn_id: Uuid,
        message: String,
    },
    /// Progress relayed from an agent pipeline run.
    Pipeline(PipelineEvent),
}
