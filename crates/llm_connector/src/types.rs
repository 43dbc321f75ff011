use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use conversation_core::{Role, TokenUsage, Turn};

/// One message of the outgoing request, already flattened to plain text.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn from_turn(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Per-request model selection and sampling knobs.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ModelConfig {
    pub model_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Provider-specific parameters passed through untouched.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl ModelConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }
}

/// Where injected context is spliced into the outgoing message list.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtraContextPlacement {
    AppendToLastUserTurn,
    AfterSystemPrompt,
}

/// Request-scoped context that is never written into the stored turns.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExtraContext {
    pub text: String,
    pub placement: ExtraContextPlacement,
}

/// A fully assembled generation request.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub model: ModelConfig,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ChatMessage>, model: ModelConfig) -> Self {
        Self { messages, model }
    }

    /// Splice `extra` into the message list according to its placement.
    ///
    /// `AfterSystemPrompt` inserts a system message after the leading system
    /// block (or at the front when there is none). `AppendToLastUserTurn`
    /// extends the last user message, falling back to a new user message when
    /// the request has none.
    pub fn apply_extra_context(&mut self, extra: &ExtraContext) {
        match extra.placement {
            ExtraContextPlacement::AfterSystemPrompt => {
                let insert_at = self
                    .messages
                    .iter()
                    .take_while(|m| m.role == Role::System)
                    .count();
                self.messages
                    .insert(insert_at, ChatMessage::system(extra.text.clone()));
            }
            ExtraContextPlacement::AppendToLastUserTurn => {
                match self
                    .messages
                    .iter_mut()
                    .rev()
                    .find(|m| m.role == Role::User)
                {
                    Some(message) => {
                        message.content.push_str("\n\n");
                        message.content.push_str(&extra.text);
                    }
                    None => self.messages.push(ChatMessage::user(extra.text.clone())),
                }
            }
        }
    }
}

/// One streamed delta from a connector.
///
/// `Thinking` and `Answer` carry only the new fragment; consumers accumulate.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamChunk {
    Thinking(String),
    Answer(String),
    Usage(TokenUsage),
    Done,
}

/// Result of a completed generation, assembled by the consumer of the stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FinalResponse {
    pub content: String,
    pub reasoning_content: Option<String>,
    pub usage: Option<TokenUsage>,
}
