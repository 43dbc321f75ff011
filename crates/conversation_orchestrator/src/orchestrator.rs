//! The orchestrator: placeholder insertion, request assembly, routing.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use agent_pipeline::{PipelineContext, PipelineEngine, PipelineEvent, TaskConfig};
use conversation_core::{
    Conversation, DeleteOutcome, Role, TokenUsage, Turn, TurnComponents, TurnMetadata,
};
use llm_connector::{
    ChatMessage, ConnectorError, ExtraContext, GenerationRequest, ModelConfig, StreamingConnector,
};

use crate::error::OrchestratorError;
use crate::events::ConversationEvent;
use crate::stream::{consume_stream, StreamAccumulator};

/// Content of an assistant turn between insertion and the first finalize.
pub const GENERATING_PLACEHOLDER: &str = "generating…";

/// Content of a cancelled turn that never received any output.
pub const INTERRUPTED_MARKER: &str = "generation interrupted";

/// How a generation reaches the model.
#[derive(Clone, Debug)]
pub enum GenerationRoute {
    /// One direct connector call.
    Direct,
    /// Through the agent pipeline; the task with `main_task_id` supplies the
    /// turn's final content.
    Agent {
        tasks: Vec<TaskConfig>,
        main_task_id: String,
    },
}

/// Drives generations against one conversation at a time.
///
/// Mutations and stream consumption run on the caller's task; the only
/// concurrency is the event-forwarding side of a pipeline run. Exactly one
/// generation may be in flight, enforced by a flag checked before starting.
pub struct ConversationOrchestrator {
    connector: Arc<dyn StreamingConnector>,
    pipeline: PipelineEngine,
    model: ModelConfig,
    system_prompt: Option<String>,
    generating: bool,
}

impl ConversationOrchestrator {
    pub fn new(connector: Arc<dyn StreamingConnector>, model: ModelConfig) -> Self {
        let pipeline = PipelineEngine::with_default_processors(connector.clone());
        Self {
            connector,
            pipeline,
            model,
            system_prompt: None,
            generating: false,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Append a user turn and a placeholder assistant turn, then generate
    /// into the placeholder. Returns the placeholder's id; both turns are in
    /// the store and on the active path before the first stream read.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_message(
        &mut self,
        conversation: &mut Conversation,
        content: &str,
        attached_files: Vec<String>,
        route: GenerationRoute,
        extra_context: Option<ExtraContext>,
        events: &mpsc::Sender<ConversationEvent>,
        cancel_token: &CancellationToken,
    ) -> Result<Uuid, OrchestratorError> {
        if self.generating {
            return Err(OrchestratorError::GenerationInProgress);
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(OrchestratorError::EmptyMessageContent);
        }

        let parent = conversation.active_leaf();
        let components = TurnComponents {
            user_input: Some(content.to_string()),
            attached_files,
            ..Default::default()
        };
        let user_turn = Turn::user(content, parent).with_components(components);
        let user_id = conversation.append_turn(user_turn);
        let placeholder_id =
            conversation.append_turn(Turn::assistant(GENERATING_PLACEHOLDER, Some(user_id)));

        self.generating = true;
        self.run_generation(
            conversation,
            user_id,
            placeholder_id,
            route,
            extra_context,
            events,
            cancel_token,
        )
        .await;
        self.generating = false;
        Ok(placeholder_id)
    }

    /// Edit a user turn into a new sibling branch and regenerate its answer.
    /// Returns `Ok(None)` when the target is unknown or not a user turn.
    #[allow(clippy::too_many_arguments)]
    pub async fn edit_and_regenerate(
        &mut self,
        conversation: &mut Conversation,
        target: Uuid,
        new_content: &str,
        route: GenerationRoute,
        extra_context: Option<ExtraContext>,
        events: &mpsc::Sender<ConversationEvent>,
        cancel_token: &CancellationToken,
    ) -> Result<Option<Uuid>, OrchestratorError> {
        if self.generating {
            return Err(OrchestratorError::GenerationInProgress);
        }
        let new_content = new_content.trim();
        if new_content.is_empty() {
            return Err(OrchestratorError::EmptyMessageContent);
        }

        let Some(new_user_id) = conversation.edit_user_turn(target, new_content) else {
            return Ok(None);
        };
        let Some(placeholder_id) =
            conversation.add_child_turn(new_user_id, Turn::assistant(GENERATING_PLACEHOLDER, None))
        else {
            return Ok(None);
        };

        self.generating = true;
        self.run_generation(
            conversation,
            new_user_id,
            placeholder_id,
            route,
            extra_context,
            events,
            cancel_token,
        )
        .await;
        self.generating = false;
        Ok(Some(placeholder_id))
    }

    /// Produce a fresh answer for an existing turn. An assistant target gets
    /// a new sibling draft; a user target gets a new answer child. Returns
    /// `Ok(None)` for unknown ids and system turns.
    pub async fn regenerate(
        &mut self,
        conversation: &mut Conversation,
        target: Uuid,
        route: GenerationRoute,
        extra_context: Option<ExtraContext>,
        events: &mpsc::Sender<ConversationEvent>,
        cancel_token: &CancellationToken,
    ) -> Result<Option<Uuid>, OrchestratorError> {
        if self.generating {
            return Err(OrchestratorError::GenerationInProgress);
        }

        let Some(turn) = conversation.turn(target) else {
            return Ok(None);
        };
        let (user_turn_id, placeholder_id) = match turn.role {
            Role::Assistant => {
                let Some(user_id) = turn.parent_id else {
                    return Ok(None);
                };
                let Some(placeholder_id) = conversation
                    .add_sibling_turn(target, Turn::assistant(GENERATING_PLACEHOLDER, None))
                else {
                    return Ok(None);
                };
                (user_id, placeholder_id)
            }
            Role::User => {
                let Some(placeholder_id) = conversation
                    .add_child_turn(target, Turn::assistant(GENERATING_PLACEHOLDER, None))
                else {
                    return Ok(None);
                };
                (target, placeholder_id)
            }
            Role::System => return Ok(None),
        };

        self.generating = true;
        self.run_generation(
            conversation,
            user_turn_id,
            placeholder_id,
            route,
            extra_context,
            events,
            cancel_token,
        )
        .await;
        self.generating = false;
        Ok(Some(placeholder_id))
    }

    /// Collapse the branch point around `target`. `None` for unknown ids.
    pub fn delete_turn(
        &self,
        conversation: &mut Conversation,
        target: Uuid,
    ) -> Option<DeleteOutcome> {
        conversation.delete_turn_and_siblings(target)
    }

    /// Root-to-user-turn request messages, resolved through parent links so
    /// turns added to the path mid-generation cannot leak in.
    fn assemble_request(
        &self,
        conversation: &Conversation,
        user_turn_id: Uuid,
        extra_context: Option<&ExtraContext>,
    ) -> GenerationRequest {
        let chain = conversation.ancestor_chain(user_turn_id);
        let mut messages = Vec::with_capacity(chain.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            let has_system = chain.first().map(|t| t.role == Role::System).unwrap_or(false);
            if !has_system {
                messages.push(ChatMessage::system(prompt.clone()));
            }
        }
        messages.extend(chain.iter().map(|turn| ChatMessage::from_turn(turn)));

        let mut request = GenerationRequest::new(messages, self.model.clone());
        if let Some(extra) = extra_context {
            request.apply_extra_context(extra);
        }
        request
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_generation(
        &mut self,
        conversation: &mut Conversation,
        user_turn_id: Uuid,
        placeholder_id: Uuid,
        route: GenerationRoute,
        extra_context: Option<ExtraContext>,
        events: &mpsc::Sender<ConversationEvent>,
        cancel_token: &CancellationToken,
    ) {
        match route {
            GenerationRoute::Direct => {
                self.run_direct(
                    conversation,
                    user_turn_id,
                    placeholder_id,
                    extra_context,
                    events,
                    cancel_token,
                )
                .await;
            }
            GenerationRoute::Agent {
                tasks,
                main_task_id,
            } => {
                self.run_pipeline(
                    conversation,
                    user_turn_id,
                    placeholder_id,
                    tasks,
                    main_task_id,
                    events,
                    cancel_token,
                )
                .await;
            }
        }
    }

    async fn run_direct(
        &mut self,
        conversation: &mut Conversation,
        user_turn_id: Uuid,
        placeholder_id: Uuid,
        extra_context: Option<ExtraContext>,
        events: &mpsc::Sender<ConversationEvent>,
        cancel_token: &CancellationToken,
    ) {
        let request = self.assemble_request(conversation, user_turn_id, extra_context.as_ref());
        tracing::info!(
            conversation_id = %conversation.id,
            turn_id = %placeholder_id,
            messages = request.messages.len(),
            "Orchestrator: starting direct generation"
        );

        let started = Instant::now();
        let mut accumulator = StreamAccumulator::new();
        let stream_result = match self.connector.stream_chat(&request).await {
            Ok(stream) => {
                consume_stream(
                    stream,
                    &mut accumulator,
                    placeholder_id,
                    events,
                    cancel_token,
                )
                .await
            }
            Err(error) => Err(error),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match stream_result {
            Ok(()) if accumulator.has_answer() => {
                let metadata = TurnMetadata {
                    duration_ms: Some(duration_ms),
                    tokens: accumulator.usage(),
                    ..Default::default()
                };
                let reasoning = accumulator.thinking();
                conversation.finalize_assistant_turn(
                    placeholder_id,
                    accumulator.answer(),
                    reasoning,
                    Some(metadata),
                );
                let _ = events
                    .send(ConversationEvent::Completed {
                        turn_id: placeholder_id,
                    })
                    .await;
            }
            Ok(()) => {
                self.fail_turn(
                    conversation,
                    placeholder_id,
                    ConnectorError::EmptyResponse.to_string(),
                    events,
                )
                .await;
            }
            Err(error) if error.is_cancelled() => {
                self.interrupt_turn(
                    conversation,
                    placeholder_id,
                    &accumulator,
                    duration_ms,
                    events,
                )
                .await;
            }
            Err(error) => {
                self.fail_turn(conversation, placeholder_id, error.to_string(), events)
                    .await;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_pipeline(
        &mut self,
        conversation: &mut Conversation,
        user_turn_id: Uuid,
        placeholder_id: Uuid,
        tasks: Vec<TaskConfig>,
        main_task_id: String,
        events: &mpsc::Sender<ConversationEvent>,
        cancel_token: &CancellationToken,
    ) {
        let history: Vec<Turn> = conversation
            .ancestor_chain(user_turn_id)
            .into_iter()
            .cloned()
            .collect();
        let (user_input, attached_files) = match conversation.turn(user_turn_id) {
            Some(turn) => (
                turn.content.clone(),
                turn.components
                    .as_ref()
                    .map(|c| c.attached_files.clone())
                    .unwrap_or_default(),
            ),
            None => (String::new(), Vec::new()),
        };
        let mut context = PipelineContext::new(user_input, self.model.clone())
            .with_history(history)
            .with_attached_files(attached_files);

        tracing::info!(
            conversation_id = %conversation.id,
            turn_id = %placeholder_id,
            tasks = tasks.len(),
            "Orchestrator: starting pipeline generation"
        );

        // Forward pipeline events to the conversation observer, keeping the
        // main task's last cumulative message for partial preservation.
        let main_task_name = tasks
            .iter()
            .find(|task| task.id == main_task_id)
            .map(|task| task.name.clone());
        let partial_text = Arc::new(Mutex::new(String::new()));
        let (pipeline_tx, mut pipeline_rx) = mpsc::channel::<PipelineEvent>(64);
        let forward_events = events.clone();
        let forward_partial = partial_text.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = pipeline_rx.recv().await {
                if let PipelineEvent::Message { task_name, text } = &event {
                    if Some(task_name) == main_task_name.as_ref() {
                        if let Ok(mut partial) = forward_partial.lock() {
                            *partial = text.clone();
                        }
                    }
                }
                let _ = forward_events.send(ConversationEvent::Pipeline(event)).await;
            }
        });

        let started = Instant::now();
        let run = self
            .pipeline
            .run(&tasks, &mut context, &pipeline_tx, cancel_token)
            .await;
        drop(pipeline_tx);
        let _ = forwarder.await;
        let duration_ms = started.elapsed().as_millis() as u64;

        // Record what the optimizer rewrote onto the originating user turn.
        if let Some(optimized) = context
            .data
            .get("optimized_input")
            .and_then(|value| value.as_str())
        {
            if let Some(turn) = conversation.turn_mut(user_turn_id) {
                let mut components = turn.components.clone().unwrap_or_default();
                components.optimized_input = Some(optimized.to_string());
                turn.components = Some(components);
                conversation.mark_dirty();
            }
        }

        // Task results travel with the produced turn.
        if let Some(turn) = conversation.turn_mut(placeholder_id) {
            let mut components = turn.components.clone().unwrap_or_default();
            components.agent_results = run.results.iter().map(|result| result.to_view()).collect();
            turn.components = Some(components);
            conversation.mark_dirty();
        }

        if run.cancelled {
            let partial = partial_text
                .lock()
                .map(|text| text.clone())
                .unwrap_or_default();
            let content = if partial.is_empty() {
                INTERRUPTED_MARKER.to_string()
            } else {
                partial
            };
            let metadata = TurnMetadata {
                duration_ms: Some(duration_ms),
                interrupted: Some(true),
                ..Default::default()
            };
            conversation.finalize_assistant_turn(placeholder_id, content, None, Some(metadata));
            let _ = events
                .send(ConversationEvent::Interrupted {
                    turn_id: placeholder_id,
                })
                .await;
            return;
        }

        match run.final_output(&main_task_id) {
            Ok(content) => {
                let reasoning = context
                    .data
                    .get("reasoning_content")
                    .and_then(|value| value.as_str())
                    .map(|s| s.to_string());
                let tokens = context
                    .data
                    .get("usage")
                    .cloned()
                    .and_then(|value| serde_json::from_value::<TokenUsage>(value).ok());
                let metadata = TurnMetadata {
                    duration_ms: Some(duration_ms),
                    tokens,
                    ..Default::default()
                };
                conversation.finalize_assistant_turn(
                    placeholder_id,
                    content,
                    reasoning,
                    Some(metadata),
                );
                let _ = events
                    .send(ConversationEvent::Completed {
                        turn_id: placeholder_id,
                    })
                    .await;
            }
            Err(error) => {
                self.fail_turn(conversation, placeholder_id, error.to_string(), events)
                    .await;
            }
        }
    }

    /// Finalize a cancelled generation, keeping accumulated partial output.
    async fn interrupt_turn(
        &self,
        conversation: &mut Conversation,
        placeholder_id: Uuid,
        accumulator: &StreamAccumulator,
        duration_ms: u64,
        events: &mpsc::Sender<ConversationEvent>,
    ) {
        let content = if accumulator.has_answer() {
            accumulator.answer().to_string()
        } else {
            INTERRUPTED_MARKER.to_string()
        };
        let metadata = TurnMetadata {
            duration_ms: Some(duration_ms),
            tokens: accumulator.usage(),
            interrupted: Some(true),
            ..Default::default()
        };
        tracing::info!(
            conversation_id = %conversation.id,
            turn_id = %placeholder_id,
            kept_chars = accumulator.answer().len(),
            "Orchestrator: generation interrupted, keeping partial output"
        );
        conversation.finalize_assistant_turn(
            placeholder_id,
            content,
            accumulator.thinking(),
            Some(metadata),
        );
        let _ = events
            .send(ConversationEvent::Interrupted {
                turn_id: placeholder_id,
            })
            .await;
    }

    /// Terminal failure: the turn's content becomes the error message, no
    /// retry.
    async fn fail_turn(
        &self,
        conversation: &mut Conversation,
        placeholder_id: Uuid,
        message: String,
        events: &mpsc::Sender<ConversationEvent>,
    ) {
        tracing::warn!(
            conversation_id = %conversation.id,
            turn_id = %placeholder_id,
            error = %message,
            "Orchestrator: generation failed"
        );
        conversation.finalize_assistant_turn(placeholder_id, message.clone(), None, None);
        let _ = events
            .send(ConversationEvent::Failed {
                turn_id: placeholder_id,
                message,
            })
            .await;
    }
}
