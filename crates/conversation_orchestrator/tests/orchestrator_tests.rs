//! Tests for generation orchestration

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use agent_pipeline::{TaskConfig, TaskType};
use conversation_core::{Conversation, Role, Turn};
use conversation_orchestrator::{
    ConversationEvent, ConversationOrchestrator, GenerationRoute, OrchestratorError,
    INTERRUPTED_MARKER,
};
use llm_connector::{
    ConnectorError, ConnectorStream, ExtraContext, ExtraContextPlacement, GenerationRequest,
    ModelConfig, StreamChunk, StreamingConnector,
};

/// Replays pre-scripted streams in order and records every request it saw.
struct ScriptedConnector {
    scripts: Mutex<VecDeque<Vec<llm_connector::Result<StreamChunk>>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedConnector {
    fn new(scripts: Vec<Vec<llm_connector::Result<StreamChunk>>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn answer(text: &str) -> Vec<llm_connector::Result<StreamChunk>> {
        vec![
            Ok(StreamChunk::Answer(text.to_string())),
            Ok(StreamChunk::Done),
        ]
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamingConnector for ScriptedConnector {
    async fn stream_chat(
        &self,
        request: &GenerationRequest,
    ) -> llm_connector::Result<ConnectorStream> {
        self.requests.lock().unwrap().push(request.clone());
        let items = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted connector exhausted");
        Ok(Box::pin(stream::iter(items)))
    }
}

fn seeded_conversation() -> Conversation {
    let mut conversation = Conversation::new(Uuid::new_v4());
    conversation.append_turn(Turn::system("welcome"));
    conversation
}

fn drain(rx: &mut mpsc::Receiver<ConversationEvent>) -> Vec<ConversationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_send_message_appends_user_and_placeholder_turns() {
    let connector = ScriptedConnector::new(vec![ScriptedConnector::answer("Hello there")]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector.clone(), ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, mut rx) = mpsc::channel(64);

    let placeholder_id = orchestrator
        .send_message(
            &mut conversation,
            "Hi",
            Vec::new(),
            GenerationRoute::Direct,
            None,
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(conversation.len(), 3);
    assert_eq!(conversation.active_path.len(), 3);
    assert_eq!(conversation.active_leaf(), Some(placeholder_id));

    let assistant = conversation.turn(placeholder_id).unwrap();
    assert_eq!(assistant.role, Role::Assistant);
    assert_eq!(assistant.content, "Hello there");

    let user = conversation.turn(assistant.parent_id.unwrap()).unwrap();
    assert_eq!(user.role, Role::User);
    assert_eq!(user.content, "Hi");

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ConversationEvent::Completed { .. })));
}

#[tokio::test]
async fn test_send_message_rejects_empty_content() {
    let connector = ScriptedConnector::new(vec![]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, _rx) = mpsc::channel(64);

    let result = orchestrator
        .send_message(
            &mut conversation,
            "   ",
            Vec::new(),
            GenerationRoute::Direct,
            None,
            &tx,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(OrchestratorError::EmptyMessageContent)));
    assert_eq!(conversation.len(), 1);
}

#[tokio::test]
async fn test_cancellation_keeps_partial_output() {
    let connector = ScriptedConnector::new(vec![vec![
        Ok(StreamChunk::Answer("Hel".to_string())),
        Ok(StreamChunk::Answer("lo wor".to_string())),
        Err(ConnectorError::Cancelled),
    ]]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, mut rx) = mpsc::channel(64);

    let placeholder_id = orchestrator
        .send_message(
            &mut conversation,
            "Hi",
            Vec::new(),
            GenerationRoute::Direct,
            None,
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let turn = conversation.turn(placeholder_id).unwrap();
    assert_eq!(turn.content, "Hello wor");
    assert_eq!(turn.metadata.as_ref().unwrap().interrupted, Some(true));

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ConversationEvent::Interrupted { .. })));
}

#[tokio::test]
async fn test_cancellation_without_output_uses_marker() {
    let connector = ScriptedConnector::new(vec![vec![Err(ConnectorError::Cancelled)]]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, _rx) = mpsc::channel(64);

    let placeholder_id = orchestrator
        .send_message(
            &mut conversation,
            "Hi",
            Vec::new(),
            GenerationRoute::Direct,
            None,
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        conversation.turn(placeholder_id).unwrap().content,
        INTERRUPTED_MARKER
    );
}

#[tokio::test]
async fn test_connector_error_becomes_turn_content() {
    let connector = ScriptedConnector::new(vec![vec![Err(ConnectorError::Api(
        "upstream returned 500".to_string(),
    ))]]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, mut rx) = mpsc::channel(64);

    let placeholder_id = orchestrator
        .send_message(
            &mut conversation,
            "Hi",
            Vec::new(),
            GenerationRoute::Direct,
            None,
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let content = &conversation.turn(placeholder_id).unwrap().content;
    assert!(content.contains("upstream returned 500"));

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ConversationEvent::Failed { .. })));
}

#[tokio::test]
async fn test_empty_stream_is_a_failure() {
    let connector = ScriptedConnector::new(vec![vec![Ok(StreamChunk::Done)]]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, mut rx) = mpsc::channel(64);

    orchestrator
        .send_message(
            &mut conversation,
            "Hi",
            Vec::new(),
            GenerationRoute::Direct,
            None,
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ConversationEvent::Failed { .. })));
}

#[tokio::test]
async fn test_edit_and_regenerate_creates_sibling_branch() {
    let connector = ScriptedConnector::new(vec![
        ScriptedConnector::answer("first answer"),
        ScriptedConnector::answer("revised answer"),
    ]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, _rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    orchestrator
        .send_message(
            &mut conversation,
            "original question",
            Vec::new(),
            GenerationRoute::Direct,
            None,
            &tx,
            &cancel,
        )
        .await
        .unwrap();
    let user_id = conversation.active_path[1];

    let placeholder_id = orchestrator
        .edit_and_regenerate(
            &mut conversation,
            user_id,
            "better question",
            GenerationRoute::Direct,
            None,
            &tx,
            &cancel,
        )
        .await
        .unwrap()
        .unwrap();

    // Old branch survives; new branch holds the regenerated answer.
    assert_eq!(conversation.len(), 5);
    assert_eq!(
        conversation.turn(placeholder_id).unwrap().content,
        "revised answer"
    );
    let new_user = conversation.turn(conversation.active_path[1]).unwrap();
    assert_eq!(new_user.content, "better question");
    assert_eq!(conversation.sibling_group(user_id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_edit_unknown_target_is_noop() {
    let connector = ScriptedConnector::new(vec![]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, _rx) = mpsc::channel(64);

    let result = orchestrator
        .edit_and_regenerate(
            &mut conversation,
            Uuid::new_v4(),
            "content",
            GenerationRoute::Direct,
            None,
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(conversation.len(), 1);
}

#[tokio::test]
async fn test_regenerate_assistant_turn_adds_sibling_draft() {
    let connector = ScriptedConnector::new(vec![
        ScriptedConnector::answer("first draft"),
        ScriptedConnector::answer("second draft"),
    ]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, _rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    orchestrator
        .send_message(
            &mut conversation,
            "question",
            Vec::new(),
            GenerationRoute::Direct,
            None,
            &tx,
            &cancel,
        )
        .await
        .unwrap();
    let first_draft = conversation.active_leaf().unwrap();

    let second_draft = orchestrator
        .regenerate(
            &mut conversation,
            first_draft,
            GenerationRoute::Direct,
            None,
            &tx,
            &cancel,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        conversation.turn(second_draft).unwrap().content,
        "second draft"
    );
    assert_eq!(conversation.turn(first_draft).unwrap().content, "first draft");
    assert_eq!(conversation.sibling_group(first_draft).unwrap().len(), 2);
    assert_eq!(conversation.active_leaf(), Some(second_draft));
}

#[tokio::test]
async fn test_system_prompt_and_extra_context_shape_the_request() {
    let connector = ScriptedConnector::new(vec![ScriptedConnector::answer("ok")]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector.clone(), ModelConfig::new("test-model"))
            .with_system_prompt("you are a writing assistant");
    let mut conversation = Conversation::new(Uuid::new_v4());
    let (tx, _rx) = mpsc::channel(64);

    orchestrator
        .send_message(
            &mut conversation,
            "draft a letter",
            Vec::new(),
            GenerationRoute::Direct,
            Some(ExtraContext {
                text: "recipient is a colleague".to_string(),
                placement: ExtraContextPlacement::AfterSystemPrompt,
            }),
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let requests = connector.requests();
    assert_eq!(requests.len(), 1);
    let messages = &requests[0].messages;
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[0].content, "you are a writing assistant");
    assert_eq!(messages[1].role, Role::System);
    assert_eq!(messages[1].content, "recipient is a colleague");
    assert_eq!(messages[2].role, Role::User);
    // The stored turn is untouched by the injected context.
    let user_turn = conversation.turn(conversation.active_path[0]).unwrap();
    assert_eq!(user_turn.content, "draft a letter");
}

#[tokio::test]
async fn test_pipeline_route_records_task_results() {
    let connector = ScriptedConnector::new(vec![ScriptedConnector::answer(
        "a poem about autumn leaves",
    )]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, mut rx) = mpsc::channel(64);

    let tasks = vec![
        // Short input: passthrough without a connector call.
        TaskConfig::new("optimize", TaskType::OptimizeInput, "Input Optimizer"),
        TaskConfig::new("generate", TaskType::Generate, "Main Generation"),
    ];
    let placeholder_id = orchestrator
        .send_message(
            &mut conversation,
            "autumn poem",
            Vec::new(),
            GenerationRoute::Agent {
                tasks,
                main_task_id: "generate".to_string(),
            },
            None,
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let turn = conversation.turn(placeholder_id).unwrap();
    assert_eq!(turn.content, "a poem about autumn leaves");
    let results = &turn.components.as_ref().unwrap().agent_results;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == "completed"));

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ConversationEvent::Pipeline(_))));
    assert!(events
        .iter()
        .any(|e| matches!(e, ConversationEvent::Completed { .. })));
}

#[tokio::test]
async fn test_pipeline_failed_main_task_fails_the_turn() {
    // The generation stream errors out; the optimizer passthrough still runs.
    let connector = ScriptedConnector::new(vec![vec![Err(ConnectorError::Api(
        "model unavailable".to_string(),
    ))]]);
    let mut orchestrator =
        ConversationOrchestrator::new(connector, ModelConfig::new("test-model"));
    let mut conversation = seeded_conversation();
    let (tx, mut rx) = mpsc::channel(64);

    let tasks = vec![
        TaskConfig::new("optimize", TaskType::OptimizeInput, "Input Optimizer"),
        TaskConfig::new("generate", TaskType::Generate, "Main Generation"),
    ];
    let placeholder_id = orchestrator
        .send_message(
            &mut conversation,
            "autumn poem",
            Vec::new(),
            GenerationRoute::Agent {
                tasks,
                main_task_id: "generate".to_string(),
            },
            None,
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let turn = conversation.turn(placeholder_id).unwrap();
    assert!(turn.content.contains("generate"));

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ConversationEvent::Failed { .. })));
}
