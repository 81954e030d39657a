//! Generation Command Handlers
//!
//! 每个生成入口的顺序固定: 校验 -> check_quota -> 生成 -> record_usage。
//! 校验失败时不检查配额也不调用模型；生成失败时只为服务端报告过的用量记账

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::application::agents::{ChapterAssignment, WriterAgent};
use crate::application::commands::handlers::UsageRecorder;
use crate::application::commands::{
    payload_bytes, GenerateCommand, GenerateResponse, GenerationRequest, PhaseOutput,
    StreamChapterCommand,
};
use crate::application::dispatcher::PipelineDispatcher;
use crate::application::error::ApplicationError;
use crate::application::ports::{ModelError, QuotaManagerPort, QuotaReservation};
use crate::domain::quota::{CallPlan, ReservationPolicy};
use crate::infrastructure::events::EventPublisher;

// ============================================================================
// Generate (non-streaming phases)
// ============================================================================

/// Generate Handler - 非流式阶段
pub struct GenerateHandler {
    dispatcher: Arc<PipelineDispatcher>,
    quota: Arc<dyn QuotaManagerPort>,
    recorder: Arc<UsageRecorder>,
    events: Arc<EventPublisher>,
}

impl GenerateHandler {
    pub fn new(
        dispatcher: Arc<PipelineDispatcher>,
        quota: Arc<dyn QuotaManagerPort>,
        recorder: Arc<UsageRecorder>,
        events: Arc<EventPublisher>,
    ) -> Self {
        Self {
            dispatcher,
            quota,
            recorder,
            events,
        }
    }

    pub async fn handle(&self, command: GenerateCommand) -> Result<GenerateResponse, ApplicationError> {
        let GenerateCommand { user_id, request } = command;

        self.dispatcher.validate(&request)?;
        let reservation = self
            .quota
            .check_quota(&user_id, self.dispatcher.reservation_tokens(&request))?;

        // 生成和记账在独立任务中完成，调用方被丢弃（客户端断开）时已消耗的 token 照常记账
        let task = GenerateTask {
            user_id,
            request,
            reservation,
            dispatcher: self.dispatcher.clone(),
            recorder: self.recorder.clone(),
            events: self.events.clone(),
        };
        tokio::spawn(task.run())
            .await
            .map_err(|e| ApplicationError::internal(format!("Generation task failed: {}", e)))?
    }
}

struct GenerateTask {
    user_id: String,
    request: GenerationRequest,
    reservation: QuotaReservation,
    dispatcher: Arc<PipelineDispatcher>,
    recorder: Arc<UsageRecorder>,
    events: Arc<EventPublisher>,
}

impl GenerateTask {
    async fn run(self) -> Result<GenerateResponse, ApplicationError> {
        let GenerateTask {
            user_id,
            request,
            reservation,
            dispatcher,
            recorder,
            events,
        } = self;
        let phase = request.phase();

        tracing::info!(
            user_id = %user_id,
            phase = %phase,
            reserved = reservation.tokens(),
            "Generation started"
        );

        let output = match dispatcher.dispatch(request).await {
            Ok(output) => output,
            Err(err) => {
                settle_failure(&recorder, reservation, &err).await;
                tracing::warn!(user_id = %user_id, phase = %phase, error = %err, "Generation failed");
                return Err(err);
            }
        };

        let usage = output.usage();
        let (usage_record, quota) = recorder.record(reservation, usage).await;

        events.publish_generation_completed(&user_id, phase, usage_record.amount);
        if let PhaseOutput::EditorCritic(outcome) = &output {
            events.publish_editor_critic_finished(
                &user_id,
                outcome.iterations,
                outcome.passed,
                outcome.final_evaluation.overall_score(),
                outcome.terminal_reason.map(|r| r.as_str().to_string()),
            );
        }

        tracing::info!(
            user_id = %user_id,
            phase = %phase,
            tokens = usage_record.amount,
            "Generation completed"
        );

        Ok(GenerateResponse {
            phase,
            output,
            usage_record,
            quota,
        })
    }
}

/// 失败时只为已消耗的 token 记账，否则释放预留
async fn settle_failure(recorder: &UsageRecorder, reservation: QuotaReservation, err: &ApplicationError) {
    let chargeable = match err {
        ApplicationError::LoopAborted(abort) => abort.chargeable_usage(),
        other => other
            .model_error()
            .and_then(ModelError::partial_usage)
            .unwrap_or_default(),
    };

    if chargeable.is_zero() {
        drop(reservation);
    } else {
        recorder.record(reservation, chargeable).await;
    }
}

// ============================================================================
// Stream chapter
// ============================================================================

/// 流式写作事件
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start { chapter_number: u32, title: String },
    Chunk { text: String },
    Complete { chapter_number: u32, content: String },
    Error { error: String },
}

impl StreamEvent {
    /// 事件名（SSE `event:` 字段）
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Start { .. } => "start",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// 事件负载（SSE `data:` 字段）
    pub fn data(&self) -> serde_json::Value {
        match self {
            StreamEvent::Start { chapter_number, title } => {
                serde_json::json!({ "chapterNumber": chapter_number, "title": title })
            }
            StreamEvent::Chunk { text } => serde_json::json!({ "text": text }),
            StreamEvent::Complete { chapter_number, content } => {
                serde_json::json!({ "chapterNumber": chapter_number, "content": content })
            }
            StreamEvent::Error { error } => serde_json::json!({ "error": error }),
        }
    }
}

/// 流式写作会话
///
/// 持有取消守卫：会话被丢弃（客户端断开）时取消上游生成
pub struct ChapterStream {
    events: mpsc::Receiver<StreamEvent>,
    guard: DropGuard,
}

impl ChapterStream {
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn into_parts(self) -> (mpsc::Receiver<StreamEvent>, DropGuard) {
        (self.events, self.guard)
    }
}

/// StreamChapter Handler - 流式写作
pub struct ChapterStreamHandler {
    writer: Arc<WriterAgent>,
    quota: Arc<dyn QuotaManagerPort>,
    recorder: Arc<UsageRecorder>,
    events: Arc<EventPublisher>,
    reservation: ReservationPolicy,
}

impl ChapterStreamHandler {
    pub fn new(
        writer: Arc<WriterAgent>,
        quota: Arc<dyn QuotaManagerPort>,
        recorder: Arc<UsageRecorder>,
        events: Arc<EventPublisher>,
    ) -> Self {
        Self {
            writer,
            quota,
            recorder,
            events,
            reservation: ReservationPolicy::default(),
        }
    }

    pub fn with_reservation_policy(mut self, reservation: ReservationPolicy) -> Self {
        self.reservation = reservation;
        self
    }

    pub fn handle(&self, command: StreamChapterCommand) -> Result<ChapterStream, ApplicationError> {
        let StreamChapterCommand { user_id, assignment } = command;

        assignment.validate().map_err(ApplicationError::validation)?;
        let reservation_tokens = self
            .reservation
            .reserve(CallPlan::single(), payload_bytes(&assignment));
        let reservation = self.quota.check_quota(&user_id, reservation_tokens)?;

        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let task = StreamTask {
            user_id,
            assignment,
            reservation,
            writer: self.writer.clone(),
            recorder: self.recorder.clone(),
            publisher: self.events.clone(),
            events: tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run());

        Ok(ChapterStream {
            events: rx,
            guard: cancel.drop_guard(),
        })
    }
}

struct StreamTask {
    user_id: String,
    assignment: ChapterAssignment,
    reservation: QuotaReservation,
    writer: Arc<WriterAgent>,
    recorder: Arc<UsageRecorder>,
    publisher: Arc<EventPublisher>,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl StreamTask {
    async fn run(self) {
        let StreamTask {
            user_id,
            assignment,
            reservation,
            writer,
            recorder,
            publisher,
            events,
            cancel,
        } = self;
        let chapter_number = assignment.chapter.number;

        tracing::info!(user_id = %user_id, chapter = chapter_number, "Chapter stream started");

        let start = StreamEvent::Start {
            chapter_number,
            title: assignment.chapter.title.clone(),
        };
        if events.send(start).await.is_err() {
            cancel.cancel();
        }

        let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(32);
        let generation = writer.write_chapter_streaming(&assignment, chunk_tx, cancel.clone());
        tokio::pin!(generation);

        let result = loop {
            tokio::select! {
                result = &mut generation => break result,
                Some(text) = chunk_rx.recv() => {
                    if events.send(StreamEvent::Chunk { text }).await.is_err() {
                        cancel.cancel();
                    }
                }
            }
        };
        // 生成结束前已发出但尚未转发的片段
        while let Ok(text) = chunk_rx.try_recv() {
            if events.send(StreamEvent::Chunk { text }).await.is_err() {
                break;
            }
        }

        match result {
            Ok(output) => {
                let (record, _) = recorder.record(reservation, output.usage).await;
                let _ = events
                    .send(StreamEvent::Complete {
                        chapter_number,
                        content: output.value,
                    })
                    .await;
                publisher.publish_chapter_stream_finished(
                    &user_id,
                    chapter_number,
                    "completed",
                    record.amount,
                    None,
                );
                tracing::info!(
                    user_id = %user_id,
                    chapter = chapter_number,
                    tokens = record.amount,
                    "Chapter stream completed"
                );
            }
            Err(err) => {
                let tokens = match err.partial_usage().filter(|u| !u.is_zero()) {
                    Some(usage) => recorder.record(reservation, usage).await.0.amount,
                    None => {
                        drop(reservation);
                        0
                    }
                };
                let status = match err {
                    ModelError::Cancelled { .. } => "cancelled",
                    _ => "failed",
                };
                let _ = events
                    .send(StreamEvent::Error {
                        error: err.to_string(),
                    })
                    .await;
                publisher.publish_chapter_stream_finished(
                    &user_id,
                    chapter_number,
                    status,
                    tokens,
                    Some(err.to_string()),
                );
                tracing::warn!(
                    user_id = %user_id,
                    chapter = chapter_number,
                    status = %status,
                    tokens,
                    error = %err,
                    "Chapter stream ended early"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::handlers::usage_recorder::tests::{quota, MemoryLedger};
    use crate::application::commands::{EditPayload, EditorCriticPayload};
    use crate::application::ports::AgentRole;
    use crate::domain::outline::ChapterOutline;
    use crate::domain::review::LoopSettings;
    use crate::infrastructure::adapters::ScriptedModelClient;
    use crate::infrastructure::events::WsEvent;
    use crate::infrastructure::memory::InMemoryQuotaManager;
    use std::time::Duration;

    const LOW_SCORES: &str = r#"{"scores": {"clarity": 3, "coherence": 3, "engagement": 3, "style": 3, "structure": 3}, "feedback": "weak"}"#;

    struct Fixture {
        client: Arc<ScriptedModelClient>,
        quota: Arc<InMemoryQuotaManager>,
        ledger: Arc<MemoryLedger>,
        events: Arc<EventPublisher>,
        recorder: Arc<UsageRecorder>,
    }

    fn fixture(client: ScriptedModelClient, limit: u64) -> Fixture {
        let client = Arc::new(client);
        let quota = quota(limit);
        let ledger = Arc::new(MemoryLedger::default());
        let events = EventPublisher::new().arc();
        let recorder = Arc::new(UsageRecorder::new(
            quota.clone(),
            ledger.clone(),
            events.clone(),
            0.8,
        ));
        Fixture {
            client,
            quota,
            ledger,
            events,
            recorder,
        }
    }

    impl Fixture {
        fn generate_handler(&self) -> GenerateHandler {
            let dispatcher = Arc::new(PipelineDispatcher::new(
                self.client.clone(),
                LoopSettings::default(),
            ));
            GenerateHandler::new(
                dispatcher,
                self.quota.clone(),
                self.recorder.clone(),
                self.events.clone(),
            )
        }

        fn stream_handler(&self) -> ChapterStreamHandler {
            ChapterStreamHandler::new(
                Arc::new(WriterAgent::new(self.client.clone())),
                self.quota.clone(),
                self.recorder.clone(),
                self.events.clone(),
            )
        }
    }

    fn editor_critic(content: &str) -> GenerationRequest {
        GenerationRequest::EditorCritic(EditorCriticPayload {
            content: content.into(),
            chapter: None,
            feedback: None,
            use_feedback_loop: true,
            max_iterations: Some(2),
            pass_threshold: None,
        })
    }

    fn assignment() -> ChapterAssignment {
        let mut chapter = ChapterOutline::new("Arrival", "The stranger lands");
        chapter.number = 1;
        ChapterAssignment {
            book_type: "novel".into(),
            book_title: Some("Tides".into()),
            outline: None,
            chapter,
            previous_chapters: Vec::new(),
            style_notes: None,
        }
    }

    #[tokio::test]
    async fn test_generate_records_usage_after_success() {
        let fx = fixture(
            ScriptedModelClient::new()
                .with_default(AgentRole::Editor, "edited text")
                .with_default(AgentRole::Critic, LOW_SCORES),
            1_000_000,
        );
        let mut rx = fx.events.register_user("u1");

        let response = fx
            .generate_handler()
            .handle(GenerateCommand {
                user_id: "u1".into(),
                request: editor_critic("draft"),
            })
            .await
            .unwrap();

        let total = response.output.usage().total_tokens;
        assert!(total > 0);
        assert_eq!(response.usage_record.amount, total);
        assert_eq!(response.quota.used, total);
        assert_eq!(fx.ledger.records.lock().unwrap().len(), 1);

        assert!(matches!(rx.try_recv().unwrap(), WsEvent::GenerationCompleted { .. }));
        match rx.try_recv().unwrap() {
            WsEvent::EditorCriticFinished { iterations, passed, terminal_reason, .. } => {
                assert_eq!(iterations, 2);
                assert!(!passed);
                assert_eq!(terminal_reason.as_deref(), Some("maxIterationsReached"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_request_skips_quota_and_model() {
        let fx = fixture(ScriptedModelClient::new(), 0);

        let err = fx
            .generate_handler()
            .handle(GenerateCommand {
                user_id: "u1".into(),
                request: editor_critic("   "),
            })
            .await
            .unwrap_err();

        // limit 为 0，若先检查配额会返回 QuotaExceeded
        assert!(matches!(err, ApplicationError::ValidationError(_)));
        assert_eq!(fx.client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_quota_exceeded_before_model_call() {
        let fx = fixture(ScriptedModelClient::new().with_default(AgentRole::Editor, "x"), 0);

        let err = fx
            .generate_handler()
            .handle(GenerateCommand {
                user_id: "u1".into(),
                request: editor_critic("draft"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::QuotaExceeded(_)));
        assert_eq!(fx.client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_charges_nothing() {
        let fx = fixture(
            ScriptedModelClient::new()
                .with_error(AgentRole::Editor, ModelError::Provider("down".into())),
            1_000,
        );

        let err = fx
            .generate_handler()
            .handle(GenerateCommand {
                user_id: "u1".into(),
                request: editor_critic("draft"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::LoopAborted(_)));
        assert_eq!(fx.quota.get_usage_info("u1").used, 0);
        assert!(fx.ledger.records.lock().unwrap().is_empty());
        // 预留已释放，后续请求可以通过
        assert!(fx.quota.check_quota("u1", 10).is_ok());
    }

    #[tokio::test]
    async fn test_aborted_loop_charges_completed_calls() {
        let fx = fixture(
            ScriptedModelClient::new()
                .with_reply(AgentRole::Editor, "first edit")
                .with_error(AgentRole::Editor, ModelError::Timeout)
                .with_default(AgentRole::Critic, LOW_SCORES),
            1_000_000,
        );

        let err = fx
            .generate_handler()
            .handle(GenerateCommand {
                user_id: "u1".into(),
                request: editor_critic("draft"),
            })
            .await
            .unwrap_err();

        let charged = match &err {
            ApplicationError::LoopAborted(abort) => {
                assert_eq!(abort.history.len(), 1);
                abort.chargeable_usage().total_tokens
            }
            other => panic!("unexpected {:?}", other),
        };
        assert!(charged > 0);
        assert_eq!(fx.quota.get_usage_info("u1").used, charged);
    }

    #[tokio::test]
    async fn test_empty_edit_still_charges_prompt_tokens() {
        let fx = fixture(ScriptedModelClient::new().with_reply(AgentRole::Editor, ""), 1_000_000);

        let err = fx
            .generate_handler()
            .handle(GenerateCommand {
                user_id: "u1".into(),
                request: GenerationRequest::Edit(EditPayload {
                    content: "draft".into(),
                    feedback: None,
                    chapter: None,
                }),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::Model(ModelError::EmptyResponse { .. })));
        let used = fx.quota.get_usage_info("u1").used;
        assert!(used > 0);
        assert_eq!(fx.ledger.records.lock().unwrap()[0].amount, used);
    }

    #[tokio::test]
    async fn test_dropped_request_still_charges_completed_calls() {
        let fx = fixture(
            ScriptedModelClient::new()
                .with_default(AgentRole::Editor, "e".repeat(8_000))
                .with_default(AgentRole::Critic, LOW_SCORES)
                .with_reply_delay(AgentRole::Critic, Duration::from_millis(300)),
            1_000_000,
        );
        let handler = fx.generate_handler();

        // 客户端在编辑完成、评审未返回时断开
        let result = tokio::time::timeout(
            Duration::from_millis(50),
            handler.handle(GenerateCommand {
                user_id: "u1".into(),
                request: editor_critic("draft"),
            }),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(fx.client.calls(AgentRole::Editor), 1);

        let mut used = 0;
        for _ in 0..100 {
            used = fx.quota.get_usage_info("u1").used;
            if used > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(used >= 2_000, "used {}", used);
        assert_eq!(fx.ledger.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_content_equals_concatenated_chunks() {
        let text = "The harbour was quiet before dawn. Nobody expected the tide to turn.";
        let fx = fixture(
            ScriptedModelClient::new()
                .with_reply(AgentRole::Writer, text)
                .with_chunk_chars(7),
            1_000_000,
        );

        let mut stream = fx
            .stream_handler()
            .handle(StreamChapterCommand {
                user_id: "u1".into(),
                assignment: assignment(),
            })
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }

        assert_eq!(
            events.first(),
            Some(&StreamEvent::Start {
                chapter_number: 1,
                title: "Arrival".into()
            })
        );
        let chunks: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(events.iter().filter(|e| e.name() == "chunk").count() > 1);
        match events.last() {
            Some(StreamEvent::Complete { chapter_number, content }) => {
                assert_eq!(*chapter_number, 1);
                assert_eq!(content, &chunks);
                assert_eq!(content, text);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(fx.ledger.records.lock().unwrap().len(), 1);
        assert!(fx.quota.get_usage_info("u1").used > 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_generation() {
        let fx = fixture(
            ScriptedModelClient::new()
                .with_reply(AgentRole::Writer, "a".repeat(400))
                .with_chunk_chars(4)
                .with_chunk_delay(Duration::from_millis(20)),
            1_000_000,
        );
        let mut rx = fx.events.register_user("u1");

        let mut stream = fx
            .stream_handler()
            .handle(StreamChapterCommand {
                user_id: "u1".into(),
                assignment: assignment(),
            })
            .unwrap();
        assert_eq!(stream.next().await.map(|e| e.name()), Some("start"));
        drop(stream);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            WsEvent::ChapterStreamFinished { status, tokens, .. } => {
                assert_eq!(status, "cancelled");
                assert_eq!(tokens, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        // 没有部分用量报告时不记账
        assert_eq!(fx.quota.get_usage_info("u1").used, 0);
        assert!(fx.ledger.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_stream_charges_reported_partial_usage() {
        let fx = fixture(
            ScriptedModelClient::new()
                .with_reply(AgentRole::Writer, "a".repeat(400))
                .with_chunk_chars(4)
                .with_chunk_delay(Duration::from_millis(20))
                .with_partial_usage(true),
            1_000_000,
        );
        let mut rx = fx.events.register_user("u1");

        let mut stream = fx
            .stream_handler()
            .handle(StreamChapterCommand {
                user_id: "u1".into(),
                assignment: assignment(),
            })
            .unwrap();
        stream.next().await;
        stream.next().await;
        drop(stream);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let tokens = match event {
            WsEvent::ChapterStreamFinished { status, tokens, .. } => {
                assert_eq!(status, "cancelled");
                tokens
            }
            other => panic!("unexpected {:?}", other),
        };
        assert!(tokens > 0);
        assert_eq!(fx.quota.get_usage_info("u1").used, tokens);
        assert_eq!(fx.ledger.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_rejects_invalid_assignment() {
        let fx = fixture(ScriptedModelClient::new(), 1_000);
        let mut bad = assignment();
        bad.chapter.number = 0;

        let err = fx
            .stream_handler()
            .handle(StreamChapterCommand {
                user_id: "u1".into(),
                assignment: bad,
            })
            .err()
            .unwrap();
        assert!(matches!(err, ApplicationError::ValidationError(_)));
    }
}
