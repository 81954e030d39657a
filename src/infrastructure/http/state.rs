//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    ChapterStreamHandler, CreateProjectHandler, DeleteProjectHandler, EditOutlineHandler,
    GenerateHandler, SaveChapterHandler, SaveOutlineHandler, UsageRecorder,
    // Query handlers
    GetProjectHandler, GetUsageHandler, ListChaptersHandler, ListProjectsHandler,
    // Ports
    ModelInvokerPort, PipelineDispatcher, ProjectRepositoryPort, QuotaManagerPort,
    UsageLedgerPort,
};
use crate::domain::quota::ReservationPolicy;
use crate::domain::review::LoopSettings;
use crate::infrastructure::events::EventPublisher;

/// 生成流程的运行参数
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// 模型名（仅用于展示）
    pub model_name: String,
    /// Editor/Critic 循环默认参数
    pub loop_defaults: LoopSettings,
    /// 配额预警比例
    pub warning_ratio: f64,
    /// 请求预留量估算参数
    pub reservation: ReservationPolicy,
}

/// 应用状态
pub struct AppState {
    pub event_publisher: Arc<EventPublisher>,
    pub model_name: String,

    // ========== Command Handlers ==========
    pub generate_handler: GenerateHandler,
    pub chapter_stream_handler: ChapterStreamHandler,
    pub edit_outline_handler: EditOutlineHandler,
    pub create_project_handler: CreateProjectHandler,
    pub delete_project_handler: DeleteProjectHandler,
    pub save_outline_handler: SaveOutlineHandler,
    pub save_chapter_handler: SaveChapterHandler,

    // ========== Query Handlers ==========
    pub get_project_handler: GetProjectHandler,
    pub list_projects_handler: ListProjectsHandler,
    pub list_chapters_handler: ListChaptersHandler,
    pub get_usage_handler: GetUsageHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        invoker: Arc<dyn ModelInvokerPort>,
        quota: Arc<dyn QuotaManagerPort>,
        project_repo: Arc<dyn ProjectRepositoryPort>,
        ledger: Arc<dyn UsageLedgerPort>,
        event_publisher: Arc<EventPublisher>,
        settings: PipelineSettings,
    ) -> Self {
        let dispatcher = Arc::new(
            PipelineDispatcher::new(invoker, settings.loop_defaults)
                .with_reservation_policy(settings.reservation),
        );
        let recorder = Arc::new(UsageRecorder::new(
            quota.clone(),
            ledger,
            event_publisher.clone(),
            settings.warning_ratio,
        ));

        Self {
            event_publisher: event_publisher.clone(),
            model_name: settings.model_name,

            // Command handlers
            chapter_stream_handler: ChapterStreamHandler::new(
                dispatcher.writer(),
                quota.clone(),
                recorder.clone(),
                event_publisher.clone(),
            )
            .with_reservation_policy(settings.reservation),
            generate_handler: GenerateHandler::new(
                dispatcher,
                quota.clone(),
                recorder,
                event_publisher,
            ),
            edit_outline_handler: EditOutlineHandler::new(),
            create_project_handler: CreateProjectHandler::new(project_repo.clone()),
            delete_project_handler: DeleteProjectHandler::new(project_repo.clone()),
            save_outline_handler: SaveOutlineHandler::new(project_repo.clone()),
            save_chapter_handler: SaveChapterHandler::new(project_repo.clone()),

            // Query handlers
            get_project_handler: GetProjectHandler::new(project_repo.clone()),
            list_projects_handler: ListProjectsHandler::new(project_repo.clone()),
            list_chapters_handler: ListChaptersHandler::new(project_repo),
            get_usage_handler: GetUsageHandler::new(quota),
        }
    }
}
