//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（ModelInvoker、QuotaManager、Repository、Clock）
//! - agents: 各阶段 Agent（调研、大纲、写作、编辑、评审）
//! - workflows: Editor/Critic 循环控制
//! - dispatcher: 按阶段派发
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod agents;
pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod ports;
pub mod queries;
pub mod workflows;

// Re-exports
pub use commands::{
    // Generation commands
    GenerateCommand,
    GenerateResponse,
    GenerationRequest,
    PhaseOutput,
    StreamChapterCommand,
    // Project commands
    CreateProject,
    DeleteProject,
    EditOutline,
    OutlineOperation,
    SaveChapter,
    SaveOutline,
    // Handlers
    handlers::{
        ChapterStream, ChapterStreamHandler, CreateProjectHandler, DeleteProjectHandler,
        EditOutlineHandler, GenerateHandler, SaveChapterHandler, SaveOutlineHandler, StreamEvent,
        UsageRecorder,
    },
};

pub use dispatcher::PipelineDispatcher;
pub use error::ApplicationError;

pub use ports::{
    // Clock
    Clock,
    ManualClock,
    SystemClock,
    // Model invoker
    AgentRole,
    ModelCompletion,
    ModelError,
    ModelInvokerPort,
    ModelRequest,
    TokenUsage,
    // Quota manager
    QuotaError,
    QuotaManagerPort,
    QuotaReservation,
    // Repositories
    ChapterRecord,
    ProjectRecord,
    ProjectRepositoryPort,
    RepositoryError,
    UsageLedgerPort,
    UsageTotal,
};

pub use queries::{
    GetProject,
    GetUsage,
    ListChapters,
    ListProjects,
    // Handlers
    handlers::{
        ChapterResponse, GetProjectHandler, GetUsageHandler, ListChaptersHandler,
        ListProjectsHandler, ProjectResponse,
    },
};
