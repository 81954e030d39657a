//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod clock;
mod model_invoker;
mod quota_manager;
mod repositories;

pub use clock::{Clock, ManualClock, SystemClock};
pub use model_invoker::{
    AgentRole, ModelCompletion, ModelError, ModelInvokerPort, ModelRequest, TokenUsage,
};
pub use quota_manager::{QuotaError, QuotaManagerPort, QuotaReservation};
pub use repositories::{
    ChapterRecord, ProjectRecord, ProjectRepositoryPort, RepositoryError, UsageLedgerPort,
    UsageTotal,
};
