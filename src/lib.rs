//! Bookforge - 多阶段 AI 书籍生成服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Outline: 大纲聚合（章节编号、小节 id）
//! - Review: 评审分数与 Editor/Critic 循环状态
//! - Quota: 配额周期与用量记录
//!
//! 应用层 (application/):
//! - Ports: 端口定义（ModelInvoker, QuotaManager, Repositories, Clock）
//! - Agents: 调研、大纲、写作、编辑、评审
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + SSE + WebSocket
//! - Memory: 配额管理器内存实现
//! - Persistence: SQLite 项目与用量账本
//! - Adapters: OpenAI 兼容模型客户端、脚本化模型客户端
//! - Events: WebSocket 事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
