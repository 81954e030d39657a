//! Repository Ports - 出站端口
//!
//! 定义数据持久化的抽象接口
//! 具体实现在 infrastructure 层（如 SQLite）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::outline::BookOutline;
use crate::domain::quota::TokenUsageRecord;

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// ============================================================================
// Project Repository
// ============================================================================

/// 书籍项目（用于持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub book_type: String,
    pub description: String,
    pub outline: Option<BookOutline>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        book_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            book_type: book_type.into(),
            description: description.into(),
            outline: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 章节正文
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterRecord {
    pub project_id: Uuid,
    pub number: u32,
    pub title: String,
    pub content: String,
    pub word_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl ChapterRecord {
    pub fn new(project_id: Uuid, number: u32, title: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            project_id,
            number,
            title: title.into(),
            word_count: content.split_whitespace().count() as u32,
            content,
            updated_at: Utc::now(),
        }
    }
}

/// Project Repository Port
#[async_trait]
pub trait ProjectRepositoryPort: Send + Sync {
    /// 保存项目（存在则更新）
    async fn save(&self, project: &ProjectRecord) -> Result<(), RepositoryError>;

    /// 根据 ID 查找项目
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProjectRecord>, RepositoryError>;

    /// 获取用户的所有项目
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<ProjectRecord>, RepositoryError>;

    /// 删除项目及其章节
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// 保存大纲
    async fn save_outline(&self, id: Uuid, outline: &BookOutline) -> Result<(), RepositoryError>;

    /// 保存章节（同一项目同一编号覆盖）
    async fn save_chapter(&self, chapter: &ChapterRecord) -> Result<(), RepositoryError>;

    /// 获取项目的所有章节，按编号排序
    async fn find_chapters(&self, project_id: Uuid) -> Result<Vec<ChapterRecord>, RepositoryError>;
}

// ============================================================================
// Usage Ledger
// ============================================================================

/// 用户在某段时间内的用量汇总
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageTotal {
    pub user_id: String,
    pub total: u64,
    pub first_at: DateTime<Utc>,
}

/// Usage Ledger Port（只追加）
#[async_trait]
pub trait UsageLedgerPort: Send + Sync {
    /// 追加一条用量记录
    async fn append(&self, record: &TokenUsageRecord) -> Result<(), RepositoryError>;

    /// 按用户汇总 since 之后的用量
    async fn totals_since(&self, since: DateTime<Utc>) -> Result<Vec<UsageTotal>, RepositoryError>;
}
