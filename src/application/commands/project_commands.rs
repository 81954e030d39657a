//! Project Commands - 书籍项目、大纲与章节的写操作

use serde::Deserialize;
use uuid::Uuid;

use crate::domain::outline::{BookOutline, ChapterOutline, ChapterPatch};

/// 创建项目命令
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub user_id: String,
    pub title: String,
    pub book_type: String,
    pub description: String,
}

/// 删除项目命令
#[derive(Debug, Clone)]
pub struct DeleteProject {
    pub user_id: String,
    pub project_id: Uuid,
}

/// 保存项目大纲命令
#[derive(Debug, Clone)]
pub struct SaveOutline {
    pub user_id: String,
    pub project_id: Uuid,
    pub outline: BookOutline,
}

/// 保存章节正文命令
#[derive(Debug, Clone)]
pub struct SaveChapter {
    pub user_id: String,
    pub project_id: Uuid,
    pub number: u32,
    pub title: String,
    pub content: String,
}

/// 大纲编辑操作
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum OutlineOperation {
    /// 在 position（1-based）处插入章节
    Insert {
        position: usize,
        chapter: ChapterOutline,
    },
    Remove {
        number: u32,
    },
    Move {
        from: u32,
        to: u32,
    },
    Update {
        number: u32,
        patch: ChapterPatch,
    },
    Renumber,
}

impl OutlineOperation {
    pub fn name(&self) -> &'static str {
        match self {
            OutlineOperation::Insert { .. } => "insert",
            OutlineOperation::Remove { .. } => "remove",
            OutlineOperation::Move { .. } => "move",
            OutlineOperation::Update { .. } => "update",
            OutlineOperation::Renumber => "renumber",
        }
    }
}

/// 编辑大纲命令（不涉及模型调用，不消耗配额）
#[derive(Debug, Clone)]
pub struct EditOutline {
    pub outline: BookOutline,
    pub operation: OutlineOperation,
}
