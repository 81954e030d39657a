//! Agent 输入类型

use serde::{Deserialize, Serialize};

use crate::domain::outline::{BookOutline, ChapterOutline, ChapterSummary};

/// 书籍概要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookBrief {
    pub book_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_audience: Option<String>,
}

impl BookBrief {
    pub fn validate(&self) -> Result<(), String> {
        if self.book_type.trim().is_empty() {
            return Err("bookType must not be empty".into());
        }
        if self.title.trim().is_empty() {
            return Err("title must not be empty".into());
        }
        Ok(())
    }
}

/// 调研问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchQuestion {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub purpose: String,
}

/// 调研问题的回答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchAnswer {
    pub question: String,
    pub answer: String,
}

/// 章节写作任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAssignment {
    pub book_type: String,
    #[serde(default)]
    pub book_title: Option<String>,
    #[serde(default)]
    pub outline: Option<BookOutline>,
    pub chapter: ChapterOutline,
    /// 已完成章节的摘要（保持上下文连贯）
    #[serde(default)]
    pub previous_chapters: Vec<ChapterSummary>,
    #[serde(default)]
    pub style_notes: Option<String>,
}

impl ChapterAssignment {
    pub fn validate(&self) -> Result<(), String> {
        if self.book_type.trim().is_empty() {
            return Err("bookType must not be empty".into());
        }
        if self.chapter.title.trim().is_empty() {
            return Err("chapter.title must not be empty".into());
        }
        if self.chapter.number == 0 {
            return Err("chapter.number must be positive".into());
        }
        Ok(())
    }
}
