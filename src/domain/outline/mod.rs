//! Outline Context - 书籍大纲限界上下文
//!
//! 职责:
//! - 大纲聚合（章节顺序与编号）
//! - 章节/小节实体
//! - 插入、删除、移动章节后的重新编号

mod aggregate;
mod entities;
mod errors;

pub use aggregate::BookOutline;
pub use entities::{ChapterOutline, ChapterPatch, ChapterSummary, SectionOutline, TocEntry};
pub use errors::OutlineError;
