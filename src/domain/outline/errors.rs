//! Outline Context - Errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutlineError {
    #[error("Chapter not found: {0}")]
    ChapterNotFound(u32),

    #[error("Invalid chapter position {position} (chapters: {len})")]
    InvalidPosition { position: usize, len: usize },

    #[error("Invalid chapter numbering: {0}")]
    InvalidNumbering(String),

    #[error("Chapter title cannot be empty")]
    EmptyTitle,
}
