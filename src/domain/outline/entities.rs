//! Outline Context - Entities

use serde::{Deserialize, Serialize};

/// 小节
///
/// 不变量:
/// - id 形如 `"<chapter>.<section>"`，由所属大纲在重新编号时生成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionOutline {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub estimated_word_count: u32,
}

/// 章节大纲
///
/// 不变量:
/// - number 在 BookOutline 内唯一且连续（1..=n）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterOutline {
    #[serde(default)]
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub sections: Vec<SectionOutline>,
}

impl ChapterOutline {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            number: 0,
            title: title.into(),
            summary: summary.into(),
            key_points: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// 预估字数（各小节之和）
    pub fn estimated_word_count(&self) -> u32 {
        self.sections.iter().map(|s| s.estimated_word_count).sum()
    }
}

/// 章节局部更新
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub sections: Option<Vec<SectionOutline>>,
}

/// 已完成章节的摘要（供写作时保持上下文连贯）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummary {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

/// 目录条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub sections: Vec<String>,
}
