//! Generation Commands - 生成相关命令
//!
//! 外部请求以 `phase` 字段区分阶段，其余字段为该阶段的参数

use serde::{Deserialize, Serialize};

use crate::application::agents::{
    AgentOutput, BookBrief, ChapterAssignment, ResearchAnswer, ResearchQuestion,
};
use crate::application::ports::TokenUsage;
use crate::application::workflows::EditorCriticOutcome;
use crate::domain::outline::{BookOutline, ChapterOutline, TocEntry};
use crate::domain::quota::{TokenUsageRecord, UsageInfo};
use crate::domain::review::CriticEvaluation;

/// 生成请求（派发后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum GenerationRequest {
    Research(BookBrief),
    ResearchBrief(ResearchBriefPayload),
    Outline(OutlinePayload),
    Refine(RefinePayload),
    Toc(TocPayload),
    Write(ChapterAssignment),
    Edit(EditPayload),
    Critic(CriticPayload),
    EditorCritic(EditorCriticPayload),
    InlineEdit(InlineEditPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchBriefPayload {
    #[serde(flatten)]
    pub brief: BookBrief,
    pub answers: Vec<ResearchAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlinePayload {
    #[serde(flatten)]
    pub brief: BookBrief,
    #[serde(default)]
    pub research: Option<String>,
    #[serde(default)]
    pub chapter_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinePayload {
    pub outline: BookOutline,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocPayload {
    pub outline: BookOutline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPayload {
    pub content: String,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub chapter: Option<ChapterOutline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticPayload {
    pub content: String,
    #[serde(default)]
    pub chapter: Option<ChapterOutline>,
    #[serde(default)]
    pub pass_threshold: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorCriticPayload {
    pub content: String,
    #[serde(default)]
    pub chapter: Option<ChapterOutline>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default = "default_use_feedback_loop")]
    pub use_feedback_loop: bool,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    #[serde(default)]
    pub pass_threshold: Option<u8>,
}

fn default_use_feedback_loop() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineEditPayload {
    pub selection: String,
    pub instruction: String,
    #[serde(default)]
    pub context: Option<String>,
}

fn require(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} must not be empty", field))
    } else {
        Ok(())
    }
}

/// 请求负载序列化后的字节数（提示词大小的上界）
pub fn payload_bytes<T: Serialize>(payload: &T) -> usize {
    serde_json::to_vec(payload).map_or(0, |bytes| bytes.len())
}

impl GenerationRequest {
    /// 阶段名（与请求中的 phase 字段一致）
    pub fn phase(&self) -> &'static str {
        match self {
            GenerationRequest::Research(_) => "research",
            GenerationRequest::ResearchBrief(_) => "research-brief",
            GenerationRequest::Outline(_) => "outline",
            GenerationRequest::Refine(_) => "refine",
            GenerationRequest::Toc(_) => "toc",
            GenerationRequest::Write(_) => "write",
            GenerationRequest::Edit(_) => "edit",
            GenerationRequest::Critic(_) => "critic",
            GenerationRequest::EditorCritic(_) => "editor-critic",
            GenerationRequest::InlineEdit(_) => "inline-edit",
        }
    }

    /// 字段级校验（不含循环参数，循环参数由派发器按默认值合并后校验）
    pub fn validate(&self) -> Result<(), String> {
        match self {
            GenerationRequest::Research(brief) => brief.validate(),
            GenerationRequest::ResearchBrief(p) => {
                p.brief.validate()?;
                if p.answers.is_empty() {
                    return Err("answers must not be empty".into());
                }
                Ok(())
            }
            GenerationRequest::Outline(p) => {
                p.brief.validate()?;
                if p.chapter_count == Some(0) {
                    return Err("chapterCount must be positive".into());
                }
                Ok(())
            }
            GenerationRequest::Refine(p) => {
                p.outline.validate().map_err(|e| e.to_string())?;
                require(&p.feedback, "feedback")
            }
            GenerationRequest::Toc(p) => p.outline.validate().map_err(|e| e.to_string()),
            GenerationRequest::Write(assignment) => assignment.validate(),
            GenerationRequest::Edit(p) => require(&p.content, "content"),
            GenerationRequest::Critic(p) => require(&p.content, "content"),
            GenerationRequest::EditorCritic(p) => require(&p.content, "content"),
            GenerationRequest::InlineEdit(p) => {
                require(&p.selection, "selection")?;
                require(&p.instruction, "instruction")
            }
        }
    }
}

/// 各阶段的输出
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PhaseOutput {
    Questions(AgentOutput<Vec<ResearchQuestion>>),
    Text(AgentOutput<String>),
    Outline(AgentOutput<BookOutline>),
    Toc(AgentOutput<Vec<TocEntry>>),
    Evaluation(AgentOutput<CriticEvaluation>),
    EditorCritic(EditorCriticOutcome),
}

impl PhaseOutput {
    pub fn usage(&self) -> TokenUsage {
        match self {
            PhaseOutput::Questions(o) => o.usage,
            PhaseOutput::Text(o) => o.usage,
            PhaseOutput::Outline(o) => o.usage,
            PhaseOutput::Toc(o) => o.usage,
            PhaseOutput::Evaluation(o) => o.usage,
            PhaseOutput::EditorCritic(o) => o.usage,
        }
    }
}

/// 生成命令
#[derive(Debug, Clone)]
pub struct GenerateCommand {
    pub user_id: String,
    pub request: GenerationRequest,
}

/// 生成响应
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub phase: &'static str,
    pub output: PhaseOutput,
    pub usage_record: TokenUsageRecord,
    pub quota: UsageInfo,
}

/// 流式写作命令
#[derive(Debug, Clone)]
pub struct StreamChapterCommand {
    pub user_id: String,
    pub assignment: ChapterAssignment,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_editor_critic_defaults() {
        let request: GenerationRequest = serde_json::from_value(json!({
            "phase": "editor-critic",
            "content": "draft"
        }))
        .unwrap();

        match &request {
            GenerationRequest::EditorCritic(p) => {
                assert!(p.use_feedback_loop);
                assert_eq!(p.max_iterations, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(request.phase(), "editor-critic");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_parse_outline_with_flattened_brief() {
        let request: GenerationRequest = serde_json::from_value(json!({
            "phase": "outline",
            "bookType": "novel",
            "title": "Tides",
            "description": "A harbour town",
            "chapterCount": 5
        }))
        .unwrap();

        match request {
            GenerationRequest::Outline(p) => {
                assert_eq!(p.brief.title, "Tides");
                assert_eq!(p.chapter_count, Some(5));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_missing_fields() {
        let request: GenerationRequest = serde_json::from_value(json!({
            "phase": "research",
            "bookType": "novel",
            "title": "  "
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let unknown = serde_json::from_value::<GenerationRequest>(json!({"phase": "publish"}));
        assert!(unknown.is_err());
    }
}
