//! Stage Agents - 写作流水线各阶段
//!
//! 每个 Agent = 固定角色 + 提示词模板 + （结构化 Agent）响应解析。
//! 结构化 Agent 在模型输出无法解析或为空时返回各自的默认值，
//! 非结构化 Agent 的空响应作为错误返回给调用方。
//! Agent 不持有可变状态，可并发调用

mod briefs;
mod critic;
mod editor;
mod outliner;
pub mod prompts;
mod research;
mod writer;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use briefs::{BookBrief, ChapterAssignment, ResearchAnswer, ResearchQuestion};
pub use critic::{CriticAgent, FALLBACK_FEEDBACK, FALLBACK_SCORE};
pub use editor::EditorAgent;
pub use outliner::OutlinerAgent;
pub use research::ResearchAgent;
pub use writer::WriterAgent;

use crate::application::ports::{ModelError, ModelInvokerPort, ModelRequest, TokenUsage};
use crate::domain::{parse_fail_soft, ParseOutcome};

/// Agent 调用结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutput<T> {
    pub value: T,
    pub usage: TokenUsage,
    /// 结构化输出无法解析，value 为默认值
    pub fallback: bool,
}

impl<T> AgentOutput<T> {
    pub fn new(value: T, usage: TokenUsage) -> Self {
        Self {
            value,
            usage,
            fallback: false,
        }
    }

    fn from_outcome(outcome: ParseOutcome<T>, usage: TokenUsage) -> Self {
        let fallback = outcome.is_fallback();
        Self {
            value: outcome.into_inner(),
            usage,
            fallback,
        }
    }
}

/// 调用模型并解析结构化输出
///
/// 空响应视为无法解析；其他模型错误原样返回
async fn invoke_structured<T, F>(
    invoker: &dyn ModelInvokerPort,
    request: ModelRequest,
    fallback: F,
) -> Result<(ParseOutcome<T>, TokenUsage), ModelError>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let role = request.role;
    match invoker.invoke(request).await {
        Ok(completion) => {
            let outcome = parse_fail_soft(&completion.text, fallback);
            if outcome.is_fallback() {
                tracing::warn!(role = %role, "Unparseable structured output, using fallback");
            }
            Ok((outcome, completion.usage))
        }
        Err(ModelError::EmptyResponse { usage }) => {
            tracing::warn!(role = %role, tokens = usage.total_tokens, "Empty structured output, using fallback");
            Ok((ParseOutcome::Fallback(fallback()), usage))
        }
        Err(e) => Err(e),
    }
}

/// 调用模型获取自由文本
async fn invoke_text(
    invoker: &dyn ModelInvokerPort,
    request: ModelRequest,
) -> Result<AgentOutput<String>, ModelError> {
    let completion = invoker.invoke(request).await?;
    if completion.text.trim().is_empty() {
        return Err(ModelError::EmptyResponse {
            usage: completion.usage,
        });
    }
    Ok(AgentOutput::new(completion.text, completion.usage))
}
