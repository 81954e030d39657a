//! Editor/Critic 循环控制
//!
//! 两条独立路径:
//! - 迭代模式: Editor -> Critic 反复进行，直到综合分达到阈值或达到迭代上限
//! - 单次模式: Editor 与 Critic 各调用一次，不做阈值判断
//!
//! 任一调用失败时立即中止，返回错误和已完成的迭代历史，不回退到上一轮内容

use std::sync::Arc;

use serde::Serialize;

use crate::application::agents::{CriticAgent, EditorAgent};
use crate::application::ports::{ModelError, TokenUsage};
use crate::domain::outline::ChapterOutline;
use crate::domain::review::{
    CriticEvaluation, EditorCriticState, IterationRecord, LoopPhase, LoopSettings, TerminalReason,
};

/// 循环模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    SinglePass { pass_threshold: u8 },
    Iterative(LoopSettings),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopModeKind {
    SinglePass,
    Iterative,
}

/// 循环输入
#[derive(Debug, Clone)]
pub struct EditorCriticInput {
    pub content: String,
    pub chapter: Option<ChapterOutline>,
    /// 第一轮 Editor 使用的反馈（之后使用上一轮 Critic 的反馈）
    pub feedback: Option<String>,
}

/// 循环结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorCriticOutcome {
    pub mode: LoopModeKind,
    pub content: String,
    pub history: Vec<IterationRecord>,
    /// 单次模式为空
    pub terminal_reason: Option<TerminalReason>,
    pub iterations: u32,
    pub passed: bool,
    pub final_evaluation: CriticEvaluation,
    pub usage: TokenUsage,
}

/// 循环中止
#[derive(Debug, Clone)]
pub struct LoopAbort {
    pub cause: ModelError,
    /// 失败发生在第几轮
    pub iteration: u32,
    /// 失败前已完成的迭代
    pub history: Vec<IterationRecord>,
    /// 失败时的最新内容
    pub content: String,
    /// 失败前已成功调用所消耗的 token
    pub usage: TokenUsage,
}

impl LoopAbort {
    fn from_state(cause: ModelError, state: &EditorCriticState, usage: TokenUsage) -> Self {
        tracing::warn!(
            iteration = state.iteration(),
            completed = state.history().len(),
            error = %cause,
            "Editor-critic loop aborted"
        );
        Self {
            cause,
            iteration: state.iteration(),
            history: state.history().to_vec(),
            content: state.content().to_string(),
            usage,
        }
    }

    /// 中止时仍需记账的 token（含取消前服务端报告的部分用量）
    pub fn chargeable_usage(&self) -> TokenUsage {
        self.usage + self.cause.partial_usage().unwrap_or_default()
    }
}

/// Editor/Critic 循环控制器（无共享可变状态，可并发使用）
pub struct EditorCriticLoop {
    editor: Arc<EditorAgent>,
    critic: Arc<CriticAgent>,
}

impl EditorCriticLoop {
    pub fn new(editor: Arc<EditorAgent>, critic: Arc<CriticAgent>) -> Self {
        Self { editor, critic }
    }

    pub async fn run(
        &self,
        input: EditorCriticInput,
        mode: LoopMode,
    ) -> Result<EditorCriticOutcome, LoopAbort> {
        match mode {
            LoopMode::SinglePass { pass_threshold } => self.single_pass(input, pass_threshold).await,
            LoopMode::Iterative(settings) => self.iterate(input, settings).await,
        }
    }

    /// 迭代模式
    pub async fn iterate(
        &self,
        input: EditorCriticInput,
        settings: LoopSettings,
    ) -> Result<EditorCriticOutcome, LoopAbort> {
        let EditorCriticInput {
            content,
            chapter,
            feedback,
        } = input;
        let mut state = EditorCriticState::start(content, settings);
        let mut usage = TokenUsage::default();

        loop {
            // Editing
            let editor_feedback = state
                .last_feedback()
                .map(str::to_owned)
                .or_else(|| feedback.clone());
            let edited = self
                .editor
                .edit_chapter(state.content(), editor_feedback.as_deref(), chapter.as_ref())
                .await
                .map_err(|e| LoopAbort::from_state(e, &state, usage))?;
            usage += edited.usage;
            state.record_edit(edited.value);

            // Critiquing
            let evaluation = self
                .critic
                .evaluate(state.content(), chapter.as_ref(), settings.pass_threshold())
                .await
                .map_err(|e| LoopAbort::from_state(e, &state, usage))?;
            usage += evaluation.usage;

            let final_evaluation = evaluation.value.clone();
            let iteration = state.iteration();
            let phase = state.record_critique(evaluation.value, evaluation.fallback);

            tracing::info!(
                iteration = iteration,
                score = final_evaluation.overall_score(),
                threshold = settings.pass_threshold(),
                fallback = evaluation.fallback,
                "Editor-critic iteration finished"
            );

            if let LoopPhase::Converged(reason) = phase {
                let (content, history, _) = state.into_parts();
                tracing::info!(
                    iterations = iteration,
                    reason = ?reason,
                    tokens = usage.total_tokens,
                    "Editor-critic loop converged"
                );
                return Ok(EditorCriticOutcome {
                    mode: LoopModeKind::Iterative,
                    content,
                    history,
                    terminal_reason: Some(reason),
                    iterations: iteration,
                    passed: reason == TerminalReason::ThresholdMet,
                    final_evaluation,
                    usage,
                });
            }
        }
    }

    /// 单次模式：Editor 一次、Critic 一次，不论分数
    pub async fn single_pass(
        &self,
        input: EditorCriticInput,
        pass_threshold: u8,
    ) -> Result<EditorCriticOutcome, LoopAbort> {
        let abort = |cause: ModelError, content: &str, usage: TokenUsage| {
            tracing::warn!(error = %cause, "Single-pass edit aborted");
            LoopAbort {
                cause,
                iteration: 1,
                history: Vec::new(),
                content: content.to_string(),
                usage,
            }
        };

        let edited = self
            .editor
            .edit_chapter(&input.content, input.feedback.as_deref(), input.chapter.as_ref())
            .await
            .map_err(|e| abort(e, &input.content, TokenUsage::default()))?;
        let mut usage = edited.usage;

        let evaluation = self
            .critic
            .evaluate(&edited.value, input.chapter.as_ref(), pass_threshold)
            .await
            .map_err(|e| abort(e, &edited.value, usage))?;
        usage += evaluation.usage;

        let final_evaluation = evaluation.value;
        let record = IterationRecord {
            iteration: 1,
            edited_content: edited.value.clone(),
            evaluation_score: final_evaluation.overall_score(),
            feedback: final_evaluation.feedback().to_string(),
            evaluation: final_evaluation.clone(),
            fallback: evaluation.fallback,
        };

        tracing::info!(
            score = final_evaluation.overall_score(),
            passed = final_evaluation.passed(),
            "Single-pass edit finished"
        );

        Ok(EditorCriticOutcome {
            mode: LoopModeKind::SinglePass,
            content: edited.value,
            history: vec![record],
            terminal_reason: None,
            iterations: 1,
            passed: final_evaluation.passed(),
            final_evaluation,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{AgentRole, ModelInvokerPort};
    use crate::infrastructure::adapters::ScriptedModelClient;

    fn critique(score: u8) -> String {
        format!(
            r#"{{"scores": {{"clarity": {s}, "coherence": {s}, "engagement": {s}, "style": {s}, "structure": {s}}}, "feedback": "feedback {s}"}}"#,
            s = score
        )
    }

    fn controller(client: Arc<ScriptedModelClient>) -> EditorCriticLoop {
        let invoker: Arc<dyn ModelInvokerPort> = client;
        EditorCriticLoop::new(
            Arc::new(EditorAgent::new(invoker.clone())),
            Arc::new(CriticAgent::new(invoker)),
        )
    }

    fn input() -> EditorCriticInput {
        EditorCriticInput {
            content: "original draft".into(),
            chapter: None,
            feedback: None,
        }
    }

    #[tokio::test]
    async fn test_passes_on_first_iteration() {
        let client = Arc::new(
            ScriptedModelClient::new()
                .with_default(AgentRole::Editor, "edited")
                .with_reply(AgentRole::Critic, critique(9)),
        );
        let outcome = controller(client.clone())
            .iterate(input(), LoopSettings::default())
            .await
            .unwrap();

        assert_eq!(client.calls(AgentRole::Editor), 1);
        assert_eq!(client.calls(AgentRole::Critic), 1);
        assert_eq!(outcome.terminal_reason, Some(TerminalReason::ThresholdMet));
        assert!(outcome.passed);
        assert_eq!(outcome.content, "edited");
    }

    #[tokio::test]
    async fn test_always_failing_runs_max_iterations() {
        for max_iterations in 1..=5 {
            let client = Arc::new(
                ScriptedModelClient::new()
                    .with_default(AgentRole::Editor, "edited")
                    .with_default(AgentRole::Critic, critique(3)),
            );
            let settings = LoopSettings::new(max_iterations, 7).unwrap();
            let outcome = controller(client.clone()).iterate(input(), settings).await.unwrap();

            assert_eq!(client.calls(AgentRole::Editor), max_iterations as usize);
            assert_eq!(client.calls(AgentRole::Critic), max_iterations as usize);
            assert_eq!(outcome.iterations, max_iterations);
            assert_eq!(outcome.history.len(), max_iterations as usize);
            assert_eq!(outcome.terminal_reason, Some(TerminalReason::MaxIterationsReached));
            assert!(!outcome.passed);
        }
    }

    #[tokio::test]
    async fn test_single_pass_ignores_score() {
        for score in [2, 9] {
            let client = Arc::new(
                ScriptedModelClient::new()
                    .with_default(AgentRole::Editor, "edited once")
                    .with_default(AgentRole::Critic, critique(score)),
            );
            let outcome = controller(client.clone())
                .run(input(), LoopMode::SinglePass { pass_threshold: 7 })
                .await
                .unwrap();

            assert_eq!(client.calls(AgentRole::Editor), 1);
            assert_eq!(client.calls(AgentRole::Critic), 1);
            assert_eq!(outcome.mode, LoopModeKind::SinglePass);
            assert_eq!(outcome.terminal_reason, None);
            assert_eq!(outcome.passed, score >= 7);
        }
    }

    #[tokio::test]
    async fn test_critic_failure_aborts_with_partial_history() {
        let client = Arc::new(
            ScriptedModelClient::new()
                .with_default(AgentRole::Editor, "edited")
                .with_reply(AgentRole::Critic, critique(4))
                .with_error(AgentRole::Critic, ModelError::Provider("upstream 500".into())),
        );
        let abort = controller(client.clone())
            .iterate(input(), LoopSettings::default())
            .await
            .unwrap_err();

        assert_eq!(abort.cause, ModelError::Provider("upstream 500".into()));
        assert_eq!(abort.iteration, 2);
        assert_eq!(abort.history.len(), 1);
        assert_eq!(abort.history[0].evaluation_score, 4.0);
        assert_eq!(client.calls(AgentRole::Editor), 2);
        assert!(abort.usage.total_tokens > 0);
    }

    #[tokio::test]
    async fn test_editor_receives_critic_feedback() {
        let client = Arc::new(
            ScriptedModelClient::new()
                .with_default(AgentRole::Editor, "edited")
                .with_reply(AgentRole::Critic, critique(4))
                .with_reply(AgentRole::Critic, critique(8)),
        );
        let outcome = controller(client.clone())
            .iterate(input(), LoopSettings::default())
            .await
            .unwrap();

        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.history[0].feedback, "feedback 4");
        assert_eq!(outcome.final_evaluation.feedback(), "feedback 8");

        let editor_prompts = client.prompts(AgentRole::Editor);
        assert_eq!(editor_prompts.len(), 2);
        assert!(!editor_prompts[0].contains("feedback 4"));
        assert!(editor_prompts[1].contains("feedback 4"));
    }
}
