//! Review Context - Editor/Critic 迭代状态机
//!
//! 状态:
//! - Editing: 等待 Editor 返回修改稿
//! - Critiquing: 等待 Critic 打分
//! - Converged(ThresholdMet): 综合分达到阈值
//! - Converged(MaxIterationsReached): 达到迭代上限仍未通过
//!
//! 状态只在内存中存在，循环结束返回给调用方后即丢弃

use serde::Serialize;
use thiserror::Error;

use super::{CriticEvaluation, MAX_SCORE, MIN_SCORE};

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
pub const DEFAULT_PASS_THRESHOLD: u8 = 7;
/// 单次请求允许的最大迭代次数
pub const MAX_ITERATIONS_CAP: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoopSettingsError {
    #[error("max_iterations must be between 1 and {MAX_ITERATIONS_CAP}, got {0}")]
    MaxIterations(u32),

    #[error("pass_threshold must be between {MIN_SCORE} and {MAX_SCORE}, got {0}")]
    PassThreshold(u8),
}

/// 迭代参数（每次调用可覆盖）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopSettings {
    max_iterations: u32,
    pass_threshold: u8,
}

impl LoopSettings {
    pub fn new(max_iterations: u32, pass_threshold: u8) -> Result<Self, LoopSettingsError> {
        if max_iterations == 0 || max_iterations > MAX_ITERATIONS_CAP {
            return Err(LoopSettingsError::MaxIterations(max_iterations));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&pass_threshold) {
            return Err(LoopSettingsError::PassThreshold(pass_threshold));
        }
        Ok(Self {
            max_iterations,
            pass_threshold,
        })
    }

    /// 用请求中的可选值覆盖默认值
    pub fn with_overrides(
        self,
        max_iterations: Option<u32>,
        pass_threshold: Option<u8>,
    ) -> Result<Self, LoopSettingsError> {
        Self::new(
            max_iterations.unwrap_or(self.max_iterations),
            pass_threshold.unwrap_or(self.pass_threshold),
        )
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn pass_threshold(&self) -> u8 {
        self.pass_threshold
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }
}

/// 终止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminalReason {
    ThresholdMet,
    MaxIterationsReached,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::ThresholdMet => "thresholdMet",
            TerminalReason::MaxIterationsReached => "maxIterationsReached",
        }
    }
}

/// 循环阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Editing,
    Critiquing,
    Converged(TerminalReason),
}

/// 单轮迭代记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationRecord {
    pub iteration: u32,
    pub edited_content: String,
    pub evaluation_score: f32,
    pub feedback: String,
    pub evaluation: CriticEvaluation,
    /// Critic 输出无法解析、使用了默认评审
    pub fallback: bool,
}

/// Editor/Critic 循环状态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorCriticState {
    content: String,
    iteration: u32,
    history: Vec<IterationRecord>,
    #[serde(skip)]
    phase: LoopPhase,
    terminal_reason: Option<TerminalReason>,
    #[serde(skip)]
    settings: LoopSettings,
}

impl EditorCriticState {
    /// 以调用方提供的正文开始，初始状态为 Editing
    pub fn start(content: impl Into<String>, settings: LoopSettings) -> Self {
        Self {
            content: content.into(),
            iteration: 1,
            history: Vec::new(),
            phase: LoopPhase::Editing,
            terminal_reason: None,
            settings,
        }
    }

    /// Editing -> Critiquing（无条件）
    pub fn record_edit(&mut self, edited_content: String) -> LoopPhase {
        debug_assert_eq!(self.phase, LoopPhase::Editing);
        self.content = edited_content;
        self.phase = LoopPhase::Critiquing;
        self.phase
    }

    /// Critiquing -> Editing | Converged
    pub fn record_critique(&mut self, evaluation: CriticEvaluation, fallback: bool) -> LoopPhase {
        debug_assert_eq!(self.phase, LoopPhase::Critiquing);

        let score = evaluation.overall_score();
        self.history.push(IterationRecord {
            iteration: self.iteration,
            edited_content: self.content.clone(),
            evaluation_score: score,
            feedback: evaluation.feedback().to_string(),
            evaluation,
            fallback,
        });

        self.phase = if score >= self.settings.pass_threshold() as f32 {
            LoopPhase::Converged(TerminalReason::ThresholdMet)
        } else if self.iteration >= self.settings.max_iterations() {
            LoopPhase::Converged(TerminalReason::MaxIterationsReached)
        } else {
            self.iteration += 1;
            LoopPhase::Editing
        };

        if let LoopPhase::Converged(reason) = self.phase {
            self.terminal_reason = Some(reason);
        }
        self.phase
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.terminal_reason
    }

    pub fn settings(&self) -> LoopSettings {
        self.settings
    }

    /// 上一轮 Critic 的反馈（供下一轮 Editor 使用）
    pub fn last_feedback(&self) -> Option<&str> {
        self.history.last().map(|r| r.feedback.as_str())
    }

    pub fn into_parts(self) -> (String, Vec<IterationRecord>, Option<TerminalReason>) {
        (self.content, self.history, self.terminal_reason)
    }
}
