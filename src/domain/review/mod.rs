//! Review Context - 章节评审
//!
//! 职责:
//! - 评审打分（五个质量维度）
//! - Editor/Critic 迭代状态机

mod evaluation;
mod state;

pub use evaluation::{CriticEvaluation, QualityScores, MAX_SCORE, MIN_SCORE};
pub use state::{
    EditorCriticState, IterationRecord, LoopPhase, LoopSettings, LoopSettingsError,
    TerminalReason, DEFAULT_MAX_ITERATIONS, DEFAULT_PASS_THRESHOLD, MAX_ITERATIONS_CAP,
};
