//! Review Context - 评审结果

use serde::{Deserialize, Serialize};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// 五个质量维度的分数（1..=10）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityScores {
    pub clarity: u8,
    pub coherence: u8,
    pub engagement: u8,
    pub style: u8,
    pub structure: u8,
}

impl QualityScores {
    /// 所有维度同一分数
    pub fn uniform(score: u8) -> Self {
        Self {
            clarity: score,
            coherence: score,
            engagement: score,
            style: score,
            structure: score,
        }
        .clamped()
    }

    /// 从模型给出的任意数值构造，四舍五入并截断到 1..=10
    pub fn from_raw(clarity: f64, coherence: f64, engagement: f64, style: f64, structure: f64) -> Self {
        Self {
            clarity: clamp_score(clarity),
            coherence: clamp_score(coherence),
            engagement: clamp_score(engagement),
            style: clamp_score(style),
            structure: clamp_score(structure),
        }
    }

    pub fn clamped(self) -> Self {
        Self::from_raw(
            self.clarity as f64,
            self.coherence as f64,
            self.engagement as f64,
            self.style as f64,
            self.structure as f64,
        )
    }

    /// 综合分（算术平均）
    pub fn aggregate(&self) -> f32 {
        let sum = self.clarity as u32
            + self.coherence as u32
            + self.engagement as u32
            + self.style as u32
            + self.structure as u32;
        sum as f32 / 5.0
    }
}

fn clamp_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return MIN_SCORE;
    }
    raw.round().clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8
}

/// Critic 评审结果
///
/// 派生值：综合分与是否通过都由分数和阈值计算得出，构造后不可修改
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticEvaluation {
    scores: QualityScores,
    overall_score: f32,
    pass_threshold: u8,
    passed: bool,
    feedback: String,
}

impl CriticEvaluation {
    pub fn new(scores: QualityScores, feedback: impl Into<String>, pass_threshold: u8) -> Self {
        let scores = scores.clamped();
        let overall_score = scores.aggregate();
        Self {
            scores,
            overall_score,
            pass_threshold,
            passed: overall_score >= pass_threshold as f32,
            feedback: feedback.into(),
        }
    }

    pub fn scores(&self) -> &QualityScores {
        &self.scores
    }

    pub fn overall_score(&self) -> f32 {
        self.overall_score
    }

    pub fn pass_threshold(&self) -> u8 {
        self.pass_threshold
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }
}
