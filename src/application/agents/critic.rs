//! Critic Agent - 章节评审打分

use std::sync::Arc;

use serde::Deserialize;

use super::{invoke_structured, prompts, AgentOutput};
use crate::application::ports::{AgentRole, ModelError, ModelInvokerPort, ModelRequest};
use crate::domain::outline::ChapterOutline;
use crate::domain::review::{CriticEvaluation, QualityScores};

const TEMPERATURE: f32 = 0.3;

/// 无法解析时每个维度的默认分
pub const FALLBACK_SCORE: u8 = 5;
pub const FALLBACK_FEEDBACK: &str =
    "The critique could not be read. Review the chapter for clarity, pacing and consistency.";

/// 模型给出的原始分数，允许小数与越界值
#[derive(Debug, Deserialize)]
struct RawScores {
    clarity: f64,
    coherence: f64,
    engagement: f64,
    style: f64,
    structure: f64,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    scores: RawScores,
    #[serde(default)]
    feedback: String,
}

impl RawEvaluation {
    fn fallback() -> Self {
        let score = FALLBACK_SCORE as f64;
        Self {
            scores: RawScores {
                clarity: score,
                coherence: score,
                engagement: score,
                style: score,
                structure: score,
            },
            feedback: FALLBACK_FEEDBACK.to_string(),
        }
    }

    fn into_evaluation(self, pass_threshold: u8) -> CriticEvaluation {
        let s = self.scores;
        let scores = QualityScores::from_raw(s.clarity, s.coherence, s.engagement, s.style, s.structure);
        CriticEvaluation::new(scores, self.feedback, pass_threshold)
    }
}

pub struct CriticAgent {
    invoker: Arc<dyn ModelInvokerPort>,
}

impl CriticAgent {
    pub fn new(invoker: Arc<dyn ModelInvokerPort>) -> Self {
        Self { invoker }
    }

    /// 评审章节（结构化），分数截断到 1..=10
    pub async fn evaluate(
        &self,
        content: &str,
        chapter: Option<&ChapterOutline>,
        pass_threshold: u8,
    ) -> Result<AgentOutput<CriticEvaluation>, ModelError> {
        let request = ModelRequest::new(
            AgentRole::Critic,
            prompts::CRITIC_SYSTEM,
            prompts::evaluate(content, chapter),
            TEMPERATURE,
        );

        let (outcome, usage) =
            invoke_structured(self.invoker.as_ref(), request, RawEvaluation::fallback).await?;
        let outcome = outcome.map(|raw| raw.into_evaluation(pass_threshold));

        tracing::debug!(
            score = outcome.value().overall_score(),
            passed = outcome.value().passed(),
            fallback = outcome.is_fallback(),
            "Chapter evaluated"
        );
        Ok(AgentOutput::from_outcome(outcome, usage))
    }

    /// 无法解析时的默认评审
    pub fn fallback_evaluation(pass_threshold: u8) -> CriticEvaluation {
        RawEvaluation::fallback().into_evaluation(pass_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::ScriptedModelClient;

    #[tokio::test]
    async fn test_scores_are_clamped() {
        let reply = r#"{"scores": {"clarity": 12, "coherence": 0, "engagement": 7.6, "style": 9, "structure": 6}, "feedback": "Tighten act two"}"#;
        let client = Arc::new(ScriptedModelClient::new().with_reply(AgentRole::Critic, reply));
        let agent = CriticAgent::new(client);

        let output = agent.evaluate("text", None, 7).await.unwrap();
        assert!(!output.fallback);
        let scores = output.value.scores();
        assert_eq!(scores.clarity, 10);
        assert_eq!(scores.coherence, 1);
        assert_eq!(scores.engagement, 8);
        assert_eq!(output.value.overall_score(), 6.8);
        assert!(!output.value.passed());
        assert_eq!(output.value.feedback(), "Tighten act two");
    }

    #[tokio::test]
    async fn test_malformed_output_returns_fallback_evaluation() {
        let client = Arc::new(
            ScriptedModelClient::new().with_reply(AgentRole::Critic, "Great chapter, 9/10!"),
        );
        let agent = CriticAgent::new(client);

        let output = agent.evaluate("text", None, 7).await.unwrap();
        assert!(output.fallback);
        assert_eq!(output.value, CriticAgent::fallback_evaluation(7));
        assert_eq!(*output.value.scores(), QualityScores::uniform(FALLBACK_SCORE));
        assert_eq!(output.value.feedback(), FALLBACK_FEEDBACK);
    }
}
