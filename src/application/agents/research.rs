//! Research Agent - 调研问题与调研简报

use std::sync::Arc;

use serde::Deserialize;

use super::{invoke_structured, invoke_text, prompts, AgentOutput, BookBrief, ResearchAnswer, ResearchQuestion};
use crate::application::ports::{AgentRole, ModelError, ModelInvokerPort, ModelRequest};
use crate::domain::ParseOutcome;

const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    questions: Vec<ResearchQuestion>,
}

pub struct ResearchAgent {
    invoker: Arc<dyn ModelInvokerPort>,
}

impl ResearchAgent {
    pub fn new(invoker: Arc<dyn ModelInvokerPort>) -> Self {
        Self { invoker }
    }

    /// 生成调研问题（结构化）
    pub async fn generate_questions(
        &self,
        brief: &BookBrief,
    ) -> Result<AgentOutput<Vec<ResearchQuestion>>, ModelError> {
        let request = ModelRequest::new(
            AgentRole::Research,
            prompts::RESEARCH_SYSTEM,
            prompts::research_questions(brief),
            TEMPERATURE,
        );

        let (outcome, usage) = invoke_structured(self.invoker.as_ref(), request, || QuestionsResponse {
            questions: Self::fallback_questions(),
        })
        .await?;

        // 空问题列表同样视为无法使用
        let outcome = match outcome {
            ParseOutcome::Parsed(r) if r.questions.is_empty() => {
                ParseOutcome::Fallback(Self::fallback_questions())
            }
            other => other.map(|r| r.questions),
        };

        Ok(AgentOutput::from_outcome(outcome, usage))
    }

    /// 生成调研简报（自由文本）
    pub async fn compile_research(
        &self,
        brief: &BookBrief,
        answers: &[ResearchAnswer],
    ) -> Result<AgentOutput<String>, ModelError> {
        let request = ModelRequest::new(
            AgentRole::Research,
            prompts::RESEARCH_SYSTEM,
            prompts::compile_research(brief, answers),
            TEMPERATURE,
        );
        invoke_text(self.invoker.as_ref(), request).await
    }

    /// 模型输出无法解析时的固定问题集（5 个，id 为 q1..q5）
    pub fn fallback_questions() -> Vec<ResearchQuestion> {
        [
            ("q1", "Who is the intended reader of this book?", "Define the target audience"),
            ("q2", "What should readers know or feel after finishing it?", "Set the book's goal"),
            ("q3", "What are the main topics or story arcs it must cover?", "Scope the content"),
            ("q4", "Which sources, experiences or references will it draw on?", "Ground the material"),
            ("q5", "What tone and style should the writing have?", "Establish the voice"),
        ]
        .into_iter()
        .map(|(id, question, purpose)| ResearchQuestion {
            id: id.to_string(),
            question: question.to_string(),
            purpose: purpose.to_string(),
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::ScriptedModelClient;

    fn brief() -> BookBrief {
        BookBrief {
            book_type: "non-fiction".into(),
            title: "Deep Work at Sea".into(),
            description: "Focus lessons from sailors".into(),
            target_audience: None,
        }
    }

    #[tokio::test]
    async fn test_malformed_json_returns_fallback_questions() {
        let client = Arc::new(
            ScriptedModelClient::new()
                .with_reply(AgentRole::Research, "Here are questions: {\"questions\": [ {\"id\": oops"),
        );
        let agent = ResearchAgent::new(client);

        let output = agent.generate_questions(&brief()).await.unwrap();
        assert!(output.fallback);
        assert_eq!(output.value.len(), 5);
        let ids: Vec<&str> = output.value.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3", "q4", "q5"]);
        assert!(output
            .value
            .iter()
            .all(|q| !q.question.is_empty() && !q.purpose.is_empty()));
        assert_eq!(output.value, ResearchAgent::fallback_questions());
    }

    #[tokio::test]
    async fn test_parses_questions_from_prose() {
        let client = Arc::new(ScriptedModelClient::new().with_reply(
            AgentRole::Research,
            "Sure!\n{\"questions\": [{\"id\": \"q1\", \"question\": \"Why?\", \"purpose\": \"Motive\"}]}\nDone.",
        ));
        let agent = ResearchAgent::new(client);

        let output = agent.generate_questions(&brief()).await.unwrap();
        assert!(!output.fallback);
        assert_eq!(output.value.len(), 1);
        assert_eq!(output.value[0].question, "Why?");
        assert!(output.usage.total_tokens > 0);
    }

    #[tokio::test]
    async fn test_empty_response_returns_fallback() {
        let client = Arc::new(ScriptedModelClient::new().with_reply(AgentRole::Research, ""));
        let agent = ResearchAgent::new(client);

        let output = agent.generate_questions(&brief()).await.unwrap();
        assert!(output.fallback);
        assert_eq!(output.value.len(), 5);
        // 回退结果同样为提示词记账
        assert!(output.usage.prompt_tokens > 0);
        assert_eq!(output.usage.completion_tokens, 0);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let client = Arc::new(
            ScriptedModelClient::new()
                .with_error(AgentRole::Research, ModelError::Provider("503".into())),
        );
        let agent = ResearchAgent::new(client);

        let err = agent.generate_questions(&brief()).await.unwrap_err();
        assert_eq!(err, ModelError::Provider("503".into()));
    }

    #[tokio::test]
    async fn test_compile_research_rejects_empty_text() {
        let client = Arc::new(ScriptedModelClient::new().with_reply(AgentRole::Research, "   "));
        let agent = ResearchAgent::new(client);

        let err = agent.compile_research(&brief(), &[]).await.unwrap_err();
        // 空白回复仍要为提示词记账
        match err {
            ModelError::EmptyResponse { usage } => assert!(usage.prompt_tokens > 0),
            other => panic!("unexpected {:?}", other),
        }
    }
}
