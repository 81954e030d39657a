//! Scripted Model Client - 用于测试和离线演示的模型客户端
//!
//! 按角色回放预设的回复，不实际调用模型服务

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    AgentRole, ModelCompletion, ModelError, ModelInvokerPort, ModelRequest, TokenUsage,
};

/// 预设回复
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Error(ModelError),
}

/// Scripted Model Client
///
/// - 每个角色一个回复队列，队列耗尽后使用该角色的默认回复
/// - 流式调用把回复切成固定字符数的片段，可选片段间延迟
/// - 记录每个角色的调用次数和收到的提示词
pub struct ScriptedModelClient {
    queues: DashMap<AgentRole, VecDeque<ScriptedReply>>,
    defaults: DashMap<AgentRole, ScriptedReply>,
    prompts: DashMap<AgentRole, Vec<String>>,
    chunk_chars: usize,
    chunk_delay: Option<Duration>,
    /// 一次性调用返回前的等待
    reply_delays: DashMap<AgentRole, Duration>,
    /// 取消时是否报告已消耗的 token
    report_partial_usage: bool,
}

impl ScriptedModelClient {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            defaults: DashMap::new(),
            prompts: DashMap::new(),
            chunk_chars: 16,
            chunk_delay: None,
            reply_delays: DashMap::new(),
            report_partial_usage: false,
        }
    }

    /// 离线演示用的默认回复
    pub fn demo() -> Self {
        Self::new()
            .with_default(
                AgentRole::Research,
                r#"{"questions": [
                    {"id": "q1", "question": "Who is the reader?", "purpose": "Audience"},
                    {"id": "q2", "question": "What should they learn?", "purpose": "Outcome"},
                    {"id": "q3", "question": "What is the central conflict?", "purpose": "Tension"},
                    {"id": "q4", "question": "What sources back it up?", "purpose": "Evidence"},
                    {"id": "q5", "question": "What tone fits?", "purpose": "Voice"}]}"#,
            )
            .with_default(
                AgentRole::Outliner,
                r#"{"chapters": [
                    {"title": "Beginnings", "summary": "Setting the stage", "sections": [{"title": "Hook"}]},
                    {"title": "Trials", "summary": "Rising stakes", "sections": [{"title": "Setback"}]},
                    {"title": "Resolution", "summary": "Paying it off", "sections": [{"title": "Landing"}]}]}"#,
            )
            .with_default(
                AgentRole::Writer,
                "The harbour was quiet before dawn. Nobody expected the tide to turn that day.",
            )
            .with_default(
                AgentRole::Editor,
                "The harbour lay quiet before dawn. No one expected the tide to turn.",
            )
            .with_default(
                AgentRole::Critic,
                r#"{"scores": {"clarity": 8, "coherence": 8, "engagement": 7, "style": 8, "structure": 7},
                    "feedback": "Solid draft. Sharpen the final line."}"#,
            )
    }

    /// 追加一条回复到角色队列
    pub fn with_reply(self, role: AgentRole, text: impl Into<String>) -> Self {
        self.push(role, ScriptedReply::Text(text.into()));
        self
    }

    /// 追加一条错误到角色队列
    pub fn with_error(self, role: AgentRole, error: ModelError) -> Self {
        self.push(role, ScriptedReply::Error(error));
        self
    }

    /// 队列耗尽后重复使用的回复
    pub fn with_default(self, role: AgentRole, text: impl Into<String>) -> Self {
        self.defaults.insert(role, ScriptedReply::Text(text.into()));
        self
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// 该角色的一次性调用在返回前等待 delay
    pub fn with_reply_delay(self, role: AgentRole, delay: Duration) -> Self {
        self.reply_delays.insert(role, delay);
        self
    }

    pub fn with_partial_usage(mut self, report: bool) -> Self {
        self.report_partial_usage = report;
        self
    }

    /// 角色被调用的次数
    pub fn calls(&self, role: AgentRole) -> usize {
        self.prompts.get(&role).map(|p| p.len()).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.prompts.iter().map(|p| p.value().len()).sum()
    }

    /// 角色收到的用户提示词（按调用顺序）
    pub fn prompts(&self, role: AgentRole) -> Vec<String> {
        self.prompts.get(&role).map(|p| p.clone()).unwrap_or_default()
    }

    fn push(&self, role: AgentRole, reply: ScriptedReply) {
        self.queues.entry(role).or_default().push_back(reply);
    }

    fn next_reply(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let role = request.role;
        self.prompts
            .entry(role)
            .or_default()
            .push(request.user_prompt.clone());

        let queued = self.queues.get_mut(&role).and_then(|mut q| q.pop_front());
        let reply = queued
            .or_else(|| self.defaults.get(&role).map(|r| r.value().clone()))
            .ok_or_else(|| ModelError::Provider(format!("no scripted reply for role {}", role)))?;

        match reply {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Error(e) => Err(e),
        }
    }

    fn split_chunks(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.chunk_chars)
            .map(|c| c.iter().collect())
            .collect()
    }

    fn cancelled(&self, request: &ModelRequest, produced: &str) -> ModelError {
        let partial_usage = self
            .report_partial_usage
            .then(|| TokenUsage::estimate(&request.user_prompt, produced));
        ModelError::Cancelled { partial_usage }
    }
}

impl Default for ScriptedModelClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelInvokerPort for ScriptedModelClient {
    async fn invoke(&self, request: ModelRequest) -> Result<ModelCompletion, ModelError> {
        let text = self.next_reply(&request)?;
        let delay = self.reply_delays.get(&request.role).map(|d| *d.value());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if text.is_empty() {
            return Err(ModelError::EmptyResponse {
                usage: TokenUsage::estimate(&request.user_prompt, ""),
            });
        }

        tracing::debug!(role = %request.role, text_len = text.len(), "ScriptedModelClient: returning scripted reply");

        let usage = TokenUsage::estimate(&request.user_prompt, &text);
        Ok(ModelCompletion { text, usage })
    }

    async fn invoke_streaming(
        &self,
        request: ModelRequest,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<ModelCompletion, ModelError> {
        let text = self.next_reply(&request)?;
        if text.is_empty() {
            return Err(ModelError::EmptyResponse {
                usage: TokenUsage::estimate(&request.user_prompt, ""),
            });
        }

        let mut produced = String::new();
        for chunk in self.split_chunks(&text) {
            if let Some(delay) = self.chunk_delay {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(self.cancelled(&request, &produced)),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return Err(self.cancelled(&request, &produced));
            }

            produced.push_str(&chunk);
            if chunks.send(chunk).await.is_err() {
                return Err(self.cancelled(&request, &produced));
            }
        }

        let usage = TokenUsage::estimate(&request.user_prompt, &produced);
        Ok(ModelCompletion {
            text: produced,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: AgentRole) -> ModelRequest {
        ModelRequest::new(role, "system", "prompt", 0.5)
    }

    #[tokio::test]
    async fn test_queue_then_default() {
        let client = ScriptedModelClient::new()
            .with_reply(AgentRole::Critic, "first")
            .with_default(AgentRole::Critic, "again");

        assert_eq!(client.invoke(request(AgentRole::Critic)).await.unwrap().text, "first");
        assert_eq!(client.invoke(request(AgentRole::Critic)).await.unwrap().text, "again");
        assert_eq!(client.invoke(request(AgentRole::Critic)).await.unwrap().text, "again");
        assert_eq!(client.calls(AgentRole::Critic), 3);
        assert!(client.invoke(request(AgentRole::Writer)).await.is_err());
    }

    #[tokio::test]
    async fn test_streaming_chunks_in_order() {
        let client = ScriptedModelClient::new()
            .with_reply(AgentRole::Writer, "abcdefghij")
            .with_chunk_chars(4);
        let (tx, mut rx) = mpsc::channel(16);

        let completion = client
            .invoke_streaming(request(AgentRole::Writer), tx, CancellationToken::new())
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.push(chunk);
        }
        assert_eq!(received, vec!["abcd", "efgh", "ij"]);
        assert_eq!(completion.text, "abcdefghij");
    }

    #[tokio::test]
    async fn test_empty_reply_reports_prompt_usage() {
        let client = ScriptedModelClient::new().with_reply(AgentRole::Editor, "");

        match client.invoke(request(AgentRole::Editor)).await {
            Err(ModelError::EmptyResponse { usage }) => {
                assert_eq!(usage, TokenUsage::estimate("prompt", ""));
            }
            other => panic!("expected empty response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_streaming_honours_cancellation() {
        let client = ScriptedModelClient::new()
            .with_reply(AgentRole::Writer, "a".repeat(100))
            .with_chunk_chars(1)
            .with_chunk_delay(Duration::from_millis(5))
            .with_partial_usage(true);
        let (tx, mut rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            rx.recv().await;
            canceller.cancel();
        });

        let result = client
            .invoke_streaming(request(AgentRole::Writer), tx, cancel)
            .await;
        match result {
            Err(ModelError::Cancelled { partial_usage }) => assert!(partial_usage.is_some()),
            other => panic!("expected cancellation, got {:?}", other),
        }
    }
}
