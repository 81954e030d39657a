//! HTTP Model Client - 调用 OpenAI 兼容的 Chat Completions 接口
//!
//! 实现 ModelInvokerPort trait
//!
//! 外部 API:
//! POST {base_url}/chat/completions
//! Request: {"model": "...", "messages": [...], "temperature": 0.7, "stream": false}
//! Response: {"choices": [{"message": {"content": "..."}}], "usage": {...}}
//!
//! 流式响应为 SSE，每行 `data: {...}`，以 `data: [DONE]` 结束

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ModelCompletion, ModelError, ModelInvokerPort, ModelRequest, TokenUsage,
};

/// HTTP 模型客户端配置
#[derive(Debug, Clone)]
pub struct HttpModelClientConfig {
    /// 服务基础 URL（不含 /chat/completions）
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// 一次性调用的超时时间（秒）
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// 流式调用等待下一个数据块的最长时间（秒）
    pub stream_idle_timeout_secs: u64,
    /// 请求未指定 max_tokens 时的默认值
    pub max_tokens: u32,
}

impl Default for HttpModelClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 300,
            connect_timeout_secs: 10,
            stream_idle_timeout_secs: 60,
            max_tokens: 4096,
        }
    }
}

impl HttpModelClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl From<UsageBody> for TokenUsage {
    fn from(body: UsageBody) -> Self {
        TokenUsage::new(body.prompt_tokens, body.completion_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

/// SSE 数据行
#[derive(Debug, PartialEq)]
enum SseData {
    Payload(String),
    Done,
}

/// 按行切分 SSE 字节流，只保留 `data:` 行
#[derive(Debug, Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseData> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if data == "[DONE]" {
                    events.push(SseData::Done);
                } else if !data.is_empty() {
                    events.push(SseData::Payload(data.to_string()));
                }
            }
        }
        events
    }
}

/// HTTP 模型客户端
pub struct HttpModelClient {
    client: Client,
    config: HttpModelClientConfig,
}

impl HttpModelClient {
    /// 客户端不设整体超时：一次性调用按请求设置，流式调用按数据块间隔计时
    pub fn new(config: HttpModelClientConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ModelError::Provider(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.config.base_url.trim_end_matches('/'))
    }

    fn body<'a>(&'a self, request: &'a ModelRequest, stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }

    fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.stream_idle_timeout_secs)
    }

    async fn send(
        &self,
        body: &ChatCompletionRequest<'_>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, ModelError> {
        let mut builder = self.client.post(self.completions_url()).json(body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::Provider(format!("HTTP {}: {}", status, error_text)));
        }
        Ok(response)
    }
}

/// 服务端没有报告用量时按提示词和补全估算
fn estimate_usage(request: &ModelRequest, completion: &str) -> TokenUsage {
    TokenUsage::estimate(
        &format!("{}{}", request.system_instruction, request.user_prompt),
        completion,
    )
}

fn map_reqwest_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout
    } else if e.is_connect() {
        ModelError::Provider(format!("Cannot connect to model service: {}", e))
    } else {
        ModelError::Provider(e.to_string())
    }
}

#[async_trait]
impl ModelInvokerPort for HttpModelClient {
    async fn invoke(&self, request: ModelRequest) -> Result<ModelCompletion, ModelError> {
        let body = self.body(&request, false);

        tracing::debug!(
            url = %self.completions_url(),
            role = %request.role,
            prompt_len = request.user_prompt.len(),
            "Sending chat completion request"
        );

        let response = self
            .send(&body, Some(Duration::from_secs(self.config.timeout_secs)))
            .await?;
        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Provider(format!("Invalid response body: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let usage = match parsed.usage {
            Some(usage) => usage.into(),
            None => estimate_usage(&request, &text),
        };

        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse { usage });
        }

        tracing::debug!(role = %request.role, tokens = usage.total_tokens, "Chat completion finished");

        Ok(ModelCompletion { text, usage })
    }

    async fn invoke_streaming(
        &self,
        request: ModelRequest,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<ModelCompletion, ModelError> {
        let body = self.body(&request, true);

        tracing::debug!(
            url = %self.completions_url(),
            role = %request.role,
            "Sending streaming chat completion request"
        );

        let idle = self.stream_idle_timeout();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ModelError::Cancelled { partial_usage: None }),
            result = tokio::time::timeout(idle, self.send(&body, None)) => {
                result.map_err(|_| ModelError::Timeout)??
            }
        };

        let mut stream = response.bytes_stream();
        let mut lines = SseLineBuffer::default();
        let mut text = String::new();
        let mut usage: Option<TokenUsage> = None;

        'read: loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(role = %request.role, received = text.len(), "Streaming generation cancelled");
                    return Err(ModelError::Cancelled { partial_usage: usage });
                }
                next = tokio::time::timeout(idle, stream.next()) => next,
            };

            let bytes = match next {
                Err(_) => {
                    tracing::warn!(role = %request.role, received = text.len(), "Stream stalled, giving up");
                    return Err(ModelError::Timeout);
                }
                Ok(next) => next,
            };
            let bytes = match bytes {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => return Err(map_reqwest_error(e)),
                None => break,
            };

            for data in lines.push(&bytes) {
                let payload = match data {
                    SseData::Done => break 'read,
                    SseData::Payload(payload) => payload,
                };

                let chunk: ChatCompletionChunk = match serde_json::from_str(&payload) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed stream chunk");
                        continue;
                    }
                };

                if let Some(body) = chunk.usage {
                    usage = Some(body.into());
                }

                for choice in chunk.choices {
                    let Some(delta) = choice.delta.content.filter(|c| !c.is_empty()) else {
                        continue;
                    };
                    text.push_str(&delta);
                    if chunks.send(delta).await.is_err() {
                        tracing::info!(role = %request.role, "Stream receiver closed, aborting generation");
                        return Err(ModelError::Cancelled { partial_usage: usage });
                    }
                }
            }
        }

        let usage = usage.unwrap_or_else(|| estimate_usage(&request, &text));
        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse { usage });
        }

        Ok(ModelCompletion { text, usage })
    }

    async fn health_check(&self) -> bool {
        let mut builder = self
            .client
            .get(self.models_url())
            .timeout(Duration::from_secs(self.config.timeout_secs));
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }
        match builder.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Model service health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::AgentRole;
    use axum::{routing::post, Router};

    #[test]
    fn test_sse_lines_split_across_chunks() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let events = buffer.push(b":1}\n\n: keep-alive\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![SseData::Payload("{\"a\":1}".into()), SseData::Done]
        );
    }

    #[test]
    fn test_request_body_shape() {
        let client = HttpModelClient::new(HttpModelClientConfig::default()).unwrap();
        let request = ModelRequest::new(AgentRole::Writer, "sys", "user", 0.7);
        let body = serde_json::to_value(client.body(&request, true)).unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stream_options"]["include_usage"], true);

        let body = serde_json::to_value(client.body(&request, false)).unwrap();
        assert!(body.get("stream_options").is_none());
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_invoke_parses_completion() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                axum::Json(serde_json::json!({
                    "choices": [{"message": {"content": "Hello"}}],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 1}
                }))
            }),
        );
        let client = HttpModelClient::new(HttpModelClientConfig::new(serve(app).await)).unwrap();

        let completion = client
            .invoke(ModelRequest::new(AgentRole::Editor, "sys", "user", 0.3))
            .await
            .unwrap();
        assert_eq!(completion.text, "Hello");
        assert_eq!(completion.usage, TokenUsage::new(3, 1));
    }

    #[tokio::test]
    async fn test_streaming_forwards_deltas_in_order() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Once \"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"upon\"}}]}\n\n",
                    "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2}}\n\n",
                    "data: [DONE]\n\n"
                )
            }),
        );
        let client = HttpModelClient::new(HttpModelClientConfig::new(serve(app).await)).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let completion = client
            .invoke_streaming(
                ModelRequest::new(AgentRole::Writer, "sys", "user", 0.7),
                tx,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.push(chunk);
        }
        assert_eq!(received, vec!["Once ".to_string(), "upon".to_string()]);
        assert_eq!(completion.text, "Once upon");
        assert_eq!(completion.usage, TokenUsage::new(5, 2));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_provider() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let client = HttpModelClient::new(HttpModelClientConfig::new(serve(app).await)).unwrap();

        let err = client
            .invoke(ModelRequest::new(AgentRole::Critic, "sys", "user", 0.2))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Provider(_)));
    }

    #[tokio::test]
    async fn test_blank_completion_keeps_reported_usage() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                axum::Json(serde_json::json!({
                    "choices": [{"message": {"content": "  "}}],
                    "usage": {"prompt_tokens": 42, "completion_tokens": 0}
                }))
            }),
        );
        let client = HttpModelClient::new(HttpModelClientConfig::new(serve(app).await)).unwrap();

        let err = client
            .invoke(ModelRequest::new(AgentRole::Editor, "sys", "user", 0.3))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::EmptyResponse {
                usage: TokenUsage::new(42, 0)
            }
        );
    }

    #[tokio::test]
    async fn test_blank_completion_without_usage_estimates_prompt() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { axum::Json(serde_json::json!({"choices": [{"message": {"content": ""}}]})) }),
        );
        let client = HttpModelClient::new(HttpModelClientConfig::new(serve(app).await)).unwrap();

        let err = client
            .invoke(ModelRequest::new(AgentRole::Editor, "system", "user prompt", 0.3))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::EmptyResponse {
                usage: TokenUsage::estimate("systemuser prompt", "")
            }
        );
    }

    fn slow_stream_app(gap: Duration, chunks: usize) -> Router {
        Router::new().route(
            "/chat/completions",
            post(move || async move {
                let body = async_stream::stream! {
                    for i in 0..chunks {
                        tokio::time::sleep(gap).await;
                        yield Ok::<String, std::convert::Infallible>(format!(
                            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"part{} \"}}}}]}}\n\n",
                            i
                        ));
                    }
                    yield Ok("data: [DONE]\n\n".to_string());
                };
                axum::body::Body::from_stream(body)
            }),
        )
    }

    #[tokio::test]
    async fn test_stream_longer_than_request_timeout_completes() {
        // 整体约 1.6 秒，超过一次性调用的 1 秒超时，但每个数据块间隔都很短
        let app = slow_stream_app(Duration::from_millis(400), 4);
        let mut config = HttpModelClientConfig::new(serve(app).await);
        config.timeout_secs = 1;
        config.stream_idle_timeout_secs = 1;
        let client = HttpModelClient::new(config).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let completion = client
            .invoke_streaming(
                ModelRequest::new(AgentRole::Writer, "sys", "user", 0.7),
                tx,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 4);
        assert_eq!(completion.text, "part0 part1 part2 part3 ");
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let app = slow_stream_app(Duration::from_secs(5), 1);
        let mut config = HttpModelClientConfig::new(serve(app).await);
        config.stream_idle_timeout_secs = 1;
        let client = HttpModelClient::new(config).unwrap();

        let (tx, _rx) = mpsc::channel(16);
        let err = client
            .invoke_streaming(
                ModelRequest::new(AgentRole::Writer, "sys", "user", 0.7),
                tx,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ModelError::Timeout);
    }
}
