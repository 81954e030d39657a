//! Model Invoker Port - 文本生成模型抽象
//!
//! 定义模型调用的抽象接口，具体实现在 infrastructure/adapters 层。
//! 端口本身不做重试，重试由调用方决定

use std::ops::{Add, AddAssign};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// 模型调用错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Model returned an empty response")]
    EmptyResponse { usage: TokenUsage },

    #[error("Generation cancelled")]
    Cancelled { partial_usage: Option<TokenUsage> },
}

impl ModelError {
    /// 网络/服务端错误可由调用方重试；空响应与取消不可
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelError::Provider(_) | ModelError::Timeout)
    }

    /// 已消耗但没有产出可用结果的 token
    ///
    /// 取消时仅当服务端报告过用量；空响应时为提示词的用量
    pub fn partial_usage(&self) -> Option<TokenUsage> {
        match self {
            ModelError::Cancelled { partial_usage } => *partial_usage,
            ModelError::EmptyResponse { usage } => Some(*usage).filter(|u| !u.is_zero()),
            _ => None,
        }
    }
}

/// Agent 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Research,
    Outliner,
    Writer,
    Editor,
    Critic,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Research,
        AgentRole::Outliner,
        AgentRole::Writer,
        AgentRole::Editor,
        AgentRole::Critic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Research => "research",
            AgentRole::Outliner => "outliner",
            AgentRole::Writer => "writer",
            AgentRole::Editor => "editor",
            AgentRole::Critic => "critic",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// 服务端未返回用量时按字符数估算（每 4 个字符约 1 token，向上取整）
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        Self::new(estimate_tokens(prompt), estimate_tokens(completion))
    }

    pub fn is_zero(&self) -> bool {
        self.total_tokens == 0
    }
}

fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

/// 模型调用请求
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub role: AgentRole,
    pub system_instruction: String,
    pub user_prompt: String,
    pub temperature: f32,
    /// 为空时使用适配器的默认值
    pub max_tokens: Option<u32>,
}

impl ModelRequest {
    pub fn new(
        role: AgentRole,
        system_instruction: impl Into<String>,
        user_prompt: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            role,
            system_instruction: system_instruction.into(),
            user_prompt: user_prompt.into(),
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// 模型调用结果
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCompletion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Model Invoker Port
#[async_trait]
pub trait ModelInvokerPort: Send + Sync {
    /// 一次性生成
    async fn invoke(&self, request: ModelRequest) -> Result<ModelCompletion, ModelError>;

    /// 流式生成
    ///
    /// 每个增量片段按生成顺序发送到 `chunks`，生成结束后才返回完整文本。
    /// `cancel` 被触发或 `chunks` 的接收端关闭时，必须中止上游调用并返回
    /// `ModelError::Cancelled`
    async fn invoke_streaming(
        &self,
        request: ModelRequest,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<ModelCompletion, ModelError>;

    /// 检查模型服务是否可用
    async fn health_check(&self) -> bool {
        true
    }
}
