//! Event Publisher Implementation
//!
//! WebSocket 事件推送实现，每个用户一个广播通道

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// WebSocket 事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WsEvent {
    /// 一次生成调用完成
    GenerationCompleted {
        user_id: String,
        phase: String,
        tokens: u64,
    },
    /// Editor/Critic 循环结束
    EditorCriticFinished {
        user_id: String,
        iterations: u32,
        passed: bool,
        score: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        terminal_reason: Option<String>,
    },
    /// 流式写作结束（completed / cancelled / failed）
    ChapterStreamFinished {
        user_id: String,
        chapter_number: u32,
        status: String,
        tokens: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// 用量越过预警比例
    QuotaWarning {
        user_id: String,
        used: u64,
        limit: u64,
        percentage: f64,
    },
}

/// 事件发布器
pub struct EventPublisher {
    /// user_id -> broadcast sender
    user_channels: DashMap<String, broadcast::Sender<WsEvent>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            user_channels: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅用户的事件通道（不存在则创建）
    pub fn register_user(&self, user_id: &str) -> broadcast::Receiver<WsEvent> {
        self.user_channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(100).0)
            .subscribe()
    }

    /// 没有订阅者时移除用户通道
    pub fn unregister_user(&self, user_id: &str) {
        self.user_channels
            .remove_if(user_id, |_, sender| sender.receiver_count() == 0);
    }

    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.user_channels
            .get(user_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// 发布生成完成事件
    pub fn publish_generation_completed(&self, user_id: &str, phase: &str, tokens: u64) {
        self.publish_to_user(
            user_id,
            WsEvent::GenerationCompleted {
                user_id: user_id.to_string(),
                phase: phase.to_string(),
                tokens,
            },
        );
    }

    /// 发布 Editor/Critic 循环结束事件
    pub fn publish_editor_critic_finished(
        &self,
        user_id: &str,
        iterations: u32,
        passed: bool,
        score: f32,
        terminal_reason: Option<String>,
    ) {
        self.publish_to_user(
            user_id,
            WsEvent::EditorCriticFinished {
                user_id: user_id.to_string(),
                iterations,
                passed,
                score,
                terminal_reason,
            },
        );
    }

    /// 发布流式写作结束事件
    pub fn publish_chapter_stream_finished(
        &self,
        user_id: &str,
        chapter_number: u32,
        status: &str,
        tokens: u64,
        error: Option<String>,
    ) {
        self.publish_to_user(
            user_id,
            WsEvent::ChapterStreamFinished {
                user_id: user_id.to_string(),
                chapter_number,
                status: status.to_string(),
                tokens,
                error,
            },
        );
    }

    /// 发布配额预警事件
    pub fn publish_quota_warning(&self, user_id: &str, used: u64, limit: u64, percentage: f64) {
        tracing::info!(user_id = %user_id, used, limit, percentage, "Quota warning threshold crossed");
        self.publish_to_user(
            user_id,
            WsEvent::QuotaWarning {
                user_id: user_id.to_string(),
                used,
                limit,
                percentage,
            },
        );
    }

    /// 发布事件到指定用户
    fn publish_to_user(&self, user_id: &str, event: WsEvent) {
        if let Some(sender) = self.user_channels.get(user_id) {
            if let Err(e) = sender.send(event) {
                tracing::debug!(
                    user_id = %user_id,
                    error = %e,
                    "Failed to publish event (no receivers)"
                );
            }
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
