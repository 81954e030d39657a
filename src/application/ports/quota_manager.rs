//! Quota Manager Port - 用户 token 配额
//!
//! 定义配额管理的抽象接口，具体实现在 infrastructure/memory 层。
//! 调用顺序: check_quota -> 模型调用 -> record_usage。
//! 预留量由调用方按请求的用量上界给出（见 domain::quota::ReservationPolicy）

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::quota::{TokenUsageRecord, UsageInfo};

/// 配额错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("Token quota exceeded: {used}/{limit} used, resets at {period_end}")]
    Exceeded {
        used: u64,
        limit: u64,
        period_end: DateTime<Utc>,
    },
}

type ReleaseFn = Box<dyn FnOnce(&str, u64) + Send + Sync>;

/// 配额预留
///
/// check_quota 成功后得到的凭证，交给 record_usage 消费；
/// 未消费就被丢弃时通过回调释放预留，不记账
pub struct QuotaReservation {
    user_id: String,
    tokens: u64,
    release: Option<ReleaseFn>,
}

impl QuotaReservation {
    pub fn new(user_id: impl Into<String>, tokens: u64, release: ReleaseFn) -> Self {
        Self {
            user_id: user_id.into(),
            tokens,
            release: Some(release),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// 取出预留信息并解除释放回调，由 record_usage 的实现调用
    pub fn consume(mut self) -> (String, u64) {
        self.release = None;
        (std::mem::take(&mut self.user_id), self.tokens)
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!(user_id = %self.user_id, tokens = self.tokens, "Quota reservation released");
            release(&self.user_id, self.tokens);
        }
    }
}

impl std::fmt::Debug for QuotaReservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaReservation")
            .field("user_id", &self.user_id)
            .field("tokens", &self.tokens)
            .field("armed", &self.release.is_some())
            .finish()
    }
}

/// Quota Manager Port
///
/// 同一用户的 检查-预留-记账 必须串行，不同用户之间互不阻塞
pub trait QuotaManagerPort: Send + Sync {
    /// 检查并预留 tokens 个配额，周期已过期时先滚动
    ///
    /// 没有在途请求时只要未用尽即放行；已有在途请求时，
    /// 全部预留之和必须放得进剩余额度
    fn check_quota(&self, user_id: &str, tokens: u64) -> Result<QuotaReservation, QuotaError>;

    /// 记录用量（恰好增加 amount），消费预留
    fn record_usage(&self, reservation: QuotaReservation, amount: u64) -> TokenUsageRecord;

    /// 只读查询，周期已过期时返回滚动后的视图但不修改状态
    fn get_usage_info(&self, user_id: &str) -> UsageInfo;

    /// 覆盖用户的配额上限
    fn set_limit(&self, user_id: &str, limit: u64);

    /// 启动时从用量账本恢复当前周期
    fn seed_usage(&self, user_id: &str, period_start: DateTime<Utc>, used: u64);
}
