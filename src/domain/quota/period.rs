//! Quota Context - 配额周期

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// 配额周期
///
/// 不变量:
/// - period_start < period_end，周期长度在滚动后保持不变
/// - used 在周期内单调不减，滚动时归零
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPeriod {
    user_id: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    limit: u64,
    used: u64,
}

impl QuotaPeriod {
    /// 以 start 为起点开启新周期
    pub fn open(user_id: impl Into<String>, start: DateTime<Utc>, length: Duration, limit: u64) -> Self {
        Self {
            user_id: user_id.into(),
            period_start: start,
            period_end: start + length,
            limit,
            used: 0,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn period_start(&self) -> DateTime<Utc> {
        self.period_start
    }

    pub fn period_end(&self) -> DateTime<Utc> {
        self.period_end
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn length(&self) -> Duration {
        self.period_end - self.period_start
    }

    pub fn is_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.period_end
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// 已用百分比，允许的超额会使其大于 100
    pub fn percentage(&self) -> f64 {
        if self.limit == 0 {
            return 100.0;
        }
        self.used as f64 / self.limit as f64 * 100.0
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.limit = limit;
    }

    pub fn add_usage(&mut self, amount: u64) {
        self.used = self.used.saturating_add(amount);
    }

    /// 周期已过期时前移到包含 now 的周期并清零用量，返回是否发生了滚动
    ///
    /// 起止时间按整数个周期长度前移，而不是从 now 重新开始
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_elapsed(now) {
            return false;
        }

        let length_ms = self.length().num_milliseconds().max(1);
        let elapsed_ms = (now - self.period_start).num_milliseconds();
        let periods = elapsed_ms / length_ms;

        self.period_start += Duration::milliseconds(length_ms * periods);
        self.period_end = self.period_start + Duration::milliseconds(length_ms);
        self.used = 0;
        true
    }

    /// 不修改自身，返回 now 时刻应当生效的周期
    pub fn projected(&self, now: DateTime<Utc>) -> Self {
        let mut period = self.clone();
        period.roll_over(now);
        period
    }

    pub fn usage_info(&self) -> UsageInfo {
        UsageInfo {
            used: self.used,
            limit: self.limit,
            percentage: self.percentage(),
            period_start: self.period_start,
            period_end: self.period_end,
        }
    }
}

/// 用量查询结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageInfo {
    pub used: u64,
    pub limit: u64,
    pub percentage: f64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// token 用量记录（只追加，创建后不修改）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageRecord {
    pub user_id: String,
    pub amount: u64,
    pub timestamp: DateTime<Utc>,
}

impl TokenUsageRecord {
    pub fn new(user_id: impl Into<String>, amount: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            timestamp,
        }
    }
}
