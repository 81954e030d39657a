//! Quota Context - 用户 token 配额
//!
//! 职责:
//! - 配额周期（滚动窗口）
//! - 用量记录（只追加）
//! - 请求预留量上界

mod budget;
mod period;

pub use budget::{CallPlan, ReservationPolicy};
pub use period::{QuotaPeriod, TokenUsageRecord, UsageInfo};
