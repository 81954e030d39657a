//! Quota Queries

/// 获取用户当前周期的用量
#[derive(Debug, Clone)]
pub struct GetUsage {
    pub user_id: String,
}
