//! Quota Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::QuotaManagerPort;
use crate::application::queries::GetUsage;
use crate::domain::quota::UsageInfo;

/// GetUsage Handler
///
/// 只读投影，周期已过期时返回滚动后的视图但不修改状态
pub struct GetUsageHandler {
    quota: Arc<dyn QuotaManagerPort>,
}

impl GetUsageHandler {
    pub fn new(quota: Arc<dyn QuotaManagerPort>) -> Self {
        Self { quota }
    }

    pub fn handle(&self, query: GetUsage) -> Result<UsageInfo, ApplicationError> {
        if query.user_id.trim().is_empty() {
            return Err(ApplicationError::validation("user id must not be empty"));
        }
        Ok(self.quota.get_usage_info(&query.user_id))
    }
}
