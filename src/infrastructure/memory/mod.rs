//! Memory Layer - In-Memory State Management
//!
//! 实现 QuotaManager，按用户管理配额周期的内存状态

mod quota_manager;

pub use quota_manager::{InMemoryQuotaManager, QuotaManagerConfig};
