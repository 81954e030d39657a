//! Usage Recorder - 生成完成后的统一记账
//!
//! 记账顺序: 配额管理器 -> 用量账本 -> 预警事件。
//! 账本写入失败只记录日志，不影响已完成的生成结果

use std::sync::Arc;

use crate::application::ports::{QuotaManagerPort, QuotaReservation, TokenUsage, UsageLedgerPort};
use crate::domain::quota::{TokenUsageRecord, UsageInfo};
use crate::infrastructure::events::EventPublisher;

pub struct UsageRecorder {
    quota: Arc<dyn QuotaManagerPort>,
    ledger: Arc<dyn UsageLedgerPort>,
    events: Arc<EventPublisher>,
    /// 用量占比越过该值时推送预警
    warning_ratio: f64,
}

impl UsageRecorder {
    pub fn new(
        quota: Arc<dyn QuotaManagerPort>,
        ledger: Arc<dyn UsageLedgerPort>,
        events: Arc<EventPublisher>,
        warning_ratio: f64,
    ) -> Self {
        Self {
            quota,
            ledger,
            events,
            warning_ratio,
        }
    }

    /// 消耗预留并记录实际用量
    pub async fn record(
        &self,
        reservation: QuotaReservation,
        usage: TokenUsage,
    ) -> (TokenUsageRecord, UsageInfo) {
        let record = self.quota.record_usage(reservation, usage.total_tokens);

        if let Err(e) = self.ledger.append(&record).await {
            tracing::error!(
                user_id = %record.user_id,
                tokens = record.amount,
                error = %e,
                "Failed to append usage to ledger"
            );
        }

        let info = self.quota.get_usage_info(&record.user_id);
        if self.crossed_warning(record.amount, &info) {
            self.events
                .publish_quota_warning(&record.user_id, info.used, info.limit, info.percentage);
        }

        tracing::info!(
            user_id = %record.user_id,
            tokens = record.amount,
            used = info.used,
            limit = info.limit,
            "Usage recorded"
        );

        (record, info)
    }

    fn crossed_warning(&self, amount: u64, info: &UsageInfo) -> bool {
        if info.limit == 0 || amount == 0 {
            return false;
        }
        let threshold = info.limit as f64 * self.warning_ratio;
        let before = info.used.saturating_sub(amount) as f64;
        before < threshold && info.used as f64 >= threshold
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::ports::{RepositoryError, SystemClock, UsageTotal};
    use crate::infrastructure::events::WsEvent;
    use crate::infrastructure::memory::{InMemoryQuotaManager, QuotaManagerConfig};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// 内存账本（测试用）
    #[derive(Default)]
    pub(crate) struct MemoryLedger {
        pub records: Mutex<Vec<TokenUsageRecord>>,
    }

    #[async_trait]
    impl UsageLedgerPort for MemoryLedger {
        async fn append(&self, record: &TokenUsageRecord) -> Result<(), RepositoryError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn totals_since(&self, _since: DateTime<Utc>) -> Result<Vec<UsageTotal>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    pub(crate) fn quota(limit: u64) -> Arc<InMemoryQuotaManager> {
        InMemoryQuotaManager::new(
            QuotaManagerConfig {
                default_limit: limit,
                ..Default::default()
            },
            Arc::new(SystemClock),
        )
        .arc()
    }

    #[tokio::test]
    async fn test_record_appends_ledger_and_warns_once() {
        let quota = quota(100);
        let ledger = Arc::new(MemoryLedger::default());
        let events = EventPublisher::new().arc();
        let mut rx = events.register_user("u1");
        let recorder = UsageRecorder::new(quota.clone(), ledger.clone(), events, 0.8);

        let reservation = quota.check_quota("u1", 10).unwrap();
        let (record, info) = recorder.record(reservation, TokenUsage::new(40, 45)).await;
        assert_eq!(record.amount, 85);
        assert_eq!(info.used, 85);
        assert_eq!(ledger.records.lock().unwrap().len(), 1);

        match rx.try_recv().unwrap() {
            WsEvent::QuotaWarning { used, limit, .. } => assert_eq!((used, limit), (85, 100)),
            other => panic!("unexpected {:?}", other),
        }

        // 已越过阈值后不再重复预警
        let reservation = quota.check_quota("u1", 10).unwrap();
        recorder.record(reservation, TokenUsage::new(1, 1)).await;
        assert!(rx.try_recv().is_err());
    }
}
