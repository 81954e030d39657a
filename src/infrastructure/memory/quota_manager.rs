//! In-Memory Quota Manager Implementation
//!
//! 每个用户一个账户，DashMap 的 entry 锁保证同一用户的
//! 检查-预留-记账 串行执行，不同用户互不阻塞。
//!
//! 预留量是请求用量的上界，因此并发放行的请求合计不会越过上限；
//! 唯一的超额来自没有在途请求时放行的那一个请求

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{Clock, QuotaError, QuotaManagerPort, QuotaReservation};
use crate::domain::quota::{QuotaPeriod, TokenUsageRecord, UsageInfo};

/// 配额管理器配置
#[derive(Debug, Clone)]
pub struct QuotaManagerConfig {
    /// 每个周期的默认上限
    pub default_limit: u64,
    /// 周期长度
    pub period_length: Duration,
}

impl Default for QuotaManagerConfig {
    fn default() -> Self {
        Self {
            default_limit: 200_000,
            period_length: Duration::days(30),
        }
    }
}

/// 用户账户
#[derive(Debug)]
struct QuotaAccount {
    period: QuotaPeriod,
    /// 尚未记账的预留总量
    reserved: u64,
    /// 尚未记账的请求数
    in_flight: u32,
}

/// 内存配额管理器
pub struct InMemoryQuotaManager {
    accounts: Arc<DashMap<String, QuotaAccount>>,
    config: QuotaManagerConfig,
    clock: Arc<dyn Clock>,
}

impl InMemoryQuotaManager {
    pub fn new(config: QuotaManagerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Arc::new(DashMap::new()),
            config,
            clock,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn new_account(&self, user_id: &str, now: DateTime<Utc>) -> QuotaAccount {
        QuotaAccount {
            period: QuotaPeriod::open(user_id, now, self.config.period_length, self.config.default_limit),
            reserved: 0,
            in_flight: 0,
        }
    }

    fn exceeded(period: &QuotaPeriod) -> QuotaError {
        QuotaError::Exceeded {
            used: period.used(),
            limit: period.limit(),
            period_end: period.period_end(),
        }
    }
}

impl QuotaManagerPort for InMemoryQuotaManager {
    fn check_quota(&self, user_id: &str, reservation_tokens: u64) -> Result<QuotaReservation, QuotaError> {
        let now = self.clock.now();

        {
            let mut account = self
                .accounts
                .entry(user_id.to_string())
                .or_insert_with(|| self.new_account(user_id, now));

            if account.period.roll_over(now) {
                tracing::info!(
                    user_id = %user_id,
                    period_start = %account.period.period_start(),
                    "Quota period rolled over"
                );
            }

            if account.period.is_exhausted() {
                tracing::warn!(
                    user_id = %user_id,
                    used = account.period.used(),
                    limit = account.period.limit(),
                    "Quota exhausted"
                );
                return Err(Self::exceeded(&account.period));
            }

            // 已有在途请求时，新的预留必须放得进剩余额度
            if account.in_flight > 0
                && account.reserved.saturating_add(reservation_tokens) > account.period.remaining()
            {
                tracing::warn!(
                    user_id = %user_id,
                    in_flight = account.in_flight,
                    reserved = account.reserved,
                    requested = reservation_tokens,
                    remaining = account.period.remaining(),
                    "Quota headroom taken by in-flight requests"
                );
                return Err(Self::exceeded(&account.period));
            }

            account.reserved = account.reserved.saturating_add(reservation_tokens);
            account.in_flight += 1;
        }

        let accounts = self.accounts.clone();
        Ok(QuotaReservation::new(
            user_id,
            reservation_tokens,
            Box::new(move |user_id: &str, tokens: u64| {
                if let Some(mut account) = accounts.get_mut(user_id) {
                    account.reserved = account.reserved.saturating_sub(tokens);
                    account.in_flight = account.in_flight.saturating_sub(1);
                }
            }),
        ))
    }

    fn record_usage(&self, reservation: QuotaReservation, amount: u64) -> TokenUsageRecord {
        let (user_id, tokens) = reservation.consume();
        let now = self.clock.now();

        let mut account = self
            .accounts
            .entry(user_id.clone())
            .or_insert_with(|| self.new_account(&user_id, now));

        account.period.roll_over(now);
        account.reserved = account.reserved.saturating_sub(tokens);
        account.in_flight = account.in_flight.saturating_sub(1);
        account.period.add_usage(amount);

        if amount > tokens {
            tracing::warn!(
                user_id = %user_id,
                tokens = amount,
                reserved = tokens,
                "Recorded usage exceeds its reservation"
            );
        }

        tracing::debug!(
            user_id = %user_id,
            tokens = amount,
            used = account.period.used(),
            limit = account.period.limit(),
            "Token usage recorded"
        );

        TokenUsageRecord::new(user_id.clone(), amount, now)
    }

    fn get_usage_info(&self, user_id: &str) -> UsageInfo {
        let now = self.clock.now();
        match self.accounts.get(user_id) {
            Some(account) => account.period.projected(now).usage_info(),
            None => self.new_account(user_id, now).period.usage_info(),
        }
    }

    fn set_limit(&self, user_id: &str, limit: u64) {
        let now = self.clock.now();
        self.accounts
            .entry(user_id.to_string())
            .or_insert_with(|| self.new_account(user_id, now))
            .period
            .set_limit(limit);
        tracing::info!(user_id = %user_id, limit, "Quota limit updated");
    }

    fn seed_usage(&self, user_id: &str, period_start: DateTime<Utc>, used: u64) {
        let now = self.clock.now();
        let mut period = QuotaPeriod::open(
            user_id,
            period_start,
            self.config.period_length,
            self.config.default_limit,
        );
        period.add_usage(used);
        period.roll_over(now);

        let mut account = self
            .accounts
            .entry(user_id.to_string())
            .or_insert_with(|| self.new_account(user_id, now));
        account.period = period;
    }
}
