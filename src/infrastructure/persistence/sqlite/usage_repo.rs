//! SQLite Usage Ledger

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::DbPool;
use crate::application::ports::{RepositoryError, UsageLedgerPort, UsageTotal};
use crate::domain::quota::TokenUsageRecord;

/// SQLite Usage Ledger（只追加）
pub struct SqliteUsageLedger {
    pool: DbPool,
}

impl SqliteUsageLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UsageTotalRow {
    user_id: String,
    total: i64,
    first_at_ms: i64,
}

impl TryFrom<UsageTotalRow> for UsageTotal {
    type Error = RepositoryError;

    fn try_from(row: UsageTotalRow) -> Result<Self, Self::Error> {
        let first_at = DateTime::<Utc>::from_timestamp_millis(row.first_at_ms).ok_or_else(|| {
            RepositoryError::SerializationError(format!("invalid timestamp {}", row.first_at_ms))
        })?;
        Ok(UsageTotal {
            user_id: row.user_id,
            total: row.total.max(0) as u64,
            first_at,
        })
    }
}

#[async_trait]
impl UsageLedgerPort for SqliteUsageLedger {
    async fn append(&self, record: &TokenUsageRecord) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO token_usage (user_id, amount, timestamp_ms) VALUES (?, ?, ?)")
            .bind(&record.user_id)
            .bind(record.amount as i64)
            .bind(record.timestamp.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn totals_since(&self, since: DateTime<Utc>) -> Result<Vec<UsageTotal>, RepositoryError> {
        let rows: Vec<UsageTotalRow> = sqlx::query_as(
            r#"
            SELECT user_id, SUM(amount) AS total, MIN(timestamp_ms) AS first_at_ms
            FROM token_usage
            WHERE timestamp_ms >= ?
            GROUP BY user_id
            ORDER BY user_id
            "#,
        )
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(UsageTotal::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_totals_since_groups_by_user() {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let ledger = SqliteUsageLedger::new(pool);

        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        ledger.append(&TokenUsageRecord::new("u1", 100, t0 - Duration::days(40))).await.unwrap();
        ledger.append(&TokenUsageRecord::new("u1", 30, t0)).await.unwrap();
        ledger.append(&TokenUsageRecord::new("u1", 12, t0 + Duration::hours(2))).await.unwrap();
        ledger.append(&TokenUsageRecord::new("u2", 7, t0 + Duration::days(1))).await.unwrap();

        let totals = ledger.totals_since(t0 - Duration::days(30)).await.unwrap();
        assert_eq!(
            totals,
            vec![
                UsageTotal { user_id: "u1".into(), total: 42, first_at: t0 },
                UsageTotal { user_id: "u2".into(), total: 7, first_at: t0 + Duration::days(1) },
            ]
        );
    }
}
