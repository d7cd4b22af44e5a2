//! Usage record persistence.

use sqlx::SqlitePool;

use crate::usage::{UsageRecord, UsageSink};

/// SQLite integers are signed; counts past `i64::MAX` are stored saturated.
fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Insert a usage record into the database.
pub async fn insert_usage(pool: &SqlitePool, record: &UsageRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO usage_records (
            id, timestamp, task, tier, provider, model,
            input_tokens, output_tokens, thinking_tokens,
            credit_cost, web_search, extended_thinking, latency_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.timestamp)
    .bind(record.task.as_str())
    .bind(record.tier.as_str())
    .bind(record.provider.as_str())
    .bind(&record.model)
    .bind(to_sql_int(record.input_tokens))
    .bind(to_sql_int(record.output_tokens))
    .bind(record.thinking_tokens.map(to_sql_int))
    .bind(to_sql_int(record.credit_cost))
    .bind(record.web_search)
    .bind(record.extended_thinking)
    .bind(record.latency_ms)
    .execute(pool)
    .await?;
    Ok(())
}

/// Writes usage records to SQLite without blocking the caller.
#[derive(Debug, Clone)]
pub struct SqliteUsageSink {
    pool: SqlitePool,
}

impl SqliteUsageSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl UsageSink for SqliteUsageSink {
    /// Spawn a fire-and-forget insert. Failures are logged, not propagated.
    fn record(&self, record: UsageRecord) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            if let Err(e) = insert_usage(&pool, &record).await {
                tracing::warn!(
                    id = %record.id,
                    error = %e,
                    "Failed to write usage record to database"
                );
            }
        });
    }
}
