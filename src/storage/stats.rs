//! Aggregate usage queries for the stats endpoint.

use sqlx::SqlitePool;

/// Aggregate usage for a time range.
#[derive(Debug, sqlx::FromRow)]
pub struct AggregateRow {
    pub total_requests: i64,
    pub total_credits: i64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_thinking_tokens: i64,
    pub avg_latency_ms: f64,
    pub web_search_count: i64,
    pub extended_thinking_count: i64,
}

/// Per-task usage for a time range.
#[derive(Debug, sqlx::FromRow)]
pub struct TaskRow {
    pub task: String,
    pub total_requests: i64,
    pub total_credits: i64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_thinking_tokens: i64,
    pub avg_latency_ms: f64,
    pub web_search_count: i64,
    pub extended_thinking_count: i64,
}

const AGGREGATE_COLUMNS: &str = "\
    COUNT(*) as total_requests, \
    CAST(TOTAL(credit_cost) AS INTEGER) as total_credits, \
    CAST(TOTAL(input_tokens) AS INTEGER) as total_input_tokens, \
    CAST(TOTAL(output_tokens) AS INTEGER) as total_output_tokens, \
    CAST(TOTAL(thinking_tokens) AS INTEGER) as total_thinking_tokens, \
    CAST(COALESCE(AVG(latency_ms), 0) AS REAL) as avg_latency_ms, \
    COUNT(CASE WHEN web_search = 1 THEN 1 END) as web_search_count, \
    COUNT(CASE WHEN extended_thinking = 1 THEN 1 END) as extended_thinking_count";

/// Query aggregate usage for a time range with optional tier/provider filters.
///
/// `TOTAL()` returns 0.0 instead of NULL on empty ranges, so every column is
/// non-null.
pub async fn query_aggregate(
    pool: &SqlitePool,
    since: &str,
    until: &str,
    tier: Option<&str>,
    provider: Option<&str>,
) -> Result<AggregateRow, sqlx::Error> {
    let mut sql = format!(
        "SELECT {} FROM usage_records WHERE timestamp >= ? AND timestamp <= ?",
        AGGREGATE_COLUMNS
    );

    if tier.is_some() {
        sql.push_str(" AND tier = ?");
    }
    if provider.is_some() {
        sql.push_str(" AND provider = ?");
    }

    let mut query = sqlx::query_as::<_, AggregateRow>(&sql)
        .bind(since)
        .bind(until);

    if let Some(t) = tier {
        query = query.bind(t);
    }
    if let Some(p) = provider {
        query = query.bind(p);
    }

    query.fetch_one(pool).await
}

/// Query per-task usage for a time range, one row per task seen.
pub async fn query_grouped_by_task(
    pool: &SqlitePool,
    since: &str,
    until: &str,
    tier: Option<&str>,
    provider: Option<&str>,
) -> Result<Vec<TaskRow>, sqlx::Error> {
    let mut sql = format!(
        "SELECT task, {} FROM usage_records WHERE timestamp >= ? AND timestamp <= ?",
        AGGREGATE_COLUMNS
    );

    if tier.is_some() {
        sql.push_str(" AND tier = ?");
    }
    if provider.is_some() {
        sql.push_str(" AND provider = ?");
    }

    sql.push_str(" GROUP BY task ORDER BY task");

    let mut query = sqlx::query_as::<_, TaskRow>(&sql).bind(since).bind(until);

    if let Some(t) = tier {
        query = query.bind(t);
    }
    if let Some(p) = provider {
        query = query.bind(p);
    }

    query.fetch_all(pool).await
}
