//! Usage stats endpoint: time range resolution, filters, and handler.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::server::AppState;
use crate::error::Error;
use crate::router::{ProviderKind, TaskCategory, Tier};
use crate::storage::stats::{self, AggregateRow, TaskRow};
use crate::usage::format_timestamp;

/// Query parameters for GET /v1/usage/stats.
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub range: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub tier: Option<String>,
    pub provider: Option<String>,
    pub group_by: Option<String>,
}

/// Preset time range options.
#[derive(Debug, Clone, Copy)]
pub enum RangePreset {
    Last1h,
    Last24h,
    Last7d,
    Last30d,
}

impl RangePreset {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "last_1h" => Some(Self::Last1h),
            "last_24h" => Some(Self::Last24h),
            "last_7d" => Some(Self::Last7d),
            "last_30d" => Some(Self::Last30d),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Last1h => Duration::hours(1),
            Self::Last24h => Duration::hours(24),
            Self::Last7d => Duration::days(7),
            Self::Last30d => Duration::days(30),
        }
    }
}

fn parse_instant(field: &str, value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Validation(format!("Invalid '{}' timestamp: {}", field, e)))
}

/// Resolve the time range from query parameters.
///
/// Explicit `since`/`until` win over `range`; with neither, the last 7 days.
pub fn resolve_time_range(
    range: Option<&str>,
    since: Option<&str>,
    until: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), Error> {
    let now = Utc::now();

    let since_dt = match (since, range) {
        (Some(s), _) => parse_instant("since", s)?,
        (None, Some(r)) => {
            let preset = RangePreset::parse(r).ok_or_else(|| {
                Error::Validation(format!(
                    "Invalid range '{}'. Supported: last_1h, last_24h, last_7d, last_30d",
                    r
                ))
            })?;
            now - preset.duration()
        }
        (None, None) => now - RangePreset::Last7d.duration(),
    };

    let until_dt = match until {
        Some(u) => parse_instant("until", u)?,
        None => now,
    };

    if since_dt > until_dt {
        return Err(Error::Validation(
            "'since' must not be later than 'until'".to_string(),
        ));
    }

    Ok((since_dt, until_dt))
}

/// Totals for one slice of the audit log.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub requests: i64,
    pub credits: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub thinking_tokens: i64,
    pub web_search_requests: i64,
    pub extended_thinking_requests: i64,
    pub avg_latency_ms: f64,
}

impl From<&AggregateRow> for UsageSummary {
    fn from(row: &AggregateRow) -> Self {
        Self {
            requests: row.total_requests,
            credits: row.total_credits,
            input_tokens: row.total_input_tokens,
            output_tokens: row.total_output_tokens,
            thinking_tokens: row.total_thinking_tokens,
            web_search_requests: row.web_search_count,
            extended_thinking_requests: row.extended_thinking_count,
            avg_latency_ms: row.avg_latency_ms,
        }
    }
}

impl From<&TaskRow> for UsageSummary {
    fn from(row: &TaskRow) -> Self {
        Self {
            requests: row.total_requests,
            credits: row.total_credits,
            input_tokens: row.total_input_tokens,
            output_tokens: row.total_output_tokens,
            thinking_tokens: row.total_thinking_tokens,
            web_search_requests: row.web_search_count,
            extended_thinking_requests: row.extended_thinking_count,
            avg_latency_ms: row.avg_latency_ms,
        }
    }
}

/// Top-level stats response.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub since: String,
    pub until: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub totals: UsageSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<serde_json::Map<String, serde_json::Value>>,
}

fn validate_filters(params: &StatsQuery) -> Result<(), Error> {
    if let Some(tier) = params.tier.as_deref() {
        if Tier::parse(tier).is_none() {
            return Err(Error::Validation(format!("Unknown tier '{}'", tier)));
        }
    }

    if let Some(provider) = params.provider.as_deref() {
        let known = [
            ProviderKind::OpenAiMini,
            ProviderKind::OpenAiFull,
            ProviderKind::ClaudeStandard,
        ]
        .iter()
        .any(|p| p.as_str() == provider);
        if !known {
            return Err(Error::Validation(format!("Unknown provider '{}'", provider)));
        }
    }

    if let Some(gb) = params.group_by.as_deref() {
        if gb != "task" {
            return Err(Error::Validation(
                "Invalid group_by value. Supported: 'task'".to_string(),
            ));
        }
    }

    Ok(())
}

/// Per-task map with every category present; categories without traffic are zeroed.
fn task_map(rows: &[TaskRow]) -> Result<serde_json::Map<String, serde_json::Value>, Error> {
    let mut map = serde_json::Map::new();

    for task in TaskCategory::ALL {
        map.insert(
            task.as_str().to_string(),
            serde_json::to_value(UsageSummary::default())
                .map_err(|e| Error::Internal(e.to_string()))?,
        );
    }

    for row in rows {
        map.insert(
            row.task.clone(),
            serde_json::to_value(UsageSummary::from(row))
                .map_err(|e| Error::Internal(e.to_string()))?,
        );
    }

    Ok(map)
}

/// Handle GET /v1/usage/stats -- aggregate credit and token usage.
pub async fn stats_handler(
    State(state): State<AppState>,
    Query(params): Query<StatsQuery>,
) -> Result<impl IntoResponse, Error> {
    let pool = state
        .read_db
        .as_ref()
        .ok_or_else(|| Error::Internal("Usage database not configured".to_string()))?;

    let (since_dt, until_dt) = resolve_time_range(
        params.range.as_deref(),
        params.since.as_deref(),
        params.until.as_deref(),
    )?;
    validate_filters(&params)?;

    let since = format_timestamp(since_dt);
    let until = format_timestamp(until_dt);
    let tier = params.tier.as_deref();
    let provider = params.provider.as_deref();

    tracing::debug!(
        since = %since,
        until = %until,
        tier = ?tier,
        provider = ?provider,
        group_by = ?params.group_by,
        "Usage stats query"
    );

    let row = stats::query_aggregate(pool, &since, &until, tier, provider).await?;

    let tasks = if params.group_by.is_some() {
        let rows = stats::query_grouped_by_task(pool, &since, &until, tier, provider).await?;
        Some(task_map(&rows)?)
    } else {
        None
    };

    let (empty, message) = if row.total_requests == 0 {
        (
            Some(true),
            Some("No usage recorded in the specified time range".to_string()),
        )
    } else {
        (None, None)
    };

    Ok(Json(StatsResponse {
        since,
        until,
        empty,
        message,
        totals: UsageSummary::from(&row),
        tasks,
    }))
}
