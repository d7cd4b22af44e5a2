//! Usage audit records and the sinks that receive them.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::router::{InvokeResponse, ProviderKind, TaskCategory, Tier};

/// One completed AI call. Created once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub id: String,
    pub timestamp: String,
    pub task: TaskCategory,
    pub tier: Tier,
    pub provider: ProviderKind,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: Option<u64>,
    pub credit_cost: u64,
    pub web_search: bool,
    pub extended_thinking: bool,
    pub latency_ms: i64,
}

/// Timestamp format shared by records and range queries, so that text
/// comparison in storage orders correctly.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl UsageRecord {
    pub fn new(
        id: impl Into<String>,
        task: TaskCategory,
        tier: Tier,
        response: &InvokeResponse,
        credit_cost: u64,
        latency_ms: i64,
    ) -> Self {
        let usage = &response.usage;
        Self {
            id: id.into(),
            timestamp: format_timestamp(Utc::now()),
            task,
            tier,
            provider: usage.provider,
            model: usage.model.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            thinking_tokens: usage.thinking_tokens,
            credit_cost,
            web_search: usage.web_search.unwrap_or(false),
            extended_thinking: usage.extended_thinking.unwrap_or(false),
            latency_ms,
        }
    }
}

/// Destination for usage records.
///
/// `record` must not block; implementations that do I/O hand the write off.
pub trait UsageSink: Send + Sync {
    fn record(&self, record: UsageRecord);
}

/// Emits each record as a structured log event.
#[derive(Debug, Clone, Default)]
pub struct TracingUsageSink;

impl UsageSink for TracingUsageSink {
    fn record(&self, record: UsageRecord) {
        tracing::info!(
            id = %record.id,
            task = %record.task,
            tier = %record.tier,
            provider = %record.provider,
            model = %record.model,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            thinking_tokens = ?record.thinking_tokens,
            credits = record.credit_cost,
            latency_ms = record.latency_ms,
            "AI usage"
        );
    }
}

/// Discards records.
#[derive(Debug, Clone, Default)]
pub struct NoopUsageSink;

impl UsageSink for NoopUsageSink {
    fn record(&self, _record: UsageRecord) {}
}

/// Forwards each record to several sinks.
#[derive(Clone, Default)]
pub struct FanoutUsageSink {
    sinks: Vec<Arc<dyn UsageSink>>,
}

impl FanoutUsageSink {
    pub fn new(sinks: Vec<Arc<dyn UsageSink>>) -> Self {
        Self { sinks }
    }
}

impl UsageSink for FanoutUsageSink {
    fn record(&self, record: UsageRecord) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(record.clone());
            }
            last.record(record);
        }
    }
}
