//! HTTP request handlers.

use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::server::AppState;
use crate::credits::{self, CostInput, MINIMUM_CHARGE, RATE_CARDS, WEB_SEARCH_SURCHARGE};
use crate::error::Error;
use crate::router::{
    Execution, InvokeResponse, ProviderKind, RouteDecision, TaskCategory, TaskRequest, Tier,
};
use crate::usage::UsageRecord;

/// Response header: correlation ID (UUID v4).
pub const REQUEST_ID_HEADER: &str = "x-idealab-request-id";
/// Response header: credits charged for the call.
pub const CREDITS_HEADER: &str = "x-idealab-credits";
/// Response header: provider that handled the call.
pub const PROVIDER_HEADER: &str = "x-idealab-provider";
/// Response header: wall-clock latency in milliseconds.
pub const LATENCY_MS_HEADER: &str = "x-idealab-latency-ms";

/// Body of POST /v1/route.
#[derive(Debug, Default, Deserialize)]
pub struct RouteQuery {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub tier: String,
}

/// Body of a successful POST /v1/invoke.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeEnvelope {
    #[serde(flatten)]
    pub response: InvokeResponse,
    pub credit_cost: u64,
    pub route: RouteDecision,
    pub request_id: String,
}

/// Body of POST /v1/credits/estimate.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub credits: u64,
    pub provider: String,
    pub model: String,
    /// False when no rate card matched and only the floor applies.
    pub rated: bool,
}

/// Attach correlation headers. Credits and provider are only known on success.
fn attach_headers(
    response: &mut Response,
    request_id: &str,
    latency_ms: i64,
    provider: Option<ProviderKind>,
    credits: Option<u64>,
) {
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    headers.insert(
        HeaderName::from_static(LATENCY_MS_HEADER),
        HeaderValue::from(latency_ms.max(0) as u64),
    );
    if let Some(provider) = provider {
        headers.insert(
            HeaderName::from_static(PROVIDER_HEADER),
            HeaderValue::from_static(provider.as_str()),
        );
    }
    if let Some(credits) = credits {
        headers.insert(
            HeaderName::from_static(CREDITS_HEADER),
            HeaderValue::from(credits),
        );
    }
}

/// Handle POST /v1/route: select a route without calling any provider.
pub async fn select_route(
    State(state): State<AppState>,
    Json(query): Json<RouteQuery>,
) -> Result<Json<RouteDecision>, Error> {
    let task = TaskCategory::resolve(&query.task)?;
    let tier = Tier::resolve(&query.tier)?;
    let route = state.router.select_route(task, tier)?;
    Ok(Json(route))
}

/// Handle POST /v1/invoke: route, call the provider once, meter and record.
pub async fn invoke_task(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    tracing::info!(
        request_id = %request_id,
        task = %request.task,
        tier = %request.tier,
        "Received task"
    );

    let result = state.router.execute(&request).await;
    let latency_ms = start.elapsed().as_millis() as i64;

    match result {
        Ok(Execution {
            task,
            tier,
            route,
            response,
        }) => {
            let credits = credits::credit_cost(&response.usage.cost_input());

            tracing::info!(
                request_id = %request_id,
                task = %task,
                tier = %tier,
                provider = %route.provider,
                model = %route.model,
                credits,
                latency_ms,
                "Task completed"
            );

            state.usage.record(UsageRecord::new(
                request_id.clone(),
                task,
                tier,
                &response,
                credits,
                latency_ms,
            ));

            let mut http_response = Json(InvokeEnvelope {
                response,
                credit_cost: credits,
                route,
                request_id: request_id.clone(),
            })
            .into_response();
            attach_headers(
                &mut http_response,
                &request_id,
                latency_ms,
                Some(route.provider),
                Some(credits),
            );
            http_response
        }
        Err(e) => {
            let mut http_response = e.into_response();
            attach_headers(&mut http_response, &request_id, latency_ms, None, None);
            http_response
        }
    }
}

/// Handle POST /v1/credits/estimate.
pub async fn estimate_credits(Json(input): Json<CostInput>) -> Json<EstimateResponse> {
    let rated = credits::rate_card(&input.provider, &input.model).is_some();
    if !rated {
        tracing::debug!(
            provider = %input.provider,
            model = %input.model,
            "No rate card for estimate, charging minimum"
        );
    }

    Json(EstimateResponse {
        credits: credits::credit_cost(&input),
        provider: input.provider,
        model: input.model,
        rated,
    })
}

/// Handle GET /v1/credits/rates.
pub async fn list_rates() -> impl IntoResponse {
    Json(serde_json::json!({
        "rates": RATE_CARDS,
        "web_search_surcharge": WEB_SEARCH_SURCHARGE,
        "minimum_charge": MINIMUM_CHARGE,
    }))
}

/// Handle GET /v1/routes: the rule table in evaluation order.
pub async fn list_routes(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "rules": state.router.rules(),
        "missing_credential_policy": state.config.routing.missing_credential_policy,
        "secondary_available": state.router.secondary_available(),
    }))
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "idealab-router",
        "providers": {
            "primary": state.router.primary_available(),
            "secondary": state.router.secondary_available(),
        },
        "mock_responses": state.config.routing.mock_responses,
        "usage_db": state.read_db.is_some(),
    }))
}
