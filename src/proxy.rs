//! Caller-facing proxy: request/response envelope and HTTP routes.
//!
//! The dashboard posts `{ "filters": { ... } }` and receives the upstream
//! envelope shape with every page merged in, plus a `warning` when some
//! pages could not be retrieved.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::error::ErrorBody;
use crate::kpi::{calculate_kpis, SiteKpis};
use crate::site_activity::{AggregateResult, BatchFetcher, FetchError, Record};
use crate::types::SiteQuery;

// ============================================================================
// Envelope types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub filters: SiteQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub code: u16,
    pub status: String,
    pub data: ProxyData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyData {
    pub summary: ProxySummary,
    pub pagination: Pagination,
    pub sites: Vec<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySummary {
    /// Sites present in this response.
    pub total_sites: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
}

/// `total` is what upstream reported; `limit` is what was actually returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u64,
    pub offset: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiResponse {
    pub code: u16,
    pub status: String,
    pub data: KpiData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiData {
    pub kpis: SiteKpis,
    pub total_requested: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ProxyResponse {
    pub fn from_aggregate(query: &SiteQuery, aggregate: AggregateResult) -> Self {
        let warning = aggregate.warning();
        let date_range = (query.from.is_some() || query.to.is_some()).then(|| DateRange {
            from: query.from,
            to: query.to,
        });

        ProxyResponse {
            code: 200,
            status: "success".to_string(),
            data: ProxyData {
                summary: ProxySummary {
                    total_sites: aggregate.total_returned,
                    date_range,
                    agent_filter: query.agent_email.clone(),
                    warning,
                },
                pagination: Pagination {
                    limit: aggregate.total_returned,
                    offset: 0,
                    total: aggregate.total_requested,
                },
                sites: aggregate.records,
            },
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Fetch every page for the request's filters and wrap it in the envelope.
pub async fn handle_fetch(
    fetcher: &BatchFetcher,
    request: ProxyRequest,
) -> Result<ProxyResponse, FetchError> {
    log::info!("proxy: fetch-site-activity filters={:?}", request.filters);
    let aggregate = fetcher.fetch_all(&request.filters).await?;
    Ok(ProxyResponse::from_aggregate(&request.filters, aggregate))
}

/// Fetch every page and reduce it to pipeline KPIs.
pub async fn handle_kpis(
    fetcher: &BatchFetcher,
    request: ProxyRequest,
) -> Result<KpiResponse, FetchError> {
    log::info!("proxy: site-kpis filters={:?}", request.filters);
    let aggregate = fetcher.fetch_all(&request.filters).await?;
    Ok(KpiResponse {
        code: 200,
        status: "success".to_string(),
        data: KpiData {
            kpis: calculate_kpis(&aggregate.records),
            total_requested: aggregate.total_requested,
            warning: aggregate.warning(),
        },
    })
}

// ============================================================================
// Routes
// ============================================================================

pub struct ProxyState {
    pub fetcher: BatchFetcher,
}

type ProxyStateArc = Arc<ProxyState>;

/// `FetchError` rendered as a JSON `ErrorBody` with a matching status.
pub struct ProxyFailure(pub FetchError);

impl IntoResponse for ProxyFailure {
    fn into_response(self) -> Response {
        log::error!("proxy: request failed: {}", self.0);
        (self.0.http_status(), Json(ErrorBody::from(&self.0))).into_response()
    }
}

impl From<FetchError> for ProxyFailure {
    fn from(err: FetchError) -> Self {
        ProxyFailure(err)
    }
}

pub fn router(state: ProxyStateArc) -> Router {
    Router::new()
        .route("/fetch-site-activity", post(fetch_site_activity))
        .route("/site-kpis", post(site_kpis))
        .route("/health", get(health))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

async fn fetch_site_activity(
    State(state): State<ProxyStateArc>,
    Json(req): Json<ProxyRequest>,
) -> Result<Json<ProxyResponse>, ProxyFailure> {
    Ok(Json(handle_fetch(&state.fetcher, req).await?))
}

async fn site_kpis(
    State(state): State<ProxyStateArc>,
    Json(req): Json<ProxyRequest>,
) -> Result<Json<KpiResponse>, ProxyFailure> {
    Ok(Json(handle_kpis(&state.fetcher, req).await?))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
