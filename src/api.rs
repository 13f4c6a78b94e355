//! HTTP API.
//!
//! Routes:
//! - `GET /api/v1/glossary/semantic-search` semantic search with lexical fallback
//! - `GET /api/v1/glossary/search` keyword search
//! - `GET /health` service status
//! - `GET /metrics` Prometheus exposition

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::embedding::ProviderHealth;
use crate::error::{Error, Result};
use crate::filter::GENERIC_REJECTION_MESSAGE;
use crate::metrics::MetricsService;
use crate::search::{Rejection, SearchOrchestrator, SearchOutcome, SearchRequest, SearchResponse};

/// Shown for any server-side failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred. Please try again later.";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SearchOrchestrator>,
    pub corpus_size: usize,
    pub start_time: Instant,
    pub metrics: MetricsService,
}

impl AppState {
    pub fn new(orchestrator: Arc<SearchOrchestrator>, corpus_size: usize) -> Self {
        Self {
            orchestrator,
            corpus_size,
            start_time: Instant::now(),
            metrics: MetricsService::disabled(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsService) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Query string for both search routes. Numbers are parsed by hand so that a
/// malformed value is a 422 with a `detail` body like every other validation
/// error.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<String>,
    pub book_id: Option<String>,
}

impl SearchParams {
    fn into_request(self) -> std::result::Result<SearchRequest, ApiError> {
        let query = self
            .query
            .ok_or_else(|| ApiError::Validation("query parameter is required".to_string()))?;
        let limit = parse_number(self.limit.as_deref(), "limit")?;
        let book_id = parse_number(self.book_id.as_deref(), "book_id")?;
        Ok(SearchRequest {
            query,
            limit,
            book_id,
        })
    }
}

fn parse_number(raw: Option<&str>, name: &str) -> std::result::Result<Option<i64>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("{} must be an integer", name))),
    }
}

/// Caller-facing errors. Internal reasons never leave this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 422 with a disclosable message.
    Validation(String),
    /// 400 with the generic rejection message.
    Rejected,
    /// 500 with a generic message.
    Internal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::Rejected => (StatusCode::BAD_REQUEST, GENERIC_REJECTION_MESSAGE.to_string()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_MESSAGE.to_string(),
            ),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// Map a search outcome onto the HTTP contract.
fn respond(outcome: SearchOutcome) -> std::result::Result<Json<SearchResponse>, ApiError> {
    match outcome {
        SearchOutcome::Success { response, .. } => Ok(Json(response)),
        SearchOutcome::Rejected(Rejection::Validation(message)) => {
            Err(ApiError::Validation(message))
        }
        SearchOutcome::Rejected(Rejection::Content) => Err(ApiError::Rejected),
        SearchOutcome::ServerFailure(_) => Err(ApiError::Internal),
    }
}

/// `GET /health` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the provider or vector index is unreachable.
    pub status: String,
    pub version: String,
    pub uptime: u64,
    pub corpus_size: usize,
    pub blocked_words: usize,
    pub provider: ProviderHealth,
    pub vector_index: String,
    pub vector_index_available: bool,
}

async fn semantic_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> std::result::Result<Json<SearchResponse>, ApiError> {
    let request = params.into_request()?;
    respond(state.orchestrator.search(request).await)
}

async fn keyword_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> std::result::Result<Json<SearchResponse>, ApiError> {
    let request = params.into_request()?;
    respond(state.orchestrator.keyword_search(request).await)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    let (provider, index_available) = futures::join!(
        orchestrator.provider().health_check(),
        orchestrator.vector().is_available()
    );
    let healthy = provider.available && index_available;
    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        corpus_size: state.corpus_size,
        blocked_words: orchestrator.blocklist().snapshot().len(),
        provider,
        vector_index: orchestrator.vector().index_name().to_string(),
        vector_index_available: index_available,
    })
}

async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origin = if config.cors_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET])
        .allow_headers(Any)
}

/// Build the application router.
pub fn router(config: &ApiConfig, state: AppState) -> Router {
    let router = Router::new()
        .route("/api/v1/glossary/semantic-search", get(semantic_search))
        .route("/api/v1/glossary/search", get(keyword_search))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        router.layer(cors_layer(config))
    } else {
        router
    }
}

/// Fetch `GET {endpoint}/health` from a running service.
pub async fn fetch_health(endpoint: &str, timeout: Duration) -> Result<HealthResponse> {
    let url = format!("{}/health", endpoint.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .get(&url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::Api(format!("request to {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Api(format!("{} returned HTTP {}", url, status)));
    }

    response
        .json::<HealthResponse>()
        .await
        .map_err(|e| Error::Api(format!("invalid health response: {}", e)))
}

/// HTTP server wrapper.
pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    pub fn with_state(config: ApiConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        router(&self.config, self.state.clone())
    }

    /// Bind `addr` and serve until the task is cancelled.
    pub async fn run(&self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Api(format!("failed to bind {}: {}", addr, e)))?;
        info!("API server listening on {}", addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Api(format!("server error: {}", e)))
    }
}
