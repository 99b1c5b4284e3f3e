//! HTTP surface.
//!
//! Thin JSON layer over the pipeline: the handlers authorize, delegate, and
//! serialize. All policy (admission, caching, aggregation) lives below this
//! module, so every endpoint shares the same behavior.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{ConnectInfo, Json, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{ApiKeyAuthorizer, Authorizer};
use crate::claim::{analyze_sentiment, Sentiment, Verdict};
use crate::error::PipelineError;
use crate::fetch::PageFetcher;
use crate::pipeline::{Pipeline, SourceHealth};
use crate::store::SimilarVerdict;

struct ApiError(PipelineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PipelineError::AdmissionDenied { caller } => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("rate limit exceeded for {caller}"),
            ),
            PipelineError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "invalid or missing API key".to_string())
            }
            PipelineError::Extraction => (
                StatusCode::BAD_REQUEST,
                "no checkable claims found in input".to_string(),
            ),
            PipelineError::Internal(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("internal error: {e}"))
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub fetcher: Arc<PageFetcher>,
    pub authorizer: Arc<ApiKeyAuthorizer>,
}

/// Resolve the request's caller identity or reject with 401.
fn caller_of(state: &AppState, headers: &HeaderMap, addr: &SocketAddr) -> Result<String, ApiError> {
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    let ip = addr.ip().to_string();
    state
        .authorizer
        .authorize(presented, &ip)
        .ok_or(ApiError(PipelineError::Unauthorized))
}

#[derive(Deserialize)]
struct TextRequest {
    text: String,
}

#[derive(Deserialize)]
struct UrlRequest {
    url: String,
}

#[derive(Deserialize)]
struct VerifyRequest {
    claim: String,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    sentiment: Sentiment,
    claims: Vec<String>,
    verdicts: Vec<Verdict>,
    elapsed_ms: u64,
}

#[derive(Serialize)]
struct AnalyzeUrlResponse {
    url: String,
    #[serde(flatten)]
    analysis: AnalyzeResponse,
}

#[derive(Serialize)]
struct ClaimsResponse {
    verdicts: Vec<Verdict>,
}

#[derive(Deserialize)]
struct SimilarRequest {
    text: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
struct SimilarResponse {
    matches: Vec<SimilarVerdict>,
}

#[derive(Deserialize)]
struct ClaimsQuery {
    #[serde(default = "default_claims_limit")]
    limit: usize,
}

fn default_claims_limit() -> usize {
    20
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    embedder_available: bool,
    cached_verdicts: usize,
    sources: Vec<SourceHealth>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/analyze_url", post(analyze_url))
        .route("/verify", post(verify))
        .route("/similar_claims", post(similar_claims))
        .route("/claims", get(claims))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState, bind_addr: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "claim verification service listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "claimspotter",
        "endpoints": ["/health", "/analyze", "/analyze_url", "/verify", "/similar_claims", "/claims"],
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        embedder_available: state.pipeline.embedder_available(),
        cached_verdicts: state.pipeline.store().len().await,
        sources: state.pipeline.source_health(),
    })
}

/// Extract, sentiment-score, and verify every claim in `text`.
async fn analyze_text(state: &AppState, caller: &str, text: &str) -> Result<AnalyzeResponse, ApiError> {
    let started = std::time::Instant::now();
    let claims = state.pipeline.extract_claims(text);
    let verdicts = state.pipeline.verify_batch(caller, text).await?;
    Ok(AnalyzeResponse {
        sentiment: analyze_sentiment(text),
        claims,
        verdicts,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

async fn analyze(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<TextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_of(&state, &headers, &addr)?;
    Ok(Json(analyze_text(&state, &caller, &req.text).await?))
}

async fn analyze_url(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<UrlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_of(&state, &headers, &addr)?;
    let text = state
        .fetcher
        .fetch_text(&req.url)
        .await
        .map_err(PipelineError::Internal)?;
    let analysis = analyze_text(&state, &caller, &text).await?;
    Ok(Json(AnalyzeUrlResponse {
        url: req.url,
        analysis,
    }))
}

async fn verify(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_of(&state, &headers, &addr)?;
    let verdict = state.pipeline.verify(&caller, &req.claim).await?;
    Ok(Json(verdict))
}

async fn similar_claims(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<SimilarRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller_of(&state, &headers, &addr)?;
    let matches = state.pipeline.similar_claims(&req.text, req.top_k).await?;
    Ok(Json(SimilarResponse { matches }))
}

async fn claims(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ClaimsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    caller_of(&state, &headers, &addr)?;
    let verdicts = state.pipeline.store().recent(query.limit).await;
    Ok(Json(ClaimsResponse { verdicts }))
}
