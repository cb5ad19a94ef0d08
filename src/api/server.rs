//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::handlers::{self, GenerateReply};
use super::models::{ApiResponse, GenerateRequest};
use crate::auth::IdentityResolver;
use crate::config::Config;
use crate::error::PipelineError;
use crate::jobs::JobOrchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub config: Arc<Config>,
}

/// Configure and start the HTTP server
pub async fn start_http_server(state: AppState, port: u16) -> Result<()> {
    info!("🚀 Starting HTTP server on port {}", port);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/chapters/generate-job", post(generate_job_handler))
        .route("/api/chapters/generate", post(generate_sync_handler))
        .route("/api/chapters/job-status/:job_id", get(job_status_handler))
        .route("/api/credits/balance", get(balance_handler))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🌐 API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn failure(error: &PipelineError) -> Response {
    let status = handlers::error_status(error);
    (
        status,
        Json(ApiResponse::<serde_json::Value>::error(error.to_string())),
    )
        .into_response()
}

fn reply_response(reply: GenerateReply) -> Response {
    match reply {
        GenerateReply::Cached(payload) => {
            (StatusCode::OK, Json(ApiResponse::success(serde_json::json!(payload)))).into_response()
        }
        GenerateReply::Accepted(payload) => {
            (StatusCode::OK, Json(ApiResponse::success(serde_json::json!(payload)))).into_response()
        }
        GenerateReply::Finished(payload) => {
            (StatusCode::OK, Json(ApiResponse::success(serde_json::json!(payload)))).into_response()
        }
    }
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "ok", "service": "chapterizer"})),
    )
}

/// Submit a generation job
async fn generate_job_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let account_id = match handlers::resolve_account(&state, &headers).await {
        Ok(account_id) => account_id,
        Err(e) => return failure(&e),
    };

    match handlers::submit_generation(&state, &account_id, &request.video_id, request.force_refresh)
        .await
    {
        Ok(reply) => reply_response(reply),
        Err(e) => failure(&e),
    }
}

/// Synchronous-compatibility generation route
async fn generate_sync_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let account_id = match handlers::resolve_account(&state, &headers).await {
        Ok(account_id) => account_id,
        Err(e) => return failure(&e),
    };

    match handlers::submit_generation_sync(
        &state,
        &account_id,
        &request.video_id,
        request.force_refresh,
    )
    .await
    {
        Ok(reply) => reply_response(reply),
        Err(e) => failure(&e),
    }
}

/// Poll job status
async fn job_status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Response {
    let account_id = match handlers::resolve_account(&state, &headers).await {
        Ok(account_id) => account_id,
        Err(e) => return failure(&e),
    };

    match handlers::job_status(&state, &account_id, &job_id).await {
        Ok(payload) => {
            (StatusCode::OK, Json(ApiResponse::success(payload))).into_response()
        }
        Err(e) => failure(&e),
    }
}

/// Read the caller's credit balance
async fn balance_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let account_id = match handlers::resolve_account(&state, &headers).await {
        Ok(account_id) => account_id,
        Err(e) => return failure(&e),
    };

    match handlers::credit_balance(&state, &account_id).await {
        Ok(payload) => {
            (StatusCode::OK, Json(ApiResponse::success(payload))).into_response()
        }
        Err(e) => failure(&e),
    }
}
