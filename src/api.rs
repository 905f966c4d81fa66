//! REST API server for the ask router
//!
//! POST /ask, GET /warmup and GET /health. Every OPTIONS request is
//! answered by the CORS layer; its body is rewritten to an empty JSON object.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::map_response,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::AskService;
use crate::models::{AskRequest, AskResponse};
use crate::Result;

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<AskService>,
}

/// =============================
/// Handlers
/// =============================

async fn ask(State(state): State<ApiState>, Json(req): Json<AskRequest>) -> Json<AskResponse> {
    Json(state.service.ask(&req.question, &req.session_id).await)
}

async fn warmup(State(state): State<ApiState>) -> Json<Value> {
    let status = state.service.warmup().await;
    Json(json!({ "status": status }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn preflight_body(method: Method, response: Response) -> Response {
    if method != Method::OPTIONS || !response.status().is_success() {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from("{}"))
}

/// =============================
/// Router
/// =============================

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_router(service: Arc<AskService>, cors_origins: &[String]) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/ask", post(ask))
        .route("/warmup", get(warmup))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors_layer(cors_origins))
        .layer(map_response(preflight_body))
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(service: Arc<AskService>, port: u16, cors_origins: &[String]) -> Result<()> {
    let router = create_router(service, cors_origins);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Could not listen for shutdown signal"),
    }
}
