//! HTTP front door.
//!
//! Exposes the assistant via a small JSON API so chat front-ends can submit
//! queries and display the returned text.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer one free-text query |
//! | `GET`  | `/routes` | List registered intent routes |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Request-level errors use the JSON shape
//! `{ "error": { "code": "bad_request", "message": "query must not be empty" } }`.
//! Pipeline failures are not HTTP errors: [`Assistant::ask`] already maps
//! every failure to a user-displayable answer string.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! chat clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::pipeline::Assistant;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

/// Start the HTTP server on the configured bind address.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config, assistant: Arc<Assistant>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState { assistant };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ask", post(handle_ask))
        .route("/routes", get(handle_routes))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("storebot listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /routes ============

#[derive(Serialize)]
struct RouteInfo {
    name: String,
    utterances: usize,
}

#[derive(Serialize)]
struct RoutesResponse {
    routes: Vec<RouteInfo>,
}

async fn handle_routes(State(state): State<AppState>) -> Json<RoutesResponse> {
    let routes = state
        .assistant
        .router()
        .routes()
        .iter()
        .map(|r| RouteInfo {
            name: r.name.clone(),
            utterances: r.utterances.len(),
        })
        .collect();

    Json(RoutesResponse { routes })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    query: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let answer = state.assistant.ask(req.query.trim()).await;
    Ok(Json(AskResponse { answer }))
}
