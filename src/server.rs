//! HTTP JSON server.
//!
//! Exposes the transaction assistant to the dashboard (or any other client)
//! over a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version, model and data source) |
//! | `POST` | `/query` | Ask a question: `{query, deal?, department?}` |
//! | `GET`  | `/tools/list` | List deal tools |
//! | `POST` | `/tools/{name}` | Run a deal tool: `{deal, department?}` |
//! | `GET`  | `/stats` | Deal readiness and portfolio KPIs (`?department=`) |
//!
//! `/query` and `/tools/{name}` always answer `200` with a `ChatResponse`
//! once the request itself is valid; completion failures arrive as fallback
//! text with a `failure` class, never as HTTP errors.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser dashboard
//! can call the API directly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::assistant::TransactionAssistant;
use crate::completion::create_service;
use crate::config::Config;
use crate::models::{DealScope, DepartmentScope};
use crate::snapshot::JsonDirSnapshot;
use crate::stats::{portfolio_summary, PortfolioSummary};
use crate::synthesizer::ChatResponse;
use crate::tools::{tool_infos, DealTool, ToolInfo};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    assistant: Arc<TransactionAssistant>,
}

/// Starts the HTTP server with the data directory and completion service
/// named in `config`.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let snapshots = Arc::new(JsonDirSnapshot::new(config.data.dir.clone()));
    let service = create_service(&config.completion)?;
    let assistant = Arc::new(TransactionAssistant::new(snapshots, service, config));
    run_server_with(&config.server.bind, assistant).await
}

/// Starts the HTTP server around an already-built assistant.
///
/// Used by tests and embedding callers that supply their own snapshot
/// provider or completion service.
pub async fn run_server_with(
    bind_addr: &str,
    assistant: Arc<TransactionAssistant>,
) -> anyhow::Result<()> {
    let app = router(assistant);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    println!("Links Transaction AI listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router. Exposed for in-process use.
pub fn router(assistant: Arc<TransactionAssistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/query", post(handle_query))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/stats", get(handle_stats))
        .layer(cors)
        .with_state(AppState { assistant })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

fn parse_department(raw: Option<&str>) -> Result<DepartmentScope, AppError> {
    match raw {
        Some(s) => s
            .parse::<DepartmentScope>()
            .map_err(|e| bad_request(e.to_string())),
        None => Ok(DepartmentScope::All),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
    model: String,
    /// Where datasets are read from.
    data: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.assistant.model_name().to_string(),
        data: state.assistant.data_source(),
    })
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
    /// Deal name or `"All"`; absent means all deals.
    #[serde(default)]
    deal: Option<String>,
    #[serde(default)]
    department: Option<String>,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let deal_scope = req
        .deal
        .as_deref()
        .map(DealScope::parse)
        .unwrap_or_default();
    let department_scope = parse_department(req.department.as_deref())?;

    let response = state
        .assistant
        .query(&req.query, &deal_scope, &department_scope)
        .await;
    Ok(Json(response))
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools() -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: tool_infos(),
    })
}

// ============ POST /tools/{name} ============

#[derive(Deserialize)]
struct ToolRequest {
    #[serde(default)]
    deal: String,
    #[serde(default)]
    department: Option<String>,
}

/// Returns `404` for an unknown tool and `400` when `deal` is empty.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<ToolRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let tool: DealTool = name
        .parse()
        .map_err(|e: crate::tools::UnknownTool| not_found(e.to_string()))?;

    if req.deal.trim().is_empty() {
        return Err(bad_request("deal must not be empty"));
    }
    let department_scope = parse_department(req.department.as_deref())?;

    let response = state
        .assistant
        .run_deal_tool(tool, &req.deal, &department_scope)
        .await;
    Ok(Json(response))
}

// ============ GET /stats ============

#[derive(Deserialize)]
struct StatsParams {
    department: Option<String>,
}

async fn handle_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<PortfolioSummary>, AppError> {
    let department_scope = parse_department(params.department.as_deref())?;
    let snapshot = state
        .assistant
        .snapshot()
        .map_err(|e| internal(format!("{:#}", e)))?;
    Ok(Json(portfolio_summary(&snapshot, &department_scope)))
}
