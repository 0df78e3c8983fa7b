//! Human-facing HTTP API.
//!
//! Exposes the boundary operations of the rendezvous: query creation from
//! the agent side, pending listing and answer submission from the human
//! side, a poll endpoint for transports without a reachable callback, the
//! callback receiver for the agent side, and a health projection.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::oneshot;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::HttpSettings;
use crate::error::{Error, Result};
use crate::human_input::{CallbackPayload, PendingQuery, QueryLifecycleController, QueryRequest};

/// Response to query creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueryResponse {
    /// Id of the created query
    pub query_id: String,
    /// Human-readable acknowledgment
    pub message: String,
}

/// Body for answer submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondRequest {
    /// The answer text
    pub response: String,
}

/// Poll result for a single query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseCheck {
    /// Query id
    pub query_id: String,
    /// The answer, if one has been recorded
    pub response: Option<String>,
    /// Whether an answer is available
    pub is_ready: bool,
}

/// Health projection with per-state query counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthBody {
    /// Service status
    pub status: String,
    /// Service name
    pub service: String,
    /// Queries waiting for an answer
    pub pending_queries: usize,
    /// Queries resolved with an answer
    pub answered_queries: usize,
    /// Queries resolved by timeout
    pub expired_queries: usize,
}

#[derive(Debug, Clone)]
struct AppState {
    controller: Arc<QueryLifecycleController>,
}

/// Error shape returned to HTTP callers: `{"detail": "..."}` with a
/// matching status code.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                detail: "Query not found".to_string(),
            },
            Error::AlreadyResolved => Self {
                status: StatusCode::BAD_REQUEST,
                detail: "Query already answered or expired".to_string(),
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: other.to_string(),
            },
        }
    }
}

/// HTTP server exposing the human query API.
///
/// The server runs in a background task; `start` binds the configured
/// address (port 0 picks a free port and is reported back) and `stop`
/// triggers a graceful shutdown through a oneshot channel.
#[derive(Debug)]
pub struct HumanApiServer {
    controller: Arc<QueryLifecycleController>,
    config: HttpSettings,
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: Option<SocketAddr>,
}

impl HumanApiServer {
    /// Create a server over the given controller
    pub fn new(controller: Arc<QueryLifecycleController>, config: HttpSettings) -> Self {
        Self {
            controller,
            config,
            shutdown_tx: None,
            local_addr: None,
        }
    }

    /// Build the router, for embedding into a larger application
    pub fn router(&self) -> Router {
        let state = AppState {
            controller: Arc::clone(&self.controller),
        };

        let origins: Vec<HeaderValue> = self
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true);

        Router::new()
            .route("/query", post(create_query))
            .route("/pending-queries", get(pending_queries))
            .route("/respond/:query_id", post(submit_response))
            .route("/query/:query_id/response", get(check_response))
            .route("/callback", post(receive_callback))
            .route("/health", get(health))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the server in a background task and return the bound address
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);

        let app = self.router();
        info!("Starting human query API on {}", local_addr);

        tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                info!("Human query API shutting down");
            });
            if let Err(e) = serve.await {
                error!("Human query API server error: {}", e);
            }
        });

        Ok(local_addr)
    }

    /// Address the server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Trigger a graceful shutdown
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn create_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Json<CreateQueryResponse> {
    let query_id = state.controller.submit_query(request).await;
    Json(CreateQueryResponse {
        query_id,
        message: "Query received. Waiting for human response.".to_string(),
    })
}

async fn pending_queries(State(state): State<AppState>) -> Json<Vec<PendingQuery>> {
    Json(state.controller.list_pending_queries().await)
}

async fn submit_response(
    State(state): State<AppState>,
    Path(query_id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    state.controller.submit_answer(&query_id, body.response).await?;
    Ok(Json(json!({ "message": "Response recorded successfully" })))
}

async fn check_response(
    State(state): State<AppState>,
    Path(query_id): Path<String>,
) -> std::result::Result<Json<ResponseCheck>, ApiError> {
    let query = state.controller.get_query(&query_id).await?;
    let is_ready = query.answer.is_some();
    Ok(Json(ResponseCheck {
        query_id,
        response: query.answer,
        is_ready,
    }))
}

async fn receive_callback(
    State(state): State<AppState>,
    Json(payload): Json<CallbackPayload>,
) -> Json<serde_json::Value> {
    let delivered = state
        .controller
        .resolve_callback(&payload.query_id, &payload.response)
        .await;

    if delivered {
        Json(json!({ "message": "Callback received successfully" }))
    } else {
        warn!(
            "Callback for unknown or completed query {}",
            payload.query_id
        );
        Json(json!({ "message": "Query ID not found or already completed" }))
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let stats = state.controller.stats().await;
    Json(HealthBody {
        status: "healthy".to_string(),
        service: "human-loop".to_string(),
        pending_queries: stats.pending,
        answered_queries: stats.answered,
        expired_queries: stats.expired,
    })
}
