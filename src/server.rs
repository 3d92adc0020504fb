//! HTTP surface of the status gate.

use std::error::Error as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Path, Request, State},
    http::{
        Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};
use http_body_util::LengthLimitError;
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::GateError;
use crate::gate::StatusGate;
use crate::project::ProjectKey;
use crate::wire::UpdateResponse;

/// Request bodies above this size are refused with 413.
const MAX_BODY_BYTES: usize = 1024 * 1024;

const USER_ID_HEADER: &str = "x-user-id";

pub struct AppState {
    pub gate: StatusGate,
}

pub type SharedState = Arc<AppState>;

/// Identity established by an upstream authentication layer. When present
/// as a request extension it takes precedence over the `x-user-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaims {
    pub sub: String,
}

// ── Error handling ────────────────────────────────────────────────────

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match &self {
            GateError::InvalidStatus { allowed, .. } => {
                json!({"error": self.to_string(), "allowed": allowed})
            }
            GateError::MalformedQuestion { index, reason } => {
                json!({"error": self.to_string(), "index": index, "details": reason})
            }
            GateError::Upstream { status, body } => {
                json!({"error": self.to_string(), "status": status, "body": body})
            }
            GateError::Store(e) => {
                json!({"error": "Internal server error", "details": e.to_string()})
            }
            GateError::Webhook(e) => {
                json!({"error": "Internal server error", "details": e.to_string()})
            }
            _ => json!({"error": self.to_string()}),
        };

        if self.is_client_error() || matches!(self, GateError::Upstream { .. }) {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        } else {
            error!(error = %self, "request failed");
        }
        (status, Json(body)).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/projects/{project_id}",
            get(get_project)
                .put(update_project)
                .post(update_project)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route("/projects", missing_project_id())
        .route("/projects/", missing_project_id())
        .layer(middleware::from_fn(request_span))
        .layer(cors_header(ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .layer(cors_header(ACCESS_CONTROL_ALLOW_HEADERS, "content-type,x-user-id"))
        .layer(cors_header(ACCESS_CONTROL_ALLOW_METHODS, "OPTIONS,PUT,POST,GET"))
        .with_state(state)
}

fn missing_project_id() -> MethodRouter<SharedState> {
    MethodRouter::new()
        .put(reject_missing_project_id)
        .post(reject_missing_project_id)
        .options(preflight)
        .fallback(method_not_allowed)
}

fn cors_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

async fn request_span(req: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %req.method(),
        path = %req.uri().path(),
    );
    next.run(req).instrument(span).await
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method Not Allowed"})),
    )
        .into_response()
}

async fn reject_missing_project_id(req: Request) -> Result<Response, GateError> {
    caller_identity(req.extensions(), req.headers()).ok_or(GateError::MissingIdentity)?;
    Err(GateError::MissingProjectId)
}

async fn get_project(
    State(state): State<SharedState>,
    Path(project_id): Path<String>,
    req: Request,
) -> Result<Response, GateError> {
    let key = project_key(&req, project_id)?;
    let record = state.gate.fetch(&key).await?;
    Ok(Json(record).into_response())
}

async fn update_project(
    State(state): State<SharedState>,
    Path(project_id): Path<String>,
    req: Request,
) -> Result<Response, GateError> {
    let method = req.method().to_string();
    let key = project_key(&req, project_id)?;

    let body = read_body(req.into_body()).await?;
    let outcome = state.gate.apply(&key, &body).await?;
    info!(
        %key,
        review = outcome.review_updated,
        forwarded = outcome.forwarded,
        "update accepted"
    );
    Ok(Json(UpdateResponse::from_outcome(outcome, method)).into_response())
}

fn project_key(req: &Request, project_id: String) -> Result<ProjectKey, GateError> {
    let user_id =
        caller_identity(req.extensions(), req.headers()).ok_or(GateError::MissingIdentity)?;
    if project_id.trim().is_empty() {
        return Err(GateError::MissingProjectId);
    }
    Ok(ProjectKey::new(user_id, project_id))
}

/// Authenticated subject first, then the `x-user-id` header.
fn caller_identity(extensions: &Extensions, headers: &HeaderMap) -> Option<String> {
    let from_claims = extensions
        .get::<AuthClaims>()
        .map(|claims| claims.sub.trim())
        .filter(|sub| !sub.is_empty());
    let from_header = || {
        headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    };
    from_claims.or_else(from_header).map(str::to_string)
}

async fn read_body(body: Body) -> Result<Vec<u8>, GateError> {
    match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => Ok(bytes.to_vec()),
        Err(e) if e.source().is_some_and(|s| s.is::<LengthLimitError>()) => {
            Err(GateError::PayloadTooLarge {
                limit: MAX_BODY_BYTES,
            })
        }
        Err(e) => Err(GateError::UnreadableBody(e.to_string())),
    }
}

// ── Serving ───────────────────────────────────────────────────────────

/// Bind `addr` and serve until Ctrl+C.
pub async fn serve(addr: &str, state: SharedState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "deckgate listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
