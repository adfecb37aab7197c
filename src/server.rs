//! HTTP surface: routes, cross-origin policy, and error mapping.
//!
//! | Route | Body | Success |
//! |-------|------|---------|
//! | `POST /rizzing` | multipart, file field `image` | `{"line": …}` |
//! | `POST /reply` | JSON `{"text": …}` | `{"reply": …}` |
//! | `GET /health` | — | `OK` |
//!
//! Requests whose `Origin` is neither on the allow-list nor the server's own
//! origin are refused with 403 before any handler runs. Allowed origins get
//! the usual CORS headers for `GET` and `POST`.
//!
//! Internal failures are logged with their cause and answered with one fixed
//! message per route.

use crate::config::{ApiKey, API_KEY_HEADER};
use crate::error::RizzError;
use crate::rizz::RizzPipeline;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::header::{CONTENT_TYPE, HOST, ORIGIN};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Multipart field carrying the screenshot.
pub const IMAGE_FIELD: &str = "image";

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LineResponse {
    pub line: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Which flow failed; selects the generic message a caller sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    OpeningLine,
    Reply,
}

/// Every error a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    NoImage,
    NoConversationText,
    ApiKeyRequired,
    OriginNotAllowed,
    Internal(Flow),
}

impl ApiError {
    /// Log the cause and collapse it into the flow's generic error.
    fn internal(flow: Flow, err: RizzError) -> Self {
        error!(stage = err.stage(), ?flow, "Request failed: {}", err);
        ApiError::Internal(flow)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoImage | ApiError::NoConversationText => StatusCode::BAD_REQUEST,
            ApiError::ApiKeyRequired => StatusCode::UNAUTHORIZED,
            ApiError::OriginNotAllowed => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::NoImage => "No image uploaded",
            ApiError::NoConversationText => "No conversation text provided",
            ApiError::ApiKeyRequired => "API key required",
            ApiError::OriginNotAllowed => "Not allowed by CORS",
            ApiError::Internal(Flow::OpeningLine) => "Something went wrong on our end!",
            ApiError::Internal(Flow::Reply) => "Failed to generate reply",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ── Router ───────────────────────────────────────────────────────────────

/// Build the application router around a ready pipeline.
pub fn build_router(pipeline: RizzPipeline) -> Router {
    let config = pipeline.config();

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring unusable allowed origin {:?}", o);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)]);

    Router::new()
        .route("/health", get(health))
        .route("/rizzing", post(rizzing))
        .route("/reply", post(reply))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            pipeline.clone(),
            reject_foreign_origin,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(pipeline: RizzPipeline) -> std::io::Result<()> {
    let addr: SocketAddr = pipeline.config().socket_addr();
    let app = build_router(pipeline);

    let listener = TcpListener::bind(addr).await?;
    info!("Backend running on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

// ── Middleware ───────────────────────────────────────────────────────────

/// Refuse cross-origin requests from origins not on the allow-list.
///
/// Requests without an `Origin` header (curl, server-to-server) and requests
/// whose origin matches the `Host` they were sent to pass through.
async fn reject_foreign_origin(
    State(pipeline): State<RizzPipeline>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    if let Some(origin) = headers.get(ORIGIN) {
        let allowed = origin.to_str().is_ok_and(|origin| {
            pipeline.config().is_origin_allowed(origin) || is_same_origin(origin, headers)
        });
        if !allowed {
            warn!("Rejected request from origin {:?}", origin);
            return ApiError::OriginNotAllowed.into_response();
        }
    }
    next.run(request).await
}

fn is_same_origin(origin: &str, headers: &HeaderMap) -> bool {
    let Some(host) = headers.get(HOST).and_then(|h| h.to_str().ok()) else {
        return false;
    };
    origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
        .is_some_and(|rest| rest == host)
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "OK"
}

/// `POST /rizzing` — screenshot in, opening line out.
async fn rizzing(
    State(pipeline): State<RizzPipeline>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<LineResponse>, ApiError> {
    let image = match multipart {
        Ok(multipart) => read_image_field(multipart).await,
        Err(rejection) => {
            warn!("Unreadable multipart request: {}", rejection);
            None
        }
    }
    .ok_or(ApiError::NoImage)?;

    let api_key = resolve_api_key(&pipeline, &headers)?;

    let line = pipeline
        .opening_line_from_screenshot(&image, &api_key)
        .await
        .map_err(|e| ApiError::internal(Flow::OpeningLine, e))?;

    Ok(Json(LineResponse { line }))
}

/// `POST /reply` — conversation text in, reply out.
async fn reply(
    State(pipeline): State<RizzPipeline>,
    headers: HeaderMap,
    payload: Result<Json<ReplyRequest>, JsonRejection>,
) -> Result<Json<ReplyResponse>, ApiError> {
    let text = match payload {
        Ok(Json(body)) => body.text,
        Err(rejection) => {
            warn!("Unreadable reply request: {}", rejection);
            None
        }
    }
    .filter(|t| !t.is_empty())
    .ok_or(ApiError::NoConversationText)?;

    let api_key = resolve_api_key(&pipeline, &headers)?;

    let reply = pipeline
        .reply_to_conversation(&text, &api_key)
        .await
        .map_err(|e| ApiError::internal(Flow::Reply, e))?;

    Ok(Json(ReplyResponse { reply }))
}

fn resolve_api_key(pipeline: &RizzPipeline, headers: &HeaderMap) -> Result<ApiKey, ApiError> {
    let header = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    pipeline
        .config()
        .resolve_api_key(header)
        .ok_or(ApiError::ApiKeyRequired)
}

/// Bytes of the first non-empty `image` field, if any.
///
/// A malformed or oversized body counts as no image.
async fn read_image_field(mut multipart: Multipart) -> Option<Vec<u8>> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(IMAGE_FIELD) {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) if !bytes.is_empty() => return Some(bytes.to_vec()),
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Failed to read image field: {}", e);
                        return None;
                    }
                }
            }
            Ok(None) => return None,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                return None;
            }
        }
    }
}
