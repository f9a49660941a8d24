//! Chat HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat`, `/chat/` | Run one chat turn and stream the answer |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Streaming Contract
//!
//! A successful `POST /chat` returns `200` with
//! `content-type: text/event-stream; charset=utf-8` and
//! `x-vercel-ai-data-stream: v1`. The body is a sequence of
//! `<tag>:<json>\n` lines: up to ten `h:` citations, then `0:` text deltas.
//!
//! The response is not committed until retrieval has finished, so a
//! term-extraction or search failure is still a proper `500`. A failure after that point
//! is logged and the body is cut short.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "unprocessable_entity", "message": "messages must not be empty" } }
//! ```
//!
//! Error codes: `unprocessable_entity` (422), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for browser clients.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use repochat_core::events::encode_run;
use repochat_core::pipeline::{Pipeline, PipelineEvent};

use crate::config::Config;
use crate::pipeline::open_pipeline;
use crate::schema::ChatRequest;

/// Header announcing the Vercel AI data-stream protocol version.
pub const DATA_STREAM_HEADER: HeaderName = HeaderName::from_static("x-vercel-ai-data-stream");

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
}

/// Starts the chat server on `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let (pipeline, pool) = open_pipeline(config).await?;
    let app = router(pipeline);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("chat server listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

/// Build the router around an assembled pipeline.
pub fn router(pipeline: Pipeline) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/chat/", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { pipeline })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// Error type that converts into a JSON error response.
struct AppError {
    status: StatusCode,
    code: &'static str,
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

fn unprocessable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "unprocessable_entity",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /chat ============

/// Handler for `POST /chat`.
///
/// Every body rejection (bad JSON, wrong content type, missing or
/// ill-typed `messages`, unknown role) is reported as `422`.
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| unprocessable(e.body_text()))?;
    let conversation = request
        .into_state()
        .map_err(|e| unprocessable(e.to_string()))?;
    tracing::info!(messages = conversation.messages.len(), "chat turn started");

    let mut run = state.pipeline.run(conversation);

    // Retrieval finishes before the response is committed.
    let mut prelude = Vec::new();
    loop {
        match run.next().await {
            Some(Ok(event)) => {
                let retrieved = matches!(event, PipelineEvent::Retrieved { .. });
                prelude.push(Ok(event));
                if retrieved {
                    break;
                }
            }
            Some(Err(e)) if e.is_validation() => return Err(unprocessable(e.to_string())),
            Some(Err(e)) => {
                tracing::error!(error = %e, "chat pipeline failed");
                return Err(internal("chat pipeline failed"));
            }
            None => return Err(internal("chat pipeline failed")),
        }
    }

    let events = stream::iter(prelude).chain(run);
    let lines = encode_run(events).map(|line| {
        if let Err(e) = &line {
            tracing::error!(error = %e, "chat stream aborted");
        }
        line
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream; charset=utf-8"),
            (DATA_STREAM_HEADER, "v1"),
        ],
        Body::from_stream(lines),
    )
        .into_response())
}
