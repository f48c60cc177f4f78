//! Router assembly: HTTP endpoints, static files, CORS, HTTP tracing, and the
//! panic catch-all.

use std::{any::Any, sync::Arc};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, Level};

use crate::protocol::ErrorOut;
use crate::state::AppState;
use crate::telemetry::targets;

pub mod http;

/// Build the application router with:
/// - `POST /api/learn` course generation
/// - `POST /api/v1/chat` chat proxy
/// - `GET /api/v1/health`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers); tighten for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
/// - Panics inside handlers turn into a JSON 500
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    api_router(state).fallback_service(static_service)
}

fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/learn", post(http::http_post_learn))
        .route("/api/v1/chat", post(http::http_post_chat))
        .route("/api/v1/health", get(http::http_health))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(target: targets::APP, %details, "Handler panicked");
    let body = ErrorOut::new("Unhandled error").with_details(details);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
