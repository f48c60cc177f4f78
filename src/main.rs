//! Honkonomics · Course Generation Backend
//!
//! - Axum HTTP API: `POST /api/learn` builds an AI mini-course for a topic
//! - Gemini `generateContent` integration (credential via environment)
//! - Resource links filtered against an allow-list before they reach the client
//! - `POST /api/v1/chat`: non-streaming chat with the Honk tutor persona
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   GEMINI_API_KEY     : model credential (GOOGLE_API_KEY accepted as fallback)
//!   GEMINI_BASE_URL    : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL       : default "gemini-1.5-flash"
//!   COURSE_CONFIG_PATH : path to TOML config (prompts, model tuning, resource policy, chat defaults)
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod prompt;
mod gemini;
mod parse;
mod sanitize;
mod state;
mod protocol;
mod pipeline;
mod chat;
mod routes;
#[cfg(test)]
mod test_support;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;
use crate::telemetry::targets;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared read-only state: prompts, resource policy, chat defaults, optional Gemini client.
  let state = Arc::new(AppState::from_env());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: targets::APP, %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: targets::APP, "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: targets::APP, error = %e, "Could not install Ctrl-C handler; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: targets::APP, "Shutdown signal received");
}
