//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,course=debug,honkonomics_backend=debug,tower_http=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.

use tracing_subscriber::EnvFilter;

/// Log targets used across the crate. Filter directives refer to these names.
pub mod targets {
    /// Process lifecycle, config loading.
    pub const APP: &str = "honkonomics_backend";
    /// Per-request course pipeline stages.
    pub const COURSE: &str = "course";
    /// Chat proxy requests.
    pub const CHAT: &str = "chat";
    /// Outbound model calls (latency, token usage, never the key).
    pub const GEMINI: &str = "gemini";
}

const DEFAULT_FILTER: &str = "info,course=debug,chat=debug,gemini=debug,honkonomics_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // The two formats produce different subscriber types, so init each branch separately.
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
