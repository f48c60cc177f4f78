//! Error taxonomy for course generation and the chat proxy, and its mapping
//! to HTTP responses.
//!
//! Every failure a handler can produce ends up as a JSON body with a
//! human-readable `error` and optional `details`/`raw` diagnostics.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::Value;

use crate::protocol::ErrorOut;

pub type Result<T> = std::result::Result<T, CourseError>;

#[derive(Debug, thiserror::Error)]
pub enum CourseError {
  /// Missing or blank topic.
  #[error("Missing 'topic'")]
  Input,

  /// Chat request without any message.
  #[error("Missing 'messages'")]
  NoMessages,

  /// Request body could not be decoded.
  #[error("Invalid request body: {0}")]
  BadBody(String),

  /// Neither GEMINI_API_KEY nor GOOGLE_API_KEY is configured.
  #[error("Server missing GEMINI_API_KEY/GOOGLE_API_KEY")]
  Config,

  /// The model endpoint answered with a non-success status.
  #[error("Gemini request failed: {status}")]
  Upstream {
    status: reqwest::StatusCode,
    details: Option<String>,
  },

  /// Well-formed upstream response without extractable text.
  #[error("No content returned from Gemini")]
  EmptyResponse,

  /// Extracted text is not valid JSON.
  #[error("Failed to parse Gemini JSON: {message}")]
  Parse { message: String, raw: String },

  /// JSON parsed but lacks a title or a lessons array.
  #[error("Invalid MiniCourse structure: {reason}")]
  Schema { reason: String, value: Value },

  /// Resource policy could not produce a usable list. Recovered locally, never sent.
  #[error("Resource sanitization failed: {0}")]
  Sanitization(String),

  /// Network failure or undecodable envelope from the model endpoint.
  /// Build with [`CourseError::transport`] so the keyed URL is stripped.
  #[error("Gemini transport error: {0}")]
  Transport(reqwest::Error),
}

impl CourseError {
  pub fn transport(e: reqwest::Error) -> Self {
    CourseError::Transport(e.without_url())
  }

  pub fn status(&self) -> StatusCode {
    match self {
      CourseError::Input | CourseError::NoMessages | CourseError::BadBody(_) => StatusCode::BAD_REQUEST,
      CourseError::Config => StatusCode::INTERNAL_SERVER_ERROR,
      CourseError::Upstream { .. }
      | CourseError::EmptyResponse
      | CourseError::Parse { .. }
      | CourseError::Schema { .. } => StatusCode::BAD_GATEWAY,
      CourseError::Sanitization(_) | CourseError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Stable short name used in logs.
  pub fn kind(&self) -> &'static str {
    match self {
      CourseError::Input => "input",
      CourseError::NoMessages => "no_messages",
      CourseError::BadBody(_) => "bad_body",
      CourseError::Config => "config",
      CourseError::Upstream { .. } => "upstream",
      CourseError::EmptyResponse => "empty_response",
      CourseError::Parse { .. } => "parse",
      CourseError::Schema { .. } => "schema",
      CourseError::Sanitization(_) => "sanitization",
      CourseError::Transport(_) => "transport",
    }
  }

  fn to_body(&self) -> ErrorOut {
    match self {
      CourseError::Input | CourseError::NoMessages | CourseError::Config | CourseError::EmptyResponse => {
        ErrorOut::new(self.to_string())
      }
      CourseError::BadBody(details) => ErrorOut::new("Invalid request body").with_details(details.clone()),
      CourseError::Upstream { status, details } => {
        let mut out = ErrorOut::new(format!(
          "Gemini request failed: {} {}",
          status.as_u16(),
          status.canonical_reason().unwrap_or("")
        ).trim_end().to_string());
        out.details = details.clone();
        out
      }
      CourseError::Parse { message, raw } => ErrorOut::new("Failed to parse Gemini JSON")
        .with_details(message.clone())
        .with_raw(Value::String(raw.clone())),
      CourseError::Schema { reason, value } => ErrorOut::new("Invalid MiniCourse structure")
        .with_details(reason.clone())
        .with_raw(value.clone()),
      CourseError::Sanitization(_) | CourseError::Transport(_) => {
        ErrorOut::new("Unhandled error").with_details(self.to_string())
      }
    }
  }
}

impl IntoResponse for CourseError {
  fn into_response(self) -> Response {
    (self.status(), Json(self.to_body())).into_response()
  }
}
