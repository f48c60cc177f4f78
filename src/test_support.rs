//! Fake Gemini endpoint for tests: a local axum server that records every call
//! and answers with a canned status and body.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
  body::Bytes,
  extract::{Query, State},
  http::{header::CACHE_CONTROL, HeaderMap, StatusCode, Uri},
  response::IntoResponse,
  Router,
};
use serde_json::Value;
use tokio::net::TcpListener;

#[derive(Clone, Debug)]
pub struct RecordedCall {
  pub path: String,
  pub query: HashMap<String, String>,
  pub cache_control: Option<String>,
  pub body: Value,
}

#[derive(Clone)]
pub struct MockUpstream {
  status: StatusCode,
  body: String,
  calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockUpstream {
  pub fn raw(status: StatusCode, body: &str) -> Self {
    Self { status, body: body.to_string(), calls: Arc::default() }
  }

  pub fn json(status: StatusCode, body: Value) -> Self {
    Self::raw(status, &body.to_string())
  }

  /// Wrap `text` in a well-formed generateContent envelope.
  pub fn with_text(text: &str) -> Self {
    Self::json(
      StatusCode::OK,
      serde_json::json!({
        "candidates": [ { "content": { "role": "model", "parts": [ { "text": text } ] }, "finishReason": "STOP" } ],
        "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 20, "totalTokenCount": 30 }
      }),
    )
  }

  pub fn calls(&self) -> Vec<RecordedCall> {
    self.calls.lock().expect("calls lock").clone()
  }

  /// Serve on an ephemeral port; returns a base URL usable as `GeminiSettings::base_url`.
  pub async fn spawn(&self) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream addr");
    let app = Router::new().fallback(record).with_state(self.clone());
    tokio::spawn(async move {
      axum::serve(listener, app).await.expect("mock upstream serve");
    });
    format!("http://{addr}/v1beta")
  }
}

async fn record(
  State(mock): State<MockUpstream>,
  uri: Uri,
  headers: HeaderMap,
  Query(query): Query<HashMap<String, String>>,
  body: Bytes,
) -> impl IntoResponse {
  let call = RecordedCall {
    path: uri.path().to_string(),
    query,
    cache_control: headers.get(CACHE_CONTROL).and_then(|v| v.to_str().ok()).map(str::to_string),
    body: serde_json::from_slice(&body).unwrap_or(Value::Null),
  };
  mock.calls.lock().expect("calls lock").push(call);
  (mock.status, [("content-type", "application/json")], mock.body.clone())
}

/// Base URL of a loopback port nothing listens on.
pub async fn closed_base_url() -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind throwaway port");
  let addr = listener.local_addr().expect("throwaway port addr");
  drop(listener);
  format!("http://{addr}/v1beta")
}
