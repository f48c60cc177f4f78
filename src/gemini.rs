//! Minimal Gemini `generateContent` client.
//!
//! One POST per call, no retries, no caching. Course generation sends the
//! prompt as the only user message; the chat proxy sends a whole conversation
//! with a system instruction. Calls are instrumented and log model name,
//! latency and token usage (never the prompt contents nor the API key).

use std::time::{Duration, Instant};

use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::config::GeminiSettings;
use crate::error::{CourseError, Result};
use crate::telemetry::targets;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  settings: GeminiSettings,
}

/// Speaker of a conversation turn, as Gemini names it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
  User,
  Model,
}

impl Role {
  /// `assistant`, `model`, `ai` and `bot` (any case) are the model; anything else is the user.
  pub fn from_label(label: &str) -> Self {
    match label.trim().to_ascii_lowercase().as_str() {
      "assistant" | "model" | "ai" | "bot" => Role::Model,
      _ => Role::User,
    }
  }

  fn as_str(self) -> &'static str {
    match self {
      Role::User => "user",
      Role::Model => "model",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
  pub role: Role,
  pub text: String,
}

/// A multi-turn call. `model` may differ from the configured default.
pub struct ChatCall<'a> {
  pub model: &'a str,
  pub system_instruction: Option<&'a str>,
  pub turns: &'a [Turn],
  pub temperature: f32,
  pub max_output_tokens: u32,
}

impl GeminiClient {
  pub fn new(settings: GeminiSettings) -> std::result::Result<Self, reqwest::Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = settings.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    // Local emulators and test doubles must not go through a system proxy.
    if is_loopback(&settings.base_url) {
      builder = builder.no_proxy();
    }
    Ok(Self { client: builder.build()?, settings })
  }

  pub fn settings(&self) -> &GeminiSettings {
    &self.settings
  }

  /// Full endpoint URL for the configured model, without the key.
  pub fn endpoint(&self) -> String {
    self.endpoint_for(&self.settings.model)
  }

  fn endpoint_for(&self, model: &str) -> String {
    format!("{}/models/{}:generateContent", self.settings.base_url.trim_end_matches('/'), model)
  }

  /// Send `prompt` and return the decoded response envelope.
  ///
  /// Non-success statuses become [`CourseError::Upstream`] with whatever body
  /// could be read; network and decode failures become [`CourseError::Transport`].
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.settings.model, prompt_len = prompt.len()))]
  pub async fn generate(&self, prompt: &str) -> Result<Value> {
    let req = GenerateContentRequest {
      contents: vec![Content { role: Role::User.as_str(), parts: vec![Part { text: prompt }] }],
      system_instruction: None,
      generation_config: GenerationConfig { temperature: self.settings.temperature, max_output_tokens: None },
    };
    self.send(&self.settings.model, &req).await
  }

  /// Send a conversation; same error mapping as [`GeminiClient::generate`].
  #[instrument(level = "info", skip(self, call), fields(model = %call.model, turns = call.turns.len()))]
  pub async fn chat(&self, call: &ChatCall<'_>) -> Result<Value> {
    let req = GenerateContentRequest {
      contents: call
        .turns
        .iter()
        .map(|t| Content { role: t.role.as_str(), parts: vec![Part { text: &t.text }] })
        .collect(),
      system_instruction: call.system_instruction.map(|text| SystemInstruction { parts: vec![Part { text }] }),
      generation_config: GenerationConfig {
        temperature: call.temperature,
        max_output_tokens: Some(call.max_output_tokens),
      },
    };
    self.send(call.model, &req).await
  }

  async fn send(&self, model: &str, req: &GenerateContentRequest<'_>) -> Result<Value> {
    let start = Instant::now();
    let res = self.client.post(self.endpoint_for(model))
      .query(&[("key", self.settings.api_key.as_str())])
      .header(USER_AGENT, "honkonomics-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(CACHE_CONTROL, "no-store")
      .json(req).send().await
      .map_err(CourseError::transport)?;

    let status = res.status();
    if !status.is_success() {
      let details = read_body_best_effort(res).await;
      error!(target: targets::GEMINI, elapsed = ?start.elapsed(), %status, details = %details.as_deref().map(|d| trunc_for_log(d, 300)).unwrap_or_default(), "Gemini returned non-success status");
      return Err(CourseError::Upstream { status, details });
    }

    let body: Value = res.json().await.map_err(CourseError::transport)?;
    log_usage(&body, start.elapsed());
    Ok(body)
  }
}

fn is_loopback(base_url: &str) -> bool {
  reqwest::Url::parse(base_url)
    .ok()
    .and_then(|u| u.host_str().map(|h| matches!(h, "localhost" | "127.0.0.1" | "[::1]")))
    .unwrap_or(false)
}

/// Pull the generated text out of a response envelope.
///
/// Looks at the first candidate's first part carrying a string `text`, then at
/// a flattened top-level `text`. Empty strings count as absent.
pub fn extract_text(resp: &Value) -> Option<String> {
  let non_empty = |t: &&str| !t.is_empty();

  let from_candidates = resp
    .get("candidates")
    .and_then(Value::as_array)
    .and_then(|c| c.first())
    .and_then(|c| c.pointer("/content/parts"))
    .and_then(Value::as_array)
    .and_then(|parts| parts.iter().find_map(|p| p.get("text").and_then(Value::as_str)))
    .filter(non_empty);

  from_candidates
    .or_else(|| resp.get("text").and_then(Value::as_str).filter(non_empty))
    .map(str::to_string)
}

/// All text parts of the first candidate concatenated, else the flattened
/// top-level `text`, else empty.
pub fn joined_text(resp: &Value) -> String {
  let joined: String = resp
    .pointer("/candidates/0/content/parts")
    .and_then(Value::as_array)
    .into_iter()
    .flatten()
    .filter_map(|p| p.get("text").and_then(Value::as_str))
    .collect();
  if !joined.is_empty() {
    return joined;
  }
  resp.get("text").and_then(Value::as_str).unwrap_or_default().to_string()
}

pub fn finish_reason(resp: &Value) -> Option<String> {
  resp.pointer("/candidates/0/finishReason").and_then(Value::as_str).map(str::to_string)
}

/// Read an error body without ever failing. Google error envelopes are
/// reduced to their message.
async fn read_body_best_effort(res: reqwest::Response) -> Option<String> {
  match res.text().await {
    Ok(body) if body.trim().is_empty() => None,
    Ok(body) => Some(extract_google_error(&body).unwrap_or(body)),
    Err(e) => {
      warn!(target: targets::GEMINI, error = %e.without_url(), "Could not read upstream error body");
      None
    }
  }
}

/// Try to extract a clean error message from a Google API error body.
fn extract_google_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

fn log_usage(body: &Value, elapsed: Duration) {
  let usage = body.get("usageMetadata");
  let count = |key: &str| usage.and_then(|u| u.get(key)).and_then(Value::as_u64);
  let finish_reason = finish_reason(body).unwrap_or_else(|| "unknown".into());
  info!(
    target: targets::GEMINI,
    ?elapsed,
    prompt_tokens = ?count("promptTokenCount"),
    completion_tokens = ?count("candidatesTokenCount"),
    total_tokens = ?count("totalTokenCount"),
    %finish_reason,
    "Gemini response received"
  );
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
  contents: Vec<Content<'a>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<SystemInstruction<'a>>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content<'a> { role: &'static str, parts: Vec<Part<'a>> }
#[derive(Serialize)]
struct SystemInstruction<'a> { parts: Vec<Part<'a>> }
#[derive(Serialize)]
struct Part<'a> { text: &'a str }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_output_tokens: Option<u32>,
}
