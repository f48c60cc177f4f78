//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/learn`. Both fields are optional on the wire so that a
/// missing topic is reported as our own 400 rather than a decoder rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CourseRequestIn {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

/// One message of `POST /api/v1/chat`. `role` is free text ("user",
/// "assistant", "model", ...) and is mapped onto Gemini's two speakers.
#[derive(Debug, Deserialize)]
pub struct ChatMessageIn {
    #[serde(default)]
    pub role: String,
    pub content: String,
}

/// Body of `POST /api/v1/chat`. Unset knobs take the `[chat]` config defaults;
/// `model` defaults to the configured Gemini model.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequestIn {
    #[serde(default)]
    pub messages: Vec<ChatMessageIn>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChatOut {
    pub text: String,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Error body shared by every failing response.
#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl ErrorOut {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), details: None, raw: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
    pub ok: bool,
    pub model_configured: bool,
}
