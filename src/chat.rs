//! Chat proxy: forward a conversation to Gemini with the tutor persona and
//! return the full reply (no streaming).

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, instrument};

use crate::error::{CourseError, Result};
use crate::gemini::{finish_reason, joined_text, ChatCall, Role, Turn};
use crate::protocol::{ChatOut, ChatRequestIn};
use crate::state::AppState;
use crate::telemetry::targets;

// The model name becomes a URL path segment.
static MODEL_NAME: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("model name regex"));

/// A validated chat request. `None` fields take the configured defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
  pub turns: Vec<Turn>,
  pub model: Option<String>,
  pub system_instruction: Option<String>,
  pub temperature: Option<f32>,
  pub max_output_tokens: Option<u32>,
}

impl ChatRequest {
  pub fn from_input(input: ChatRequestIn) -> Result<Self> {
    if input.messages.is_empty() {
      return Err(CourseError::NoMessages);
    }
    let model = match input.model.as_deref().map(str::trim) {
      None | Some("") => None,
      Some(m) if MODEL_NAME.is_match(m) => Some(m.to_string()),
      Some(m) => return Err(CourseError::BadBody(format!("invalid model name '{m}'"))),
    };
    let turns = input
      .messages
      .into_iter()
      .map(|m| Turn { role: Role::from_label(&m.role), text: m.content })
      .collect();
    Ok(Self {
      turns,
      model,
      system_instruction: input.system_instruction,
      temperature: input.temperature,
      max_output_tokens: input.max_output_tokens,
    })
  }
}

#[instrument(level = "info", skip(state, req), fields(turns = req.turns.len()))]
pub async fn run_chat(state: &AppState, req: &ChatRequest) -> Result<ChatOut> {
  let gemini = state.gemini.as_ref().ok_or(CourseError::Config)?;
  let defaults = &state.chat;

  let model = req.model.as_deref().unwrap_or(&gemini.settings().model);
  let system_instruction = req
    .system_instruction
    .as_deref()
    .unwrap_or(&defaults.system_instruction)
    .trim();
  let call = ChatCall {
    model,
    system_instruction: (!system_instruction.is_empty()).then_some(system_instruction),
    turns: &req.turns,
    temperature: req.temperature.unwrap_or(defaults.temperature),
    max_output_tokens: req.max_output_tokens.unwrap_or(defaults.max_output_tokens),
  };

  let envelope = gemini.chat(&call).await?;
  let out = ChatOut {
    text: joined_text(&envelope),
    model: model.to_string(),
    finish_reason: finish_reason(&envelope),
  };
  info!(target: targets::CHAT, %model, text_len = out.text.len(), finish_reason = ?out.finish_reason, "Chat reply received");
  Ok(out)
}
