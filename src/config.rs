//! Service configuration: optional TOML file (prompts, model tuning, resource
//! policy) plus the model credential and endpoint from the environment.
//!
//! TOML schema (every table and key optional):
//!
//! ```toml
//! [prompts]
//! course_template = "... {topic} ... {level} ..."
//!
//! [model]
//! temperature = 0.6
//! timeout_secs = 60
//!
//! [chat]
//! system_instruction = "You are a financial advisor in investing. Your name is Honk."
//! temperature = 0.8
//! max_output_tokens = 1024
//!
//! [resources]
//! allowed_hosts = ["www.investopedia.com", "investopedia.com"]
//! max_resources = 4
//! aliases = [{ from = "investopedia.com", to = "www.investopedia.com" }]
//! fallbacks = [{ title = "What Is an ETF?", url = "https://www.investopedia.com/terms/e/etf.asp" }]
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::prompt::DEFAULT_COURSE_TEMPLATE;
use crate::sanitize::ResourcePolicy;
use crate::telemetry::targets;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.6;
pub const DEFAULT_CHAT_SYSTEM: &str = "You are a financial advisor in investing. Your name is Honk.";

/// Credential env vars, in lookup order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub model: ModelCfg,
  #[serde(default)]
  pub resources: ResourcePolicy,
  #[serde(default)]
  pub chat: ChatCfg,
}

/// Prompt templates. `{topic}` and `{level}` are substituted verbatim.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub course_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self { course_template: DEFAULT_COURSE_TEMPLATE.into() }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelCfg {
  pub temperature: f32,
  /// No client-side timeout unless set.
  pub timeout_secs: Option<u64>,
}

impl Default for ModelCfg {
  fn default() -> Self {
    Self { temperature: DEFAULT_TEMPERATURE, timeout_secs: None }
  }
}

/// Defaults for `POST /api/v1/chat`; each may be overridden per request.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChatCfg {
  /// Blank means no system instruction.
  pub system_instruction: String,
  pub temperature: f32,
  pub max_output_tokens: u32,
}

impl Default for ChatCfg {
  fn default() -> Self {
    Self { system_instruction: DEFAULT_CHAT_SYSTEM.into(), temperature: 0.8, max_output_tokens: 1024 }
  }
}

/// Everything the model client needs, injected at construction.
#[derive(Clone)]
pub struct GeminiSettings {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for GeminiSettings {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GeminiSettings")
      .field("api_key", &"<redacted>")
      .field("base_url", &self.base_url)
      .field("model", &self.model)
      .field("temperature", &self.temperature)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}

impl GeminiSettings {
  pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
    Self {
      api_key: api_key.into(),
      base_url: base_url.into(),
      model: DEFAULT_MODEL.into(),
      temperature: DEFAULT_TEMPERATURE,
      timeout_secs: None,
    }
  }

  /// Build settings from env + model config. `None` when no credential is set.
  pub fn from_env(model_cfg: &ModelCfg) -> Option<Self> {
    let api_key = api_key_from(|name| std::env::var(name).ok())?;
    let base_url = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    Some(Self {
      model,
      temperature: model_cfg.temperature,
      timeout_secs: model_cfg.timeout_secs,
      ..Self::new(api_key, base_url)
    })
  }
}

/// First non-blank credential among [`API_KEY_VARS`].
pub fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
  API_KEY_VARS
    .iter()
    .filter_map(|name| lookup(name))
    .map(|v| v.trim().to_string())
    .find(|v| !v.is_empty())
}

/// Load `ServiceConfig` from COURSE_CONFIG_PATH. Missing var → defaults.
/// Read/parse errors are logged and also fall back to defaults.
pub fn load_service_config_from_env() -> ServiceConfig {
  match std::env::var("COURSE_CONFIG_PATH") {
    Ok(path) => load_service_config(Path::new(&path)),
    Err(_) => ServiceConfig::default(),
  }
}

pub fn load_service_config(path: &Path) -> ServiceConfig {
  let shown = path.display();
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<ServiceConfig>(&s) {
      Ok(cfg) => {
        info!(target: targets::APP, path = %shown, hosts = cfg.resources.allowed_hosts.len(), "Loaded service config (TOML)");
        if let Err(e) = cfg.resources.validate() {
          warn!(target: targets::APP, path = %shown, error = %e, "Resource policy cannot guarantee a non-empty list");
        }
        cfg
      }
      Err(e) => {
        error!(target: targets::APP, path = %shown, error = %e, "Failed to parse TOML config; using defaults");
        ServiceConfig::default()
      }
    },
    Err(e) => {
      error!(target: targets::APP, path = %shown, error = %e, "Failed to read TOML config file; using defaults");
      ServiceConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn api_key_prefers_gemini_then_google() {
    let env: HashMap<&str, &str> = [("GEMINI_API_KEY", "g1"), ("GOOGLE_API_KEY", "g2")].into();
    assert_eq!(api_key_from(|k| env.get(k).map(|v| v.to_string())).as_deref(), Some("g1"));

    let env: HashMap<&str, &str> = [("GEMINI_API_KEY", "  "), ("GOOGLE_API_KEY", "g2")].into();
    assert_eq!(api_key_from(|k| env.get(k).map(|v| v.to_string())).as_deref(), Some("g2"));

    assert_eq!(api_key_from(|_| None), None);
  }

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: ServiceConfig = toml::from_str("[model]\ntimeout_secs = 30\n").unwrap();
    assert_eq!(cfg.model.timeout_secs, Some(30));
    assert_eq!(cfg.model.temperature, DEFAULT_TEMPERATURE);
    assert_eq!(cfg.prompts.course_template, DEFAULT_COURSE_TEMPLATE);
    assert!(cfg.resources.allowed_hosts.contains("www.sec.gov"));
    assert_eq!(cfg.chat.system_instruction, DEFAULT_CHAT_SYSTEM);
    assert_eq!(cfg.chat.max_output_tokens, 1024);
  }

  #[test]
  fn chat_table_overrides_defaults() {
    let cfg: ServiceConfig = toml::from_str("[chat]\nsystem_instruction = \"\"\nmax_output_tokens = 256\n").unwrap();
    assert_eq!(cfg.chat.system_instruction, "");
    assert_eq!(cfg.chat.max_output_tokens, 256);
    assert!((cfg.chat.temperature - 0.8).abs() < 1e-6);
  }

  #[test]
  fn resource_table_overrides_policy() {
    let cfg: ServiceConfig = toml::from_str(
      r#"
      [resources]
      allowed_hosts = ["example.org"]
      max_resources = 2
      aliases = [{ from = "example.org", to = "www.example.org" }]
      fallbacks = [{ title = "Home", url = "https://www.example.org/learn" }]
      "#,
    )
    .unwrap();
    assert_eq!(cfg.resources.max_resources, 2);
    assert_eq!(cfg.resources.aliases.len(), 1);
    assert_eq!(cfg.resources.fallbacks[0].title, "Home");
  }

  #[test]
  fn unreadable_config_falls_back_to_defaults() {
    let cfg = load_service_config(Path::new("/definitely/not/here.toml"));
    assert_eq!(cfg.resources.max_resources, 4);
  }

  #[test]
  fn debug_never_prints_the_key() {
    let s = GeminiSettings::new("sekrit", DEFAULT_BASE_URL);
    assert!(!format!("{s:?}").contains("sekrit"));
  }
}
