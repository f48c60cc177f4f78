//! Application state: prompts, resource policy, chat defaults, and the optional
//! Gemini client.
//!
//! Everything here is read-only after startup; requests share it behind an `Arc`.
//! A missing credential leaves `gemini` empty and every course or chat request
//! then fails fast with a configuration error.

use tracing::{error, info, instrument, warn};

use crate::config::{load_service_config_from_env, ChatCfg, GeminiSettings, Prompts, ServiceConfig, API_KEY_VARS};
use crate::gemini::GeminiClient;
use crate::sanitize::ResourcePolicy;
use crate::telemetry::targets;

#[derive(Clone)]
pub struct AppState {
    pub gemini: Option<GeminiClient>,
    pub prompts: Prompts,
    pub resources: ResourcePolicy,
    pub chat: ChatCfg,
}

impl AppState {
    /// Build state from env: load TOML config, then the credential and endpoint.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let cfg = load_service_config_from_env();
        let settings = GeminiSettings::from_env(&cfg.model);
        Self::new(cfg, settings)
    }

    pub fn new(cfg: ServiceConfig, settings: Option<GeminiSettings>) -> Self {
        let gemini = match settings {
            Some(s) => match GeminiClient::new(s) {
                Ok(client) => {
                    let s = client.settings();
                    info!(target: targets::APP, base_url = %s.base_url, model = %s.model, temperature = s.temperature, timeout_secs = ?s.timeout_secs, "Gemini enabled.");
                    Some(client)
                }
                Err(e) => {
                    error!(target: targets::APP, error = %e, "Failed to build HTTP client; Gemini disabled.");
                    None
                }
            },
            None => {
                warn!(target: targets::APP, vars = ?API_KEY_VARS, "No Gemini credential set; course and chat requests will answer 500.");
                None
            }
        };

        info!(
            target: targets::APP,
            allowed_hosts = cfg.resources.allowed_hosts.len(),
            aliases = cfg.resources.aliases.len(),
            fallbacks = cfg.resources.fallbacks.len(),
            max_resources = cfg.resources.max_resources,
            "Resource policy loaded"
        );

        Self { gemini, prompts: cfg.prompts, resources: cfg.resources, chat: cfg.chat }
    }
}
