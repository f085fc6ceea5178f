//! Gateway configuration: defaults, an optional TOML file, `LEADLINE__*` overrides, and the
//! provider secrets under their conventional env names.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/leadline.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub bind_addr: String,
    /// Base URL of the record backend.
    pub backend_url: String,
    pub vapi_base_url: String,
    #[serde(default, skip_serializing)]
    pub vapi_private_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub http_timeout_secs: u64,
    /// Comma separated list of allowed browser origins.
    pub cors_origins: String,
}

fn secret(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl GatewayConfig {
    /// Load `.env`, then build from the process environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("[GATEWAY] no .env loaded: {}", e);
        }
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit variable map. Precedence: `LEADLINE__*` > `LEADLINE_CONFIG` file
    /// (or `config/leadline.toml`) > defaults. `NEXT_PUBLIC_API_URL` replaces the default
    /// backend URL only.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, config::ConfigError> {
        let config_path = vars
            .get("LEADLINE_CONFIG")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let builder = config::Config::builder()
            .set_default("bind_addr", "127.0.0.1:8080")?
            .set_default("backend_url", leadline_core::backend::DEFAULT_BACKEND_URL)?
            .set_default("vapi_base_url", leadline_core::vapi::VAPI_BASE_URL)?
            .set_default("gemini_model", leadline_core::gemini::DEFAULT_GEMINI_MODEL)?
            .set_default("http_timeout_secs", 30_i64)?
            .set_default("cors_origins", "http://localhost:3000")?;

        let builder = match secret(&vars, "NEXT_PUBLIC_API_URL") {
            Some(url) => builder.set_default("backend_url", url)?,
            None => builder,
        };

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("LEADLINE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            )
            .build()?;

        let mut cfg: GatewayConfig = built.try_deserialize()?;
        cfg.vapi_private_key = secret(&vars, "VAPI_PRIVATE_KEY");
        cfg.gemini_api_key = secret(&vars, "GEMINI_API_KEY");
        Ok(cfg)
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}
