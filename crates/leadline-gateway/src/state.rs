use std::sync::Arc;

use leadline_core::{
    build_http_client, AgentStore, CallStore, GeminiClient, RestBackend, ScoringClient, VapiClient, VoicePlatform,
};

use crate::config::GatewayConfig;

/// Shared handles for every route. Clients are built once at start-up.
pub struct AppState {
    pub agents: Arc<dyn AgentStore>,
    pub calls: Arc<dyn CallStore>,
    pub platform: Arc<dyn VoicePlatform>,
    /// `None` when no Gemini key is configured.
    pub scoring: Option<Arc<ScoringClient>>,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let client = build_http_client(config.http_timeout_secs);
        let backend = Arc::new(RestBackend::new(config.backend_url.clone(), client.clone()));
        let platform = VapiClient::new(config.vapi_private_key.clone(), client.clone())
            .with_base_url(config.vapi_base_url.clone());
        if !platform.has_key() {
            tracing::warn!("[GATEWAY] VAPI_PRIVATE_KEY not set; platform routes will fail");
        }
        let scoring = config.gemini_api_key.as_ref().map(|key| {
            let model = GeminiClient::new(key.clone(), client.clone()).with_model(config.gemini_model.clone());
            Arc::new(ScoringClient::new(Arc::new(model)))
        });
        if scoring.is_none() {
            tracing::warn!("[GATEWAY] GEMINI_API_KEY not set; call analysis is disabled");
        }

        Self { agents: backend.clone(), calls: backend, platform: Arc::new(platform), scoring }
    }
}
