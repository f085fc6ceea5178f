//! Leadline gateway: the HTTP surface over `leadline_core`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use handlers::{agents, calls, vapi};

/// All routes with request tracing. CORS is layered on by `app`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/agents", get(agents::list_agents).post(agents::create_agent))
        .route("/agents/sync", get(agents::list_unimported))
        .route("/agents/:id", patch(agents::update_agent).delete(agents::delete_agent))
        .route("/agents/:id/sync", get(agents::sync_agent))
        .route("/calls/sync-recordings", post(calls::sync_recordings))
        .route("/calls/:id/analyze", post(calls::analyze_call))
        .route("/calls/:id/recording", get(calls::get_recording))
        .route("/vapi/options", get(vapi::options))
        .route("/providers", get(vapi::providers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("[GATEWAY] ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn app(state: Arc<AppState>, config: &GatewayConfig) -> Router {
    router(state).layer(cors_layer(&config.cors_origin_list()))
}
