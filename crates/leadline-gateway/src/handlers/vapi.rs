//! Provider option routes. Both check the platform credential first.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use leadline_core::catalog::{self, DEFAULT_LANGUAGE};
use leadline_core::fallback::{self, ProviderOptions};
use leadline_core::PlatformError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /vapi/options?language=
pub async fn options(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ProviderOptions>> {
    match state.platform.verify_credential().await {
        Ok(()) => {}
        Err(PlatformError::MissingKey) => {
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, PlatformError::MissingKey.to_string()))
        }
        Err(e) => {
            tracing::warn!("[GATEWAY] credential check failed: {}", e);
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Vapi API key is invalid or unreachable"));
        }
    }
    let language = params
        .get("language")
        .map(String::as_str)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE);
    Ok(Json(fallback::options_for(language)))
}

/// GET /providers
pub async fn providers(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    match state.platform.verify_credential().await {
        Ok(()) => Ok(Json(catalog::free_providers())),
        Err(PlatformError::MissingKey) => {
            Err(ApiError::new(StatusCode::UNAUTHORIZED, PlatformError::MissingKey.to_string()))
        }
        Err(PlatformError::Upstream { status, .. }) => Err(ApiError::new(
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            format!("Vapi key invalid or unreachable ({})", status),
        )),
        Err(e) => Err(ApiError::new(StatusCode::BAD_GATEWAY, format!("Vapi key invalid or unreachable ({})", e))),
    }
}
