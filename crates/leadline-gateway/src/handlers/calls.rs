//! Call routes: analysis, recording lookup, recording backfill.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use leadline_core::recordings::{self, RecordingLookup};
use leadline_core::{ModelError, RecordingError, ScoreOutcome};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /calls/:id/analyze
pub async fn analyze_call(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let Some(scoring) = state.scoring.as_ref() else {
        return Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, ModelError::MissingKey.to_string()));
    };
    let body = match scoring.analyze_call(state.calls.as_ref(), &id).await? {
        ScoreOutcome::Scored(score) => json!(score),
        ScoreOutcome::Skipped { reason } => json!({ "skipped": true, "reason": reason }),
    };
    Ok(Json(body))
}

/// GET /calls/:id/recording
pub async fn get_recording(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let body = match recordings::fetch_recording(state.calls.as_ref(), state.platform.as_ref(), &id).await? {
        RecordingLookup::Cached(url) | RecordingLookup::Fetched(url) => json!({ "recording_url": url }),
        RecordingLookup::NotReady => json!({ "recording_url": null, "message": "Recording not ready yet" }),
    };
    Ok(Json(body))
}

/// POST /calls/sync-recordings
pub async fn sync_recordings(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let report = recordings::sync_recordings(state.calls.as_ref(), state.platform.as_ref())
        .await
        .map_err(|e| match e {
            RecordingError::Remote(p) => ApiError::platform_bad_gateway(&p),
            RecordingError::Lookup(_) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Could not fetch local calls"),
            other => other.into(),
        })?;
    if report.checked == 0 {
        return Ok(Json(json!({ "updated": 0, "message": "All calls already have recordings" })));
    }
    Ok(Json(json!({ "updated": report.updated, "checked": report.checked })))
}
