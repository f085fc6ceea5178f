//! Agent routes: create, list, edit, delete, and drift sync.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use leadline_core::sync::{self, SyncOutcome};
use leadline_core::{provisioning, Agent, AgentCreate, AgentUpdate, Assistant, ProvisionError};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /agents
pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AgentCreate>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    let agent = provisioning::create_agent(state.agents.as_ref(), state.platform.as_ref(), &body).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// GET /agents
pub async fn list_agents(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Agent>>> {
    Ok(Json(state.agents.list_agents().await?))
}

/// PATCH /agents/:id
pub async fn update_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<AgentUpdate>,
) -> ApiResult<Json<Agent>> {
    let agent = provisioning::update_agent(state.agents.as_ref(), state.platform.as_ref(), &id, &update).await?;
    Ok(Json(agent))
}

/// DELETE /agents/:id
pub async fn delete_agent(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    match provisioning::delete_agent(state.agents.as_ref(), state.platform.as_ref(), &id).await {
        Ok(()) => Ok(Json(json!({ "message": "Agent deleted" }))),
        Err(ProvisionError::Local(e)) => {
            tracing::error!("[AGENTS] local delete of {} failed: {}", id, e);
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete from database"))
        }
        Err(other) => Err(other.into()),
    }
}

/// GET /agents/:id/sync
pub async fn sync_agent(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<SyncOutcome>> {
    let outcome = sync::sync_agent(state.agents.as_ref(), state.platform.as_ref(), &id).await?;
    Ok(Json(outcome))
}

/// GET /agents/sync: remote assistants not yet imported.
pub async fn list_unimported(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Assistant>>> {
    sync::list_unimported(state.agents.as_ref(), state.platform.as_ref())
        .await
        .map(Json)
        .map_err(|e| ApiError::platform_bad_gateway(&e))
}
