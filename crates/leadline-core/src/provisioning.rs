//! Agent lifecycle across both stores: create remote-first, edit, delete.

use serde_json::{json, Value};

use crate::agent::{Agent, AgentCreate, AgentSave, AgentUpdate};
use crate::backend::AgentStore;
use crate::error::ProvisionError;
use crate::fallback::{self, ProviderKind};
use crate::sync::push_update;
use crate::vapi::VoicePlatform;

/// Assistant creation payload: resolved voice and transcriber with fallback plans, the model
/// with a single system message, and the greeting.
pub fn build_assistant_payload(create: &AgentCreate) -> Value {
    let voice = fallback::resolve(ProviderKind::Voice, &create.language, create.voice.clone().map(Into::into));
    let transcriber = fallback::resolve(
        ProviderKind::Transcriber,
        &create.language,
        create.transcriber.clone().map(Into::into),
    );
    let model = fallback::resolve_model(create.llm.clone());

    json!({
        "name": create.name,
        "firstMessage": create.first_message,
        "transcriber": transcriber.to_payload(),
        "model": {
            "provider": model.provider,
            "model": model.model,
            "messages": [{ "role": "system", "content": create.system_prompt }],
        },
        "voice": voice.to_payload(),
    })
}

/// Create the remote assistant, then the local record pointing at it.
///
/// No rollback: if the local save fails the assistant stays on the platform and the error
/// carries its id.
pub async fn create_agent(
    agents: &dyn AgentStore,
    platform: &dyn VoicePlatform,
    create: &AgentCreate,
) -> Result<Agent, ProvisionError> {
    let payload = build_assistant_payload(create);
    let assistant = platform.create_assistant(&payload).await?;
    tracing::info!("[AGENTS] created assistant {} for '{}'", assistant.id, create.name);

    let save = AgentSave::from_create(create, assistant.id.clone());
    agents.save_agent(&save).await.map_err(|source| {
        tracing::warn!(
            "[AGENTS] local save failed for '{}'; assistant {} is orphaned on the platform: {}",
            create.name,
            assistant.id,
            source
        );
        ProvisionError::LocalSave { assistant_id: assistant.id.clone(), source }
    })
}

/// Push the edit to the remote assistant when an assistant id is given, then write every
/// provided field locally.
pub async fn update_agent(
    agents: &dyn AgentStore,
    platform: &dyn VoicePlatform,
    agent_id: &str,
    update: &AgentUpdate,
) -> Result<Agent, ProvisionError> {
    if let Some(assistant_id) = update.vapi_assistant_id.as_deref().filter(|id| !id.is_empty()) {
        push_update(platform, assistant_id, update).await?;
    }
    agents.update_agent(agent_id, update).await.map_err(ProvisionError::Local)
}

/// Delete the local record and, best effort, the remote assistant it points at.
pub async fn delete_agent(
    agents: &dyn AgentStore,
    platform: &dyn VoicePlatform,
    agent_id: &str,
) -> Result<(), ProvisionError> {
    // Any failed lookup reads as a missing agent; only the delete itself reports as local.
    let agent = agents.get_agent(agent_id).await.map_err(|e| {
        if !e.is_not_found() {
            tracing::warn!("[AGENTS] lookup of {} before delete failed: {}", agent_id, e);
        }
        ProvisionError::NotFound(agent_id.to_string())
    })?;

    if agent.has_assistant() {
        if let Err(e) = platform.delete_assistant(&agent.vapi_assistant_id).await {
            tracing::warn!("[AGENTS] remote delete of assistant {} failed: {}", agent.vapi_assistant_id, e);
        }
    }

    agents.delete_agent(agent_id).await.map_err(ProvisionError::Local)?;
    tracing::info!("[AGENTS] deleted agent {}", agent_id);
    Ok(())
}
