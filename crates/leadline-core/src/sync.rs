//! Agent drift sync between the local record and the live remote assistant.
//!
//! Pull direction: the remote's name, first message and system prompt overwrite the local copy
//! when they differ. Push direction: local edits go out as a minimal patch that never replaces
//! remote configuration the local record does not own (voice, transcriber, tools...).

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::agent::{Agent, AgentPatch, AgentUpdate};
use crate::backend::AgentStore;
use crate::error::{BackendError, PlatformError, SyncError};
use crate::vapi::{Assistant, VoicePlatform};

/// How many remote assistants the import listing looks at.
pub const ASSISTANT_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub patch: AgentPatch,
    pub updated_fields: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub agent: Agent,
    pub synced: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// Nothing worth sending; the platform was not contacted.
    Skipped,
    Pushed {
        /// The live model could not be fetched, so only `model.messages` was sent.
        degraded: bool,
    },
}

fn changed(remote: Option<&str>, local: &str) -> Option<String> {
    remote.filter(|v| !v.is_empty() && *v != local).map(str::to_string)
}

/// Fields where the remote holds a non-empty value different from the local one.
pub fn reconcile(local: &Agent, remote: &Assistant) -> Reconciliation {
    let patch = AgentPatch {
        name: changed(remote.name.as_deref(), &local.name),
        first_message: changed(remote.first_message.as_deref(), &local.first_message),
        system_prompt: changed(remote.system_prompt(), &local.system_prompt),
    };
    let updated_fields = patch.fields();
    Reconciliation { patch, updated_fields }
}

/// Pull the live assistant behind `agent_id` into the local record.
pub async fn sync_agent(
    agents: &dyn AgentStore,
    platform: &dyn VoicePlatform,
    agent_id: &str,
) -> Result<SyncOutcome, SyncError> {
    let local = agents.get_agent(agent_id).await.map_err(|e| match e {
        BackendError::NotFound(_) => SyncError::NotFound(agent_id.to_string()),
        other => SyncError::LocalRead(other),
    })?;
    if !local.has_assistant() {
        return Err(SyncError::MissingAssistant(agent_id.to_string()));
    }

    let remote = platform.get_assistant(&local.vapi_assistant_id).await.map_err(SyncError::RemoteFetch)?;
    let Reconciliation { patch, updated_fields } = reconcile(&local, &remote);
    if patch.is_empty() {
        tracing::info!("[SYNC] agent {} already matches assistant {}", agent_id, local.vapi_assistant_id);
        return Ok(SyncOutcome { agent: local, synced: Vec::new() });
    }

    let agent = agents
        .update_agent(agent_id, &AgentUpdate::from(patch))
        .await
        .map_err(SyncError::LocalWrite)?;
    tracing::info!("[SYNC] agent {} pulled {:?} from assistant {}", agent_id, updated_fields, agent.vapi_assistant_id);
    Ok(SyncOutcome { agent, synced: updated_fields })
}

/// `model` with its `messages` replaced by a single system message. Every other key is kept.
pub fn splice_system_prompt(existing: Option<&Map<String, Value>>, prompt: &str) -> Map<String, Value> {
    let mut model = existing.cloned().unwrap_or_default();
    model.insert("messages".into(), json!([{ "role": "system", "content": prompt }]));
    model
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

/// Push local edits to the remote assistant.
///
/// Name and first message go out verbatim. A system prompt needs the live `model` object so the
/// provider, tools and other settings survive; if that fetch fails the patch carries only
/// `model.messages` and the push is reported as degraded.
pub async fn push_update(
    platform: &dyn VoicePlatform,
    assistant_id: &str,
    update: &AgentUpdate,
) -> Result<PushOutcome, PlatformError> {
    let mut payload = Map::new();
    if let Some(name) = non_empty(&update.name) {
        payload.insert("name".into(), json!(name));
    }
    if let Some(first) = non_empty(&update.first_message) {
        payload.insert("firstMessage".into(), json!(first));
    }

    let mut degraded = false;
    if let Some(prompt) = non_empty(&update.system_prompt) {
        let model = match platform.get_assistant(assistant_id).await {
            Ok(live) => splice_system_prompt(live.model.as_ref(), prompt),
            Err(e) => {
                tracing::warn!(
                    "[SYNC] could not fetch assistant {} before prompt push ({}); sending messages only",
                    assistant_id,
                    e
                );
                degraded = true;
                splice_system_prompt(None, prompt)
            }
        };
        payload.insert("model".into(), Value::Object(model));
    }

    if payload.is_empty() {
        return Ok(PushOutcome::Skipped);
    }
    platform.update_assistant(assistant_id, &Value::Object(payload)).await?;
    tracing::info!("[SYNC] pushed local edits to assistant {}", assistant_id);
    Ok(PushOutcome::Pushed { degraded })
}

/// Remote assistants no local agent points at. A failed local listing counts as no agents.
pub async fn list_unimported(
    agents: &dyn AgentStore,
    platform: &dyn VoicePlatform,
) -> Result<Vec<Assistant>, PlatformError> {
    let remote = platform.list_assistants(ASSISTANT_LIST_LIMIT).await?;
    let local = agents.list_agents().await.unwrap_or_else(|e| {
        tracing::warn!("[SYNC] local agent list failed ({}); treating every assistant as new", e);
        Vec::new()
    });
    let imported: HashSet<&str> = local.iter().map(|a| a.vapi_assistant_id.as_str()).collect();
    Ok(remote.into_iter().filter(|a| !imported.contains(a.id.as_str())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assistant, sample_agent, FakePlatform, MemoryBackend};

    #[test]
    fn test_reconcile_identical_is_empty() {
        let local = sample_agent("a1", "asst-1");
        let remote = assistant("asst-1", &local.name, &local.first_message, &local.system_prompt);
        let rec = reconcile(&local, &remote);
        assert!(rec.patch.is_empty());
        assert!(rec.updated_fields.is_empty());
    }

    #[test]
    fn test_reconcile_ignores_empty_remote_fields() {
        let local = sample_agent("a1", "asst-1");
        let remote = Assistant { id: "asst-1".into(), name: Some(String::new()), ..Assistant::default() };
        assert!(reconcile(&local, &remote).patch.is_empty());
    }

    #[test]
    fn test_reconcile_reports_fields_in_order() {
        let local = sample_agent("a1", "asst-1");
        let remote = assistant("asst-1", "Renamed", &local.first_message, "New prompt");
        let rec = reconcile(&local, &remote);
        assert_eq!(rec.updated_fields, vec!["name", "system_prompt"]);
        assert_eq!(rec.patch.system_prompt.as_deref(), Some("New prompt"));
        assert_eq!(rec.patch.first_message, None);
    }

    #[tokio::test]
    async fn test_sync_without_drift_writes_nothing() {
        let backend = MemoryBackend::new();
        let local = sample_agent("a1", "asst-1");
        backend.insert_agent(local.clone());
        let platform = FakePlatform::new();
        platform.insert_assistant(assistant("asst-1", &local.name, &local.first_message, &local.system_prompt));

        let outcome = sync_agent(&backend, &platform, "a1").await.unwrap();
        assert!(outcome.synced.is_empty());
        assert_eq!(outcome.agent, local);
        assert!(!backend.ops().contains(&"update_agent".to_string()));
    }

    #[tokio::test]
    async fn test_sync_writes_drifted_prompt() {
        let backend = MemoryBackend::new();
        let local = sample_agent("a1", "asst-1");
        backend.insert_agent(local.clone());
        let platform = FakePlatform::new();
        platform.insert_assistant(assistant("asst-1", &local.name, &local.first_message, "Edited in dashboard"));

        let outcome = sync_agent(&backend, &platform, "a1").await.unwrap();
        assert_eq!(outcome.synced, vec!["system_prompt"]);
        assert_eq!(outcome.agent.system_prompt, "Edited in dashboard");
        assert_eq!(backend.agent("a1").unwrap().system_prompt, "Edited in dashboard");
    }

    #[tokio::test]
    async fn test_sync_error_variants() {
        let backend = MemoryBackend::new();
        let platform = FakePlatform::new();
        assert!(matches!(sync_agent(&backend, &platform, "a1").await, Err(SyncError::NotFound(_))));

        backend.insert_agent(sample_agent("a2", ""));
        assert!(matches!(sync_agent(&backend, &platform, "a2").await, Err(SyncError::MissingAssistant(_))));

        backend.insert_agent(sample_agent("a3", "asst-3"));
        platform.fail("get_assistant", 500);
        assert!(matches!(sync_agent(&backend, &platform, "a3").await, Err(SyncError::RemoteFetch(_))));
        assert_eq!(backend.agent("a3").unwrap(), sample_agent("a3", "asst-3"));
    }

    #[tokio::test]
    async fn test_sync_local_write_failure() {
        let backend = MemoryBackend::new();
        let local = sample_agent("a1", "asst-1");
        backend.insert_agent(local.clone());
        backend.fail("update_agent");
        let platform = FakePlatform::new();
        platform.insert_assistant(assistant("asst-1", "Other", &local.first_message, &local.system_prompt));
        assert!(matches!(sync_agent(&backend, &platform, "a1").await, Err(SyncError::LocalWrite(_))));
    }

    #[test]
    fn test_splice_keeps_model_settings() {
        let mut model = Map::new();
        model.insert("provider".into(), json!("google"));
        model.insert("toolIds".into(), json!(["t1"]));
        model.insert("messages".into(), json!([{ "role": "system", "content": "old" }, { "role": "user", "content": "x" }]));
        let spliced = splice_system_prompt(Some(&model), "new");
        assert_eq!(spliced["provider"], "google");
        assert_eq!(spliced["toolIds"], json!(["t1"]));
        assert_eq!(spliced["messages"], json!([{ "role": "system", "content": "new" }]));
    }

    #[tokio::test]
    async fn test_push_prompt_preserves_live_model() {
        let platform = FakePlatform::new();
        let mut live = assistant("asst-1", "Riya", "Hi", "old");
        if let Some(model) = live.model.as_mut() {
            model.insert("provider".into(), json!("openai"));
        }
        platform.insert_assistant(live);
        let update = AgentUpdate { system_prompt: Some("fresh".into()), ..AgentUpdate::default() };

        let outcome = push_update(&platform, "asst-1", &update).await.unwrap();
        assert_eq!(outcome, PushOutcome::Pushed { degraded: false });
        let (_, patch) = platform.updates().pop().unwrap();
        assert_eq!(patch["model"]["provider"], "openai");
        assert_eq!(patch["model"]["messages"][0]["content"], "fresh");
        assert!(patch.get("name").is_none());
    }

    #[tokio::test]
    async fn test_push_degrades_when_prefetch_fails() {
        let platform = FakePlatform::new();
        platform.fail("get_assistant", 503);
        let update = AgentUpdate {
            name: Some("Max".into()),
            system_prompt: Some("fresh".into()),
            ..AgentUpdate::default()
        };
        let outcome = push_update(&platform, "asst-1", &update).await.unwrap();
        assert_eq!(outcome, PushOutcome::Pushed { degraded: true });
        let (_, patch) = platform.updates().pop().unwrap();
        assert_eq!(patch, json!({ "name": "Max", "model": { "messages": [{ "role": "system", "content": "fresh" }] } }));
    }

    #[tokio::test]
    async fn test_push_with_nothing_to_send_skips_remote() {
        let platform = FakePlatform::new();
        let update = AgentUpdate {
            name: Some(String::new()),
            description: Some("local only".into()),
            ..AgentUpdate::default()
        };
        assert_eq!(push_update(&platform, "asst-1", &update).await.unwrap(), PushOutcome::Skipped);
        assert!(platform.ops().is_empty());
    }

    #[tokio::test]
    async fn test_list_unimported_filters_known_ids() {
        let backend = MemoryBackend::new();
        backend.insert_agent(sample_agent("a1", "asst-1"));
        let platform = FakePlatform::new();
        platform.insert_assistant(assistant("asst-1", "A", "hi", "p"));
        platform.insert_assistant(assistant("asst-2", "B", "hi", "p"));
        let ids: Vec<String> = list_unimported(&backend, &platform).await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["asst-2"]);

        backend.fail("list_agents");
        assert_eq!(list_unimported(&backend, &platform).await.unwrap().len(), 2);
    }
}
