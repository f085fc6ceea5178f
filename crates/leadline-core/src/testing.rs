//! In-memory doubles for the backend, the voice platform, the language model and the call
//! transport. Compiled for unit tests and behind the `test-util` feature for downstream crates.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::agent::{Agent, AgentCategory, AgentSave, AgentUpdate};
use crate::backend::{AgentStore, CallStore};
use crate::call::{Call, CallAnalysis, WebCallLog};
use crate::error::{BackendError, ModelError, PlatformError, SessionError, SessionResult};
use crate::gemini::{GenerationSettings, LanguageModel, DEFAULT_GEMINI_MODEL};
use crate::session::{CallTarget, CallTransport, MicrophonePermission, PermissionState};
use crate::vapi::{Assistant, RemoteCall, VoicePlatform};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).single().unwrap_or_else(Utc::now)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Local agent with fixed timestamps, so two calls with the same arguments compare equal.
pub fn sample_agent(id: &str, vapi_assistant_id: &str) -> Agent {
    Agent {
        id: id.to_string(),
        vapi_assistant_id: vapi_assistant_id.to_string(),
        name: "Riya".to_string(),
        description: Some("Solar sales".to_string()),
        category: AgentCategory::Sales,
        language: "en".to_string(),
        system_prompt: "You sell solar panels.".to_string(),
        first_message: "Hi, this is Riya.".to_string(),
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub fn sample_call(id: &str) -> Call {
    Call {
        id: id.to_string(),
        lead_id: "lead-1".to_string(),
        provider_call_id: None,
        direction: "outbound".to_string(),
        status: "completed".to_string(),
        purpose: None,
        transcript: Vec::new(),
        recording_url: None,
        start_time: None,
        end_time: None,
        duration_seconds: None,
        summary: None,
        metadata: Map::new(),
    }
}

/// Remote assistant with a single system message.
pub fn assistant(id: &str, name: &str, first_message: &str, system_prompt: &str) -> Assistant {
    let mut model = Map::new();
    model.insert("provider".into(), json!("google"));
    model.insert("model".into(), json!(DEFAULT_GEMINI_MODEL));
    model.insert("messages".into(), json!([{ "role": "system", "content": system_prompt }]));
    Assistant {
        id: id.to_string(),
        name: Some(name.to_string()),
        first_message: Some(first_message.to_string()),
        model: Some(model),
        extra: Map::new(),
    }
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BackendData {
    agents: Vec<Agent>,
    calls: Vec<Call>,
    analyses: Vec<(String, CallAnalysis)>,
    logged: Vec<WebCallLog>,
    ops: Vec<String>,
    failing: HashSet<String>,
    failing_recordings: HashSet<String>,
    next_id: usize,
}

/// Agent and call store held in memory. Every trait call is recorded in `ops`.
#[derive(Default)]
pub struct MemoryBackend {
    data: Mutex<BackendData>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_agent(&self, agent: Agent) {
        lock(&self.data).agents.push(agent);
    }

    pub fn agent(&self, id: &str) -> Option<Agent> {
        lock(&self.data).agents.iter().find(|a| a.id == id).cloned()
    }

    pub fn insert_call(&self, call: Call) {
        lock(&self.data).calls.push(call);
    }

    pub fn call(&self, id: &str) -> Option<Call> {
        lock(&self.data).calls.iter().find(|c| c.id == id).cloned()
    }

    pub fn analyses(&self) -> Vec<(String, CallAnalysis)> {
        lock(&self.data).analyses.clone()
    }

    pub fn logged(&self) -> Vec<WebCallLog> {
        lock(&self.data).logged.clone()
    }

    pub fn ops(&self) -> Vec<String> {
        lock(&self.data).ops.clone()
    }

    /// Make every later call to `op` fail with a 500.
    pub fn fail(&self, op: &str) {
        lock(&self.data).failing.insert(op.to_string());
    }

    /// Make `save_recording` fail for one call only.
    pub fn fail_recording_for(&self, call_id: &str) {
        lock(&self.data).failing_recordings.insert(call_id.to_string());
    }

    fn enter(&self, op: &str) -> Result<MutexGuard<'_, BackendData>, BackendError> {
        let mut data = lock(&self.data);
        data.ops.push(op.to_string());
        if data.failing.contains(op) {
            return Err(BackendError::Status { status: 500, body: format!("injected {} failure", op) });
        }
        Ok(data)
    }
}

#[async_trait]
impl AgentStore for MemoryBackend {
    async fn list_agents(&self) -> Result<Vec<Agent>, BackendError> {
        Ok(self.enter("list_agents")?.agents.clone())
    }

    async fn save_agent(&self, save: &AgentSave) -> Result<Agent, BackendError> {
        let mut data = self.enter("save_agent")?;
        data.next_id += 1;
        let now = Utc::now();
        let agent = Agent {
            id: format!("agent-{}", data.next_id),
            vapi_assistant_id: save.vapi_assistant_id.clone(),
            name: save.name.clone(),
            description: save.description.clone(),
            category: save.category,
            language: save.language.clone(),
            system_prompt: save.system_prompt.clone(),
            first_message: save.first_message.clone(),
            created_at: now,
            updated_at: now,
        };
        data.agents.push(agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: &str) -> Result<Agent, BackendError> {
        let data = self.enter("get_agent")?;
        data.agents
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn update_agent(&self, id: &str, update: &AgentUpdate) -> Result<Agent, BackendError> {
        let mut data = self.enter("update_agent")?;
        let agent = data
            .agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        if let Some(v) = &update.name {
            agent.name = v.clone();
        }
        if let Some(v) = &update.description {
            agent.description = Some(v.clone());
        }
        if let Some(v) = update.category {
            agent.category = v;
        }
        if let Some(v) = &update.language {
            agent.language = v.clone();
        }
        if let Some(v) = &update.system_prompt {
            agent.system_prompt = v.clone();
        }
        if let Some(v) = &update.first_message {
            agent.first_message = v.clone();
        }
        agent.updated_at = Utc::now();
        Ok(agent.clone())
    }

    async fn delete_agent(&self, id: &str) -> Result<(), BackendError> {
        let mut data = self.enter("delete_agent")?;
        let before = data.agents.len();
        data.agents.retain(|a| a.id != id);
        if data.agents.len() == before {
            return Err(BackendError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CallStore for MemoryBackend {
    async fn get_call(&self, id: &str) -> Result<Call, BackendError> {
        let data = self.enter("get_call")?;
        data.calls
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn list_calls(&self, limit: usize) -> Result<Vec<Call>, BackendError> {
        Ok(self.enter("list_calls")?.calls.iter().take(limit).cloned().collect())
    }

    async fn save_recording(&self, id: &str, recording_url: &str) -> Result<(), BackendError> {
        let mut data = self.enter("save_recording")?;
        if data.failing_recordings.contains(id) {
            return Err(BackendError::Status { status: 500, body: format!("recording update for {} refused", id) });
        }
        let call = data
            .calls
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        call.recording_url = Some(recording_url.to_string());
        Ok(())
    }

    async fn save_analysis(&self, id: &str, analysis: &CallAnalysis) -> Result<(), BackendError> {
        let mut data = self.enter("save_analysis")?;
        let call = data
            .calls
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        call.summary = Some(analysis.summary.clone());
        call.metadata.insert("ai_score".into(), json!(analysis.ai_score));
        call.metadata.insert("qualification".into(), json!(analysis.qualification));
        data.analyses.push((id.to_string(), analysis.clone()));
        Ok(())
    }

    async fn log_web_call(&self, log: &WebCallLog) -> Result<String, BackendError> {
        let mut data = self.enter("log_web_call")?;
        data.next_id += 1;
        let id = format!("call-{}", data.next_id);
        data.calls.push(Call {
            id: id.clone(),
            lead_id: log.lead_id.clone(),
            provider_call_id: log.provider_call_id.clone(),
            direction: "outbound".to_string(),
            status: log.status.clone(),
            purpose: Some(log.purpose.clone()),
            transcript: log.transcript.clone(),
            recording_url: log.recording_url.clone(),
            start_time: log.start_time,
            end_time: Some(log.end_time),
            duration_seconds: log.duration_seconds,
            summary: None,
            metadata: Map::new(),
        });
        data.logged.push(log.clone());
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// FakePlatform
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PlatformData {
    assistants: Vec<Assistant>,
    calls: Vec<RemoteCall>,
    failing: HashMap<String, u16>,
    ops: Vec<String>,
    updates: Vec<(String, Value)>,
    created: Vec<Value>,
}

/// Voice platform double. Assistants keep insertion order and created ids run `asst-1`,
/// `asst-2`, and so on.
#[derive(Default)]
pub struct FakePlatform {
    data: Mutex<PlatformData>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_assistant(&self, assistant: Assistant) {
        lock(&self.data).assistants.push(assistant);
    }

    pub fn insert_call(&self, call: RemoteCall) {
        lock(&self.data).calls.push(call);
    }

    /// Make every later call to `op` fail with `status`.
    pub fn fail(&self, op: &str, status: u16) {
        lock(&self.data).failing.insert(op.to_string(), status);
    }

    pub fn ops(&self) -> Vec<String> {
        lock(&self.data).ops.clone()
    }

    /// `(assistant_id, patch)` for every update sent.
    pub fn updates(&self) -> Vec<(String, Value)> {
        lock(&self.data).updates.clone()
    }

    /// Payloads of every assistant created.
    pub fn created(&self) -> Vec<Value> {
        lock(&self.data).created.clone()
    }

    fn enter(&self, op: &str) -> Result<MutexGuard<'_, PlatformData>, PlatformError> {
        let mut data = lock(&self.data);
        data.ops.push(op.to_string());
        if let Some(&status) = data.failing.get(op) {
            return Err(PlatformError::Upstream { status, body: format!("injected {} failure", op) });
        }
        Ok(data)
    }
}

fn not_found(what: &str, id: &str) -> PlatformError {
    PlatformError::Upstream { status: 404, body: format!("{} {} not found", what, id) }
}

fn merge_assistant(base: &Assistant, patch: &Value) -> Result<Assistant, PlatformError> {
    let mut merged = serde_json::to_value(base).map_err(|e| PlatformError::Decode(e.to_string()))?;
    if let (Some(target), Some(fields)) = (merged.as_object_mut(), patch.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(merged).map_err(|e| PlatformError::Decode(e.to_string()))
}

#[async_trait]
impl VoicePlatform for FakePlatform {
    async fn create_assistant(&self, payload: &Value) -> Result<Assistant, PlatformError> {
        let mut data = self.enter("create_assistant")?;
        data.created.push(payload.clone());
        let id = format!("asst-{}", data.created.len());
        let assistant = merge_assistant(&Assistant { id, ..Assistant::default() }, payload)?;
        data.assistants.push(assistant.clone());
        Ok(assistant)
    }

    async fn get_assistant(&self, id: &str) -> Result<Assistant, PlatformError> {
        let data = self.enter("get_assistant")?;
        data.assistants.iter().find(|a| a.id == id).cloned().ok_or_else(|| not_found("assistant", id))
    }

    async fn update_assistant(&self, id: &str, patch: &Value) -> Result<Assistant, PlatformError> {
        let mut data = self.enter("update_assistant")?;
        data.updates.push((id.to_string(), patch.clone()));
        match data.assistants.iter_mut().find(|a| a.id == id) {
            Some(existing) => {
                *existing = merge_assistant(existing, patch)?;
                Ok(existing.clone())
            }
            None => merge_assistant(&Assistant { id: id.to_string(), ..Assistant::default() }, patch),
        }
    }

    async fn delete_assistant(&self, id: &str) -> Result<(), PlatformError> {
        let mut data = self.enter("delete_assistant")?;
        let before = data.assistants.len();
        data.assistants.retain(|a| a.id != id);
        if data.assistants.len() == before {
            return Err(not_found("assistant", id));
        }
        Ok(())
    }

    async fn list_assistants(&self, limit: usize) -> Result<Vec<Assistant>, PlatformError> {
        Ok(self.enter("list_assistants")?.assistants.iter().take(limit).cloned().collect())
    }

    async fn get_call(&self, id: &str) -> Result<RemoteCall, PlatformError> {
        let data = self.enter("get_call")?;
        data.calls.iter().find(|c| c.id == id).cloned().ok_or_else(|| not_found("call", id))
    }

    async fn list_calls(&self, limit: usize) -> Result<Vec<RemoteCall>, PlatformError> {
        Ok(self.enter("list_calls")?.calls.iter().take(limit).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// Language model that returns one canned reply (or error) and records every prompt.
pub struct ScriptedModel {
    reply: Result<String, (u16, String)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(text: &str) -> Self {
        Self { reply: Ok(text.to_string()), prompts: Mutex::new(Vec::new()) }
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self { reply: Err((status, body.to_string())), prompts: Mutex::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str, _settings: GenerationSettings) -> Result<String, ModelError> {
        lock(&self.prompts).push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err((status, body)) => Err(ModelError::Upstream { status: *status, body: body.clone() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport and permission doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TransportLog {
    started: Vec<CallTarget>,
    stops: usize,
    mutes: Vec<bool>,
}

/// Call transport that records what it was asked to do. Events are fed by the test.
#[derive(Default)]
pub struct FakeTransport {
    start_error: Option<String>,
    log: Mutex<TransportLog>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `start` fails with `message`.
    pub fn failing_start(message: &str) -> Self {
        Self { start_error: Some(message.to_string()), ..Self::default() }
    }

    /// Targets of successful starts.
    pub fn started(&self) -> Vec<CallTarget> {
        lock(&self.log).started.clone()
    }

    pub fn stop_count(&self) -> usize {
        lock(&self.log).stops
    }

    pub fn mute_calls(&self) -> Vec<bool> {
        lock(&self.log).mutes.clone()
    }
}

#[async_trait]
impl CallTransport for FakeTransport {
    async fn start(&self, target: &CallTarget) -> SessionResult<()> {
        if let Some(message) = &self.start_error {
            return Err(SessionError::Transport(message.clone()));
        }
        lock(&self.log).started.push(target.clone());
        Ok(())
    }

    async fn stop(&self) {
        lock(&self.log).stops += 1;
    }

    async fn set_muted(&self, muted: bool) {
        lock(&self.log).mutes.push(muted);
    }
}

/// Permission probe with a fixed answer.
pub struct FixedPermission(pub Option<PermissionState>);

#[async_trait]
impl MicrophonePermission for FixedPermission {
    async fn query(&self) -> Option<PermissionState> {
        self.0
    }
}

/// Permission probe that answers `Granted` after a delay.
pub struct SlowPermission(pub Duration);

#[async_trait]
impl MicrophonePermission for SlowPermission {
    async fn query(&self) -> Option<PermissionState> {
        tokio::time::sleep(self.0).await;
        Some(PermissionState::Granted)
    }
}
