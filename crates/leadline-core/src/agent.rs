//! Agent records: the local mirror of a remote voice assistant.
//!
//! `vapi_assistant_id` is the join key between the two stores. It is written once at creation
//! and never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{ProviderRef, DEFAULT_LANGUAGE};
use crate::fallback::ModelSelection;

/// What the agent is for. Shown in the call purpose when no description is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCategory {
    Inquiry,
    Booking,
    OrderStatus,
    Support,
    FollowUp,
    Sales,
    #[default]
    General,
}

impl AgentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentCategory::Inquiry => "inquiry",
            AgentCategory::Booking => "booking",
            AgentCategory::OrderStatus => "order_status",
            AgentCategory::Support => "support",
            AgentCategory::FollowUp => "follow_up",
            AgentCategory::Sales => "sales",
            AgentCategory::General => "general",
        }
    }
}

/// Local agent record as the backend returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub vapi_assistant_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub category: AgentCategory,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub first_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn has_assistant(&self) -> bool {
        !self.vapi_assistant_id.trim().is_empty()
    }

    /// Call purpose label used when this agent places a browser call: `[name] description`,
    /// with the category standing in for a missing description.
    pub fn purpose_label(&self) -> String {
        let detail = self
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(self.category.as_str());
        format!("[{}] {}", self.name, detail)
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Voice picked in the builder: `{provider, voiceId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceChoice {
    pub provider: String,
    pub voice_id: String,
}

impl From<VoiceChoice> for ProviderRef {
    fn from(v: VoiceChoice) -> Self {
        ProviderRef::new(v.provider, v.voice_id)
    }
}

/// Transcriber picked in the builder: `{provider, language, model?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriberChoice {
    pub provider: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl From<TranscriberChoice> for ProviderRef {
    fn from(t: TranscriberChoice) -> Self {
        let r = ProviderRef::new(t.provider, t.language);
        match t.model.filter(|m| !m.is_empty()) {
            Some(m) => r.with_model(m),
            None => r,
        }
    }
}

/// Create request. Provider choices are optional; the resolver fills the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub category: AgentCategory,
    #[serde(default = "default_language")]
    pub language: String,
    pub system_prompt: String,
    pub first_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcriber: Option<TranscriberChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<ModelSelection>,
}

/// Body of the backend's save endpoint after the assistant exists remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSave {
    pub vapi_assistant_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: AgentCategory,
    pub language: String,
    pub system_prompt: String,
    pub first_message: String,
}

impl AgentSave {
    pub fn from_create(create: &AgentCreate, vapi_assistant_id: impl Into<String>) -> Self {
        Self {
            vapi_assistant_id: vapi_assistant_id.into(),
            name: create.name.clone(),
            description: create.description.clone(),
            category: create.category,
            language: create.language.clone(),
            system_prompt: create.system_prompt.clone(),
            first_message: create.first_message.clone(),
        }
    }
}

/// Edit request. Every field optional. `vapi_assistant_id` only routes the remote push and is
/// never written to the local record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<AgentCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
    #[serde(default, skip_serializing)]
    pub vapi_assistant_id: Option<String>,
}

/// Fields written locally by a drift sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl AgentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.first_message.is_none() && self.system_prompt.is_none()
    }

    /// Names of the populated fields, in write order.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.name.is_some() {
            out.push("name");
        }
        if self.first_message.is_some() {
            out.push("first_message");
        }
        if self.system_prompt.is_some() {
            out.push("system_prompt");
        }
        out
    }
}

impl From<AgentPatch> for AgentUpdate {
    fn from(p: AgentPatch) -> Self {
        AgentUpdate {
            name: p.name,
            first_message: p.first_message,
            system_prompt: p.system_prompt,
            ..AgentUpdate::default()
        }
    }
}
