//! Call records, transcript messages and the browser-call log projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::scoring::Qualification;

/// Speaker of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Conversation turns, as opposed to local system lines.
    pub fn is_participant(&self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    #[serde(default, alias = "data")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TranscriptMessage {
    pub fn new(role: Role, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { role, content: content.into(), timestamp: Some(at.to_rfc3339()) }
    }

    pub fn system(content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(Role::System, content, at)
    }
}

/// Stored call record. Only the fields the core reads or writes are modelled; the rest stays
/// with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: String,
    #[serde(default)]
    pub lead_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_call_id: Option<String>,
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transcript: Vec<TranscriptMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
}

impl Call {
    pub fn has_recording(&self) -> bool {
        self.recording_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn ai_score(&self) -> Option<i64> {
        self.metadata.get("ai_score").and_then(Value::as_i64)
    }

    pub fn qualification(&self) -> Option<Qualification> {
        self.metadata.get("qualification").and_then(Value::as_str).and_then(Qualification::parse)
    }
}

fn default_direction() -> String {
    "outbound".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Score written back to a call record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAnalysis {
    pub summary: String,
    pub ai_score: u8,
    pub qualification: Qualification,
}

/// What a finished browser call persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebCallLog {
    pub lead_id: String,
    pub purpose: String,
    pub language: String,
    pub transcript: Vec<TranscriptMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    pub status: String,
}

/// Whole seconds between two instants, rounded half away from zero.
pub fn duration_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds();
    (millis as f64 / 1000.0).round() as i64
}
