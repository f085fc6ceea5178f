//! Transport event adapter.
//!
//! The real-time transport delivers loosely shaped JSON: the call id can sit at `id`, `call.id`
//! or `callId`, the recording URL at `recordingUrl` or `call.recordingUrl`, and error text in one
//! of several fields. `normalize` resolves all of that once so the state machine only sees
//! `SessionEvent`s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::Role;

/// Substrings of transport errors that mean the call is winding down on its own.
pub const TRANSIENT_ERROR_MARKERS: &[&str] =
    &["revcn", "ably", "not connected", "Meeting has ended", "Meeting ended", "ejection"];

/// Start failures with these substrings mean the remote side already ended the meeting.
pub const EJECTION_MARKERS: &[&str] = &["Meeting ended", "Meeting has ended", "ejection"];

/// Event as the transport emits it: a kind tag plus an untyped payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransportEvent {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl RawTransportEvent {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self { kind: kind.into(), payload }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CallStart { call_id: Option<String> },
    CallEnd { recording_url: Option<String> },
    Transcript { role: Role, text: String, is_final: bool, call_id: Option<String> },
    SpeechUpdate { role: Role, started: bool, call_id: Option<String> },
    CallUpdate { recording_url: Option<String>, call_id: Option<String> },
    SpeechStart,
    SpeechEnd,
    Volume(f32),
    Error(String),
    Unknown { kind: String, call_id: Option<String> },
}

impl SessionEvent {
    /// Call id carried by a message event, used to fill in an id the start event lacked.
    pub fn message_call_id(&self) -> Option<&str> {
        match self {
            SessionEvent::Transcript { call_id, .. }
            | SessionEvent::SpeechUpdate { call_id, .. }
            | SessionEvent::CallUpdate { call_id, .. }
            | SessionEvent::Unknown { call_id, .. } => call_id.as_deref(),
            _ => None,
        }
    }
}

pub fn is_transient(message: &str) -> bool {
    TRANSIENT_ERROR_MARKERS.iter().any(|m| message.contains(m))
}

pub fn is_ejection(message: &str) -> bool {
    EJECTION_MARKERS.iter().any(|m| message.contains(m))
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

fn pointer_str(payload: &Value, pointer: &str) -> Option<String> {
    non_empty_str(payload.pointer(pointer))
}

fn first_str(payload: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| pointer_str(payload, p))
}

fn role_of(payload: &Value) -> Role {
    match payload.get("role").and_then(Value::as_str) {
        Some("assistant") => Role::Assistant,
        Some("user") => Role::User,
        Some("system") => Role::System,
        _ => Role::Unknown,
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Error text: the first set field among `error.message`, `message`, `msg`, `errorMessage`
/// if it is a string, else the payload itself when it is a string, else its JSON text.
pub fn error_message(payload: &Value) -> String {
    let candidate = ["/error/message", "/message", "/msg", "/errorMessage"]
        .iter()
        .filter_map(|p| payload.pointer(p))
        .find(|v| is_truthy(v));
    if let Some(Value::String(s)) = candidate {
        return s.clone();
    }
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn volume_of(payload: &Value) -> f32 {
    payload
        .as_f64()
        .or_else(|| payload.get("volume").and_then(Value::as_f64))
        .or_else(|| payload.get("level").and_then(Value::as_f64))
        .unwrap_or(0.0) as f32
}

fn normalize_message(payload: &Value) -> SessionEvent {
    let call_id = first_str(payload, &["/call/id", "/callId"]);
    match payload.get("type").and_then(Value::as_str) {
        Some("transcript") => SessionEvent::Transcript {
            role: role_of(payload),
            text: non_empty_str(payload.get("transcript")).unwrap_or_default(),
            is_final: payload.get("transcriptType").and_then(Value::as_str) == Some("final"),
            call_id,
        },
        Some("speech-update") => SessionEvent::SpeechUpdate {
            role: role_of(payload),
            started: payload.get("status").and_then(Value::as_str) == Some("started"),
            call_id,
        },
        Some("call-update") => SessionEvent::CallUpdate {
            recording_url: pointer_str(payload, "/call/recordingUrl"),
            call_id,
        },
        other => SessionEvent::Unknown {
            kind: format!("message:{}", other.unwrap_or("untyped")),
            call_id,
        },
    }
}

/// Map one raw transport event onto the closed event set.
pub fn normalize(raw: &RawTransportEvent) -> SessionEvent {
    let p = &raw.payload;
    match raw.kind.as_str() {
        "call-start" => SessionEvent::CallStart { call_id: first_str(p, &["/id", "/call/id", "/callId"]) },
        "call-end" => SessionEvent::CallEnd { recording_url: first_str(p, &["/recordingUrl", "/call/recordingUrl"]) },
        "message" => normalize_message(p),
        "speech-start" => SessionEvent::SpeechStart,
        "speech-end" => SessionEvent::SpeechEnd,
        "volume-level" => SessionEvent::Volume(volume_of(p)),
        "error" => SessionEvent::Error(error_message(p)),
        other => SessionEvent::Unknown { kind: other.to_string(), call_id: None },
    }
}
