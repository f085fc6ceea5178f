//! Error types for every fallible boundary in the core crate.
//!
//! Collaborator errors (`PlatformError`, `BackendError`, `ModelError`) describe one failed HTTP
//! exchange. Operation errors (`SyncError`, `ProvisionError`, ...) say which step of a multi-step
//! operation failed so the gateway can pick a status code.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Failure talking to the voice platform.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("VAPI_PRIVATE_KEY not configured")]
    MissingKey,
    #[error("Vapi error ({status}): {body}")]
    Upstream { status: u16, body: String },
    #[error("Vapi request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Vapi response could not be decoded: {0}")]
    Decode(String),
}

impl PlatformError {
    /// HTTP status reported by the platform, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure talking to the local record backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("backend error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Failure talking to the language model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("GEMINI_API_KEY not configured")]
    MissingKey,
    #[error("Gemini error ({status}): {body}")]
    Upstream { status: u16, body: String },
    #[error("Gemini request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gemini response could not be decoded: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Agent create / update / delete.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("agent not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Remote(#[from] PlatformError),
    /// The assistant exists remotely but the local record could not be written.
    #[error("DB save failed: {source}")]
    LocalSave {
        assistant_id: String,
        #[source]
        source: BackendError,
    },
    #[error("DB update failed: {0}")]
    Local(#[source] BackendError),
}

/// Agent drift sync.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Agent not found in local database")]
    NotFound(String),
    #[error("Agent has no Vapi assistant ID")]
    MissingAssistant(String),
    #[error("local lookup failed: {0}")]
    LocalRead(#[source] BackendError),
    #[error("{0}")]
    RemoteFetch(#[source] PlatformError),
    #[error("DB update failed: {0}")]
    LocalWrite(#[source] BackendError),
}

/// Call scoring.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Call not found")]
    NotFound(String),
    #[error("call lookup failed: {0}")]
    Lookup(#[source] BackendError),
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The model answered, but not with a JSON object we can read. `raw` is the model text.
    #[error("Gemini returned unparseable JSON: {reason}")]
    Parse { reason: String, raw: String },
    #[error("failed to save analysis: {0}")]
    Persist(#[source] BackendError),
}

/// Recording lookup and batch recording sync.
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Call not found")]
    NotFound(String),
    #[error("No Vapi call ID for this call")]
    MissingProviderCallId(String),
    #[error("call lookup failed: {0}")]
    Lookup(#[source] BackendError),
    #[error(transparent)]
    Remote(#[from] PlatformError),
}

/// Browser call session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("cannot {action} while {status}")]
    InvalidTransition { status: &'static str, action: &'static str },
    #[error("transport error: {0}")]
    Transport(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
