//! Leadline core: the domain layer behind the lead-calling console.
//!
//! - **catalog / fallback**: static provider tables per language and the resolver that turns an
//!   optional user choice into a primary provider plus an ordered fallback plan.
//! - **agent / provisioning / sync**: agent records mirrored between the local backend and the
//!   voice platform's assistants, including drift reconciliation.
//! - **call / recordings / scoring**: call records, recording lookup, and LLM lead scoring.
//! - **session**: the browser-call state machine and its async driver.
//! - **backend / vapi / gemini**: HTTP collaborators behind object-safe traits.

pub mod agent;
pub mod backend;
pub mod call;
pub mod catalog;
pub mod error;
pub mod fallback;
pub mod gemini;
mod http;
pub mod provisioning;
pub mod recordings;
pub mod scoring;
pub mod session;
pub mod sync;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod vapi;

pub use agent::{Agent, AgentCategory, AgentCreate, AgentPatch, AgentSave, AgentUpdate};
pub use backend::{AgentStore, CallStore, RestBackend};
pub use call::{Call, CallAnalysis, Role, TranscriptMessage, WebCallLog};
pub use catalog::{ModelOption, ProviderRef, TranscriberOption, VoiceOption};
pub use error::{
    BackendError, ModelError, PlatformError, ProvisionError, RecordingError, ScoringError,
    SessionError, SyncError,
};
pub use fallback::{FallbackPlan, ModelSelection, ProviderKind, ProviderSelection};
pub use gemini::{GeminiClient, GenerationSettings, LanguageModel};
pub use http::build_http_client;
pub use scoring::{CallScore, Qualification, ScoreOutcome, ScoringClient, ScoringDispatcher};
pub use session::{CallContext, CallSession, CallSessionState, CallStatus, SessionConfig, SessionDriver};
pub use vapi::{Assistant, RemoteCall, VapiClient, VoicePlatform};
