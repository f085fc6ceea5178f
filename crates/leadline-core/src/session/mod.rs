//! Browser call sessions.
//!
//! - **event**: raw transport events normalized into `SessionEvent`.
//! - **machine**: `CallSession`, the pure state machine (idle, connecting, connected, ended, error).
//! - **driver**: `SessionDriver`, which owns a session, starts the transport, persists the finished
//!   call once and hands it to scoring.

mod driver;
mod event;
mod machine;

use std::time::Duration;

pub use driver::{
    CallTarget, CallTransport, MicrophonePermission, NoPermissionApi, PermissionState, SessionDriver,
    SessionInput,
};
pub use event::{
    error_message, is_ejection, is_transient, normalize, RawTransportEvent, SessionEvent, EJECTION_MARKERS,
    TRANSIENT_ERROR_MARKERS,
};
pub use machine::{
    CallContext, CallSession, CallSessionState, CallStatus, SessionEffect, SessionUpdate, CONNECTED_LINE,
    ENDED_LINE, MIC_DENIED_MESSAGE,
};

pub const DEFAULT_PERMISSION_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on the microphone permission query before starting anyway.
    pub permission_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { permission_timeout: Duration::from_millis(DEFAULT_PERMISSION_TIMEOUT_MS) }
    }
}

impl SessionConfig {
    pub fn with_permission_timeout_ms(ms: u64) -> Self {
        Self { permission_timeout: Duration::from_millis(ms) }
    }
}
