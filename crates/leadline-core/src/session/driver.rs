//! Async driver: owns a `CallSession`, talks to the transport, and executes effects.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::event::{normalize, RawTransportEvent};
use super::machine::{CallContext, CallSession, SessionEffect, SessionUpdate, MIC_DENIED_MESSAGE};
use super::{CallStatus, SessionConfig};
use crate::backend::CallStore;
use crate::error::{SessionError, SessionResult};
use crate::fallback::{self, ProviderKind};
use crate::scoring::ScoringDispatcher;

pub const INLINE_ASSISTANT_NAME: &str = "Business Assistant";
pub const INLINE_MODEL_PROVIDER: &str = "google";
pub const INLINE_MODEL: &str = "gemini-2.0-flash";
pub const INLINE_SILENCE_TIMEOUT_SECS: u64 = 90;

/// What the transport should dial.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    /// Saved assistant; every setting comes from the platform.
    Assistant(String),
    /// Ad-hoc assistant configuration sent with the start request.
    Inline(Value),
}

impl CallTarget {
    /// Inline assistant for a custom call: the recommended voice and transcriber for the
    /// context's language with their fallback plans, and a single system message. The
    /// context carries the caller's details into the persisted log and the scoring prompt.
    pub fn custom(context: &CallContext, system_prompt: &str, first_message: &str) -> Self {
        let voice = fallback::resolve(ProviderKind::Voice, &context.language, None);
        let transcriber = fallback::resolve(ProviderKind::Transcriber, &context.language, None);
        CallTarget::Inline(json!({
            "name": INLINE_ASSISTANT_NAME,
            "firstMessage": first_message,
            "transcriber": transcriber.to_payload(),
            "model": {
                "provider": INLINE_MODEL_PROVIDER,
                "model": INLINE_MODEL,
                "messages": [{ "role": "system", "content": system_prompt }],
            },
            "voice": voice.to_payload(),
            "silenceTimeoutSeconds": INLINE_SILENCE_TIMEOUT_SECS,
        }))
    }
}

/// Real-time voice transport. Events flow back through `SessionInput::Transport`.
#[async_trait]
pub trait CallTransport: Send + Sync {
    async fn start(&self, target: &CallTarget) -> SessionResult<()>;
    async fn stop(&self);
    async fn set_muted(&self, muted: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Prompt,
    Denied,
}

/// Microphone permission probe. `None` means the platform cannot tell, and the transport
/// will ask for the microphone itself.
#[async_trait]
pub trait MicrophonePermission: Send + Sync {
    async fn query(&self) -> Option<PermissionState>;
}

/// Probe for hosts without a permissions API.
pub struct NoPermissionApi;

#[async_trait]
impl MicrophonePermission for NoPermissionApi {
    async fn query(&self) -> Option<PermissionState> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Transport(RawTransportEvent),
    HangUp,
    ToggleMute,
}

pub struct SessionDriver {
    session: CallSession,
    config: SessionConfig,
    transport: Arc<dyn CallTransport>,
    permission: Arc<dyn MicrophonePermission>,
    calls: Arc<dyn CallStore>,
    scoring: Option<ScoringDispatcher>,
    persisted_call_id: Option<String>,
}

impl SessionDriver {
    pub fn new(
        context: CallContext,
        config: SessionConfig,
        transport: Arc<dyn CallTransport>,
        permission: Arc<dyn MicrophonePermission>,
        calls: Arc<dyn CallStore>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (session, updates) = CallSession::new(context);
        let driver = Self {
            session,
            config,
            transport,
            permission,
            calls,
            scoring: None,
            persisted_call_id: None,
        };
        (driver, updates)
    }

    /// Score each persisted call in the background.
    pub fn with_scoring(mut self, dispatcher: ScoringDispatcher) -> Self {
        self.scoring = Some(dispatcher);
        self
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    /// Backend id of the stored call once the session has been persisted.
    pub fn persisted_call_id(&self) -> Option<&str> {
        self.persisted_call_id.as_deref()
    }

    /// Check the microphone, then start the transport. Denial and start failures land in the
    /// session state; only an invalid transition is returned as an error.
    pub async fn start(&mut self, target: &CallTarget) -> SessionResult<()> {
        self.session.begin()?;

        match tokio::time::timeout(self.config.permission_timeout, self.permission.query()).await {
            Ok(Some(PermissionState::Denied)) => {
                tracing::warn!("[SESSION] microphone permission denied");
                return self.session.fail(MIC_DENIED_MESSAGE);
            }
            Ok(_) => {}
            Err(_) => tracing::warn!(
                "[SESSION] permission query timed out after {:?}; leaving it to the transport",
                self.config.permission_timeout
            ),
        }

        if let Err(e) = self.transport.start(target).await {
            let message = match e {
                SessionError::Transport(m) => m,
                other => other.to_string(),
            };
            self.session.start_failed(&message)?;
        }
        Ok(())
    }

    pub async fn handle_event(&mut self, raw: RawTransportEvent) {
        let event = normalize(&raw);
        if let Some(effect) = self.session.apply(event, Utc::now()) {
            self.execute(effect).await;
        }
    }

    pub async fn hang_up(&mut self) -> SessionResult<()> {
        let effect = self.session.hang_up(Utc::now())?;
        self.transport.stop().await;
        self.execute(effect).await;
        Ok(())
    }

    pub async fn toggle_mute(&mut self) -> SessionResult<()> {
        let muted = !self.session.state().is_muted;
        self.session.set_muted(muted)?;
        self.transport.set_muted(muted).await;
        Ok(())
    }

    pub fn retry(&mut self) -> SessionResult<()> {
        self.persisted_call_id = None;
        self.session.retry()
    }

    /// Feed inputs until the session reaches a terminal state or the input channel closes.
    pub async fn run(&mut self, mut inputs: mpsc::UnboundedReceiver<SessionInput>) -> CallStatus {
        while let Some(input) = inputs.recv().await {
            match input {
                SessionInput::Transport(raw) => self.handle_event(raw).await,
                SessionInput::HangUp => {
                    if let Err(e) = self.hang_up().await {
                        tracing::debug!("[SESSION] {}", e);
                    }
                }
                SessionInput::ToggleMute => {
                    if let Err(e) = self.toggle_mute().await {
                        tracing::debug!("[SESSION] {}", e);
                    }
                }
            }
            if self.session.status().is_terminal() {
                break;
            }
        }
        self.session.status()
    }

    async fn execute(&mut self, effect: SessionEffect) {
        match effect {
            SessionEffect::Persist(log) => match self.calls.log_web_call(&log).await {
                Ok(call_id) => {
                    tracing::info!("[SESSION] call logged as {}", call_id);
                    if let Some(dispatcher) = &self.scoring {
                        // Detached: the session never waits on scoring.
                        let _ = dispatcher.submit(call_id.clone());
                    }
                    self.persisted_call_id = Some(call_id);
                }
                Err(e) => tracing::error!("[SESSION] failed to log call for lead {}: {}", log.lead_id, e),
            },
        }
    }
}
