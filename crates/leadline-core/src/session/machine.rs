//! `CallSession`: the state machine for one browser call attempt.
//!
//! Pure with respect to I/O. Every accepted input mutates `CallSessionState`, publishes a
//! snapshot on the updates channel, and may return a `SessionEffect` for the driver to execute.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::event::{is_ejection, is_transient, SessionEvent};
use crate::agent::Agent;
use crate::call::{duration_seconds, Role, TranscriptMessage, WebCallLog};
use crate::error::{SessionError, SessionResult};

pub const CONNECTED_LINE: &str = "Call connected.";
pub const ENDED_LINE: &str = "Call ended.";
pub const MIC_DENIED_MESSAGE: &str =
    "Microphone access denied. Please allow microphone in your browser settings.";
pub const START_FAILED_MESSAGE: &str = "Failed to start call";
pub const CUSTOM_PURPOSE: &str = "Custom call";
pub const COMPLETED_STATUS: &str = "completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Idle,
    Connecting,
    Connected,
    Ended,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Idle => "idle",
            CallStatus::Connecting => "connecting",
            CallStatus::Connected => "connected",
            CallStatus::Ended => "ended",
            CallStatus::Error => "error",
        }
    }

    /// Connecting or connected: the transport is (or is about to be) up.
    pub fn is_live(&self) -> bool {
        matches!(self, CallStatus::Connecting | CallStatus::Connected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Error)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallSessionState {
    pub status: CallStatus,
    pub is_muted: bool,
    pub transcript: Vec<TranscriptMessage>,
    pub is_user_speaking: bool,
    pub is_agent_speaking: bool,
    /// Microphone level, always within `0.0..=1.0`.
    pub volume_level: f32,
    pub provider_call_id: Option<String>,
    pub recording_url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Default for CallSessionState {
    fn default() -> Self {
        Self {
            status: CallStatus::Idle,
            is_muted: false,
            transcript: Vec::new(),
            is_user_speaking: false,
            is_agent_speaking: false,
            volume_level: 0.0,
            provider_call_id: None,
            recording_url: None,
            started_at: None,
            error: None,
        }
    }
}

/// Who the call is for and why; copied into the persisted log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub lead_id: String,
    pub purpose: String,
    pub language: String,
}

impl CallContext {
    pub fn new(lead_id: impl Into<String>, purpose: impl Into<String>, language: impl Into<String>) -> Self {
        Self { lead_id: lead_id.into(), purpose: purpose.into(), language: language.into() }
    }

    /// Context for a call placed with a saved agent.
    pub fn for_agent(lead_id: impl Into<String>, agent: &Agent) -> Self {
        Self::new(lead_id, agent.purpose_label(), agent.language.clone())
    }

    /// Context for an ad-hoc call. The caller's free-text details are the call purpose;
    /// blank details fall back to `CUSTOM_PURPOSE`.
    pub fn custom(lead_id: impl Into<String>, details: &str, language: impl Into<String>) -> Self {
        let details = details.trim();
        let purpose = if details.is_empty() { CUSTOM_PURPOSE } else { details };
        Self::new(lead_id, purpose, language)
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Persist the finished call. Emitted at most once per session.
    Persist(WebCallLog),
}

/// Snapshot published after every applied input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUpdate {
    pub seq: u64,
    pub state: CallSessionState,
}

pub struct CallSession {
    context: CallContext,
    state: CallSessionState,
    seq: u64,
    update_tx: mpsc::UnboundedSender<SessionUpdate>,
}

impl CallSession {
    pub fn new(context: CallContext) -> (Self, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let session = Self { context, state: CallSessionState::default(), seq: 0, update_tx };
        (session, update_rx)
    }

    pub fn state(&self) -> &CallSessionState {
        &self.state
    }

    pub fn status(&self) -> CallStatus {
        self.state.status
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    fn publish(&mut self) {
        self.seq += 1;
        let _ = self.update_tx.send(SessionUpdate { seq: self.seq, state: self.state.clone() });
    }

    fn reject(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition { status: self.state.status.as_str(), action }
    }

    // -----------------------------------------------------------------------
    // Caller-driven transitions
    // -----------------------------------------------------------------------

    /// Idle -> Connecting. Clears anything left from a previous attempt.
    pub fn begin(&mut self) -> SessionResult<()> {
        if self.state.status != CallStatus::Idle {
            return Err(self.reject("start"));
        }
        self.state = CallSessionState { status: CallStatus::Connecting, ..CallSessionState::default() };
        tracing::info!("[SESSION] connecting call for lead {}", self.context.lead_id);
        self.publish();
        Ok(())
    }

    /// Connecting | Connected -> Error.
    pub fn fail(&mut self, message: impl Into<String>) -> SessionResult<()> {
        if !self.state.status.is_live() {
            return Err(self.reject("fail"));
        }
        self.enter_error(message.into());
        Ok(())
    }

    /// The transport refused to start. Ejection-style failures mean the meeting is already
    /// over and end the session; anything else is an error.
    pub fn start_failed(&mut self, message: &str) -> SessionResult<()> {
        if !self.state.status.is_live() {
            return Err(self.reject("fail"));
        }
        if is_ejection(message) {
            tracing::info!("[SESSION] start rejected by ended meeting: {}", message);
            self.state.status = CallStatus::Ended;
            self.clear_activity();
            self.publish();
            return Ok(());
        }
        let message = if message.trim().is_empty() { START_FAILED_MESSAGE } else { message };
        self.fail(message)
    }

    /// User hang-up. Finalises exactly like a `call-end` event; a later `call-end` is ignored.
    pub fn hang_up(&mut self, now: DateTime<Utc>) -> SessionResult<SessionEffect> {
        if !self.state.status.is_live() {
            return Err(self.reject("hang up"));
        }
        tracing::info!("[SESSION] hang-up requested");
        Ok(self.finalize(now, None))
    }

    pub fn set_muted(&mut self, muted: bool) -> SessionResult<()> {
        if !self.state.status.is_live() {
            return Err(self.reject("mute"));
        }
        self.state.is_muted = muted;
        self.publish();
        Ok(())
    }

    /// Error -> Idle with a fresh state. The context and updates channel carry over.
    pub fn retry(&mut self) -> SessionResult<()> {
        if self.state.status != CallStatus::Error {
            return Err(self.reject("retry"));
        }
        self.state = CallSessionState::default();
        self.publish();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transport events
    // -----------------------------------------------------------------------

    /// Apply one normalized transport event received at `now`.
    pub fn apply(&mut self, event: SessionEvent, now: DateTime<Utc>) -> Option<SessionEffect> {
        let status = self.state.status;
        match event {
            SessionEvent::CallStart { call_id } if status == CallStatus::Connecting => {
                self.state.status = CallStatus::Connected;
                self.state.started_at = Some(now);
                if call_id.is_some() {
                    self.state.provider_call_id = call_id;
                }
                self.state.transcript = vec![TranscriptMessage::system(CONNECTED_LINE, now)];
                tracing::info!(
                    "[SESSION] connected (provider call {})",
                    self.state.provider_call_id.as_deref().unwrap_or("unknown")
                );
                self.publish();
                None
            }
            SessionEvent::CallEnd { recording_url } if status.is_live() => Some(self.finalize(now, recording_url)),
            SessionEvent::CallEnd { .. } => {
                tracing::debug!("[SESSION] call-end ignored while {}", status);
                None
            }
            SessionEvent::Error(message) if status.is_live() => {
                if is_transient(&message) {
                    tracing::warn!("[SESSION] transient transport error ignored: {}", message);
                } else {
                    self.enter_error(message);
                }
                None
            }
            event if status.is_live() => {
                if self.apply_live(event, now) {
                    self.publish();
                }
                None
            }
            event => {
                tracing::debug!("[SESSION] {:?} ignored while {}", event, status);
                None
            }
        }
    }

    /// Caller has checked the session is live.
    fn enter_error(&mut self, message: String) {
        tracing::error!("[SESSION] call failed: {}", message);
        self.state.status = CallStatus::Error;
        self.state.error = Some(message);
        self.clear_activity();
        self.publish();
    }

    /// Activity events while the call is up. Returns whether anything changed.
    fn apply_live(&mut self, event: SessionEvent, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        if self.state.provider_call_id.is_none() {
            if let Some(id) = event.message_call_id() {
                self.state.provider_call_id = Some(id.to_string());
                changed = true;
            }
        }

        match event {
            SessionEvent::Transcript { role, text, is_final, .. } => {
                if is_final && !text.trim().is_empty() {
                    self.state.transcript.push(TranscriptMessage::new(role, text, now));
                    changed = true;
                }
            }
            SessionEvent::SpeechUpdate { role, started, .. } => match role {
                Role::Assistant => {
                    self.state.is_agent_speaking = started;
                    changed = true;
                }
                Role::User => {
                    self.state.is_user_speaking = started;
                    changed = true;
                }
                _ => {}
            },
            SessionEvent::CallUpdate { recording_url: Some(url), .. } => {
                self.state.recording_url = Some(url);
                changed = true;
            }
            SessionEvent::SpeechStart => {
                self.state.is_user_speaking = true;
                changed = true;
            }
            SessionEvent::SpeechEnd => {
                self.state.is_user_speaking = false;
                self.state.volume_level = 0.0;
                changed = true;
            }
            SessionEvent::Volume(level) => {
                self.state.volume_level = clamp_volume(level);
                changed = true;
            }
            _ => {}
        }
        changed
    }

    fn clear_activity(&mut self) {
        self.state.is_user_speaking = false;
        self.state.is_agent_speaking = false;
        self.state.volume_level = 0.0;
    }

    /// Live -> Ended. Builds the log from the transcript as it stands, then appends the local
    /// "ended" line.
    fn finalize(&mut self, now: DateTime<Utc>, recording_url: Option<String>) -> SessionEffect {
        if recording_url.is_some() {
            self.state.recording_url = recording_url;
        }
        let started_at = self.state.started_at;
        let log = WebCallLog {
            lead_id: self.context.lead_id.clone(),
            purpose: self.context.purpose.clone(),
            language: self.context.language.clone(),
            transcript: self.state.transcript.clone(),
            provider_call_id: self.state.provider_call_id.clone(),
            recording_url: self.state.recording_url.clone(),
            start_time: started_at,
            end_time: now,
            duration_seconds: started_at.map(|start| duration_seconds(start, now)),
            status: COMPLETED_STATUS.to_string(),
        };

        self.state.status = CallStatus::Ended;
        self.clear_activity();
        self.state.transcript.push(TranscriptMessage::system(ENDED_LINE, now));
        tracing::info!(
            "[SESSION] call ended after {}s with {} transcript lines",
            log.duration_seconds.unwrap_or(0),
            log.transcript.len()
        );
        self.publish();
        SessionEffect::Persist(log)
    }
}

fn clamp_volume(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
    }

    fn connected() -> (CallSession, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (mut s, rx) = CallSession::new(CallContext::new("lead-1", "[Riya] Sales", "en"));
        s.begin().unwrap();
        s.apply(SessionEvent::CallStart { call_id: Some("v1".into()) }, t0());
        (s, rx)
    }

    fn final_line(role: Role, text: &str) -> SessionEvent {
        SessionEvent::Transcript { role, text: text.into(), is_final: true, call_id: None }
    }

    #[test]
    fn test_full_call_persists_transcript_once() {
        let (mut s, _rx) = connected();
        s.apply(final_line(Role::Assistant, "Hi, this is Riya."), t0() + Duration::seconds(2));
        s.apply(final_line(Role::User, "Hello."), t0() + Duration::seconds(4));
        let end = t0() + Duration::milliseconds(12_600);

        let Some(SessionEffect::Persist(log)) = s.apply(SessionEvent::CallEnd { recording_url: None }, end) else {
            panic!("expected a persist effect");
        };
        assert_eq!(log.transcript.len(), 3);
        assert_eq!(log.transcript[0].content, CONNECTED_LINE);
        assert_eq!(log.duration_seconds, Some(13));
        assert_eq!(log.provider_call_id.as_deref(), Some("v1"));
        assert_eq!(log.status, "completed");
        assert_eq!(s.state().transcript.len(), 4);
        assert_eq!(s.state().transcript[3].content, ENDED_LINE);

        assert_eq!(s.apply(SessionEvent::CallEnd { recording_url: None }, end), None);
        assert_eq!(s.status(), CallStatus::Ended);
    }

    #[test]
    fn test_non_final_and_empty_lines_are_dropped() {
        let (mut s, _rx) = connected();
        s.apply(
            SessionEvent::Transcript { role: Role::User, text: "Hel".into(), is_final: false, call_id: None },
            t0(),
        );
        s.apply(final_line(Role::User, "   "), t0());
        assert_eq!(s.state().transcript.len(), 1);
    }

    #[test]
    fn test_transient_error_keeps_state() {
        let (mut s, _rx) = connected();
        s.apply(SessionEvent::Error("Meeting has ended".into()), t0());
        assert_eq!(s.status(), CallStatus::Connected);

        let (mut c, _rx) = CallSession::new(CallContext::custom("lead-2", "Ask about the renewal", "en"));
        c.begin().unwrap();
        c.apply(SessionEvent::Error("ably: not connected".into()), t0());
        assert_eq!(c.status(), CallStatus::Connecting);
    }

    #[test]
    fn test_fatal_error_and_retry() {
        let (mut s, _rx) = connected();
        s.apply(SessionEvent::Error("Assistant not found".into()), t0());
        assert_eq!(s.status(), CallStatus::Error);
        assert_eq!(s.state().error.as_deref(), Some("Assistant not found"));
        assert_eq!(s.apply(SessionEvent::CallEnd { recording_url: None }, t0()), None);

        s.retry().unwrap();
        assert_eq!(s.state(), &CallSessionState::default());
        s.begin().unwrap();
        assert_eq!(s.status(), CallStatus::Connecting);
    }

    #[test]
    fn test_terminal_states_reject_actions() {
        let (mut s, _rx) = connected();
        s.hang_up(t0()).unwrap();
        assert!(matches!(s.hang_up(t0()), Err(SessionError::InvalidTransition { status: "ended", .. })));
        assert!(s.set_muted(true).is_err());
        assert!(s.retry().is_err());
        assert!(s.begin().is_err());
    }

    #[test]
    fn test_hang_up_then_late_end_persists_once() {
        let (mut s, _rx) = connected();
        let effect = s.hang_up(t0() + Duration::seconds(5)).unwrap();
        assert!(matches!(effect, SessionEffect::Persist(ref log) if log.duration_seconds == Some(5)));
        assert_eq!(s.apply(SessionEvent::CallEnd { recording_url: Some("https://r/late".into()) }, t0()), None);
    }

    #[test]
    fn test_speech_and_volume_indicators() {
        let (mut s, _rx) = connected();
        s.apply(SessionEvent::SpeechUpdate { role: Role::Assistant, started: true, call_id: None }, t0());
        assert!(s.state().is_agent_speaking);
        s.apply(SessionEvent::SpeechStart, t0());
        s.apply(SessionEvent::Volume(1.7), t0());
        assert!(s.state().is_user_speaking);
        assert_eq!(s.state().volume_level, 1.0);
        s.apply(SessionEvent::Volume(-0.2), t0());
        assert_eq!(s.state().volume_level, 0.0);
        s.apply(SessionEvent::Volume(0.4), t0());
        s.apply(SessionEvent::SpeechEnd, t0());
        assert!(!s.state().is_user_speaking);
        assert_eq!(s.state().volume_level, 0.0);
    }

    #[test]
    fn test_call_id_and_recording_from_messages() {
        let (mut s, _rx) = CallSession::new(CallContext::custom("lead-3", "Confirm the Friday site visit", "hi"));
        s.begin().unwrap();
        s.apply(SessionEvent::CallStart { call_id: None }, t0());
        s.apply(SessionEvent::Unknown { kind: "message:status-update".into(), call_id: Some("v9".into()) }, t0());
        s.apply(SessionEvent::CallUpdate { recording_url: Some("https://r/9".into()), call_id: Some("other".into()) }, t0());
        assert_eq!(s.state().provider_call_id.as_deref(), Some("v9"));

        let Some(SessionEffect::Persist(log)) = s.apply(SessionEvent::CallEnd { recording_url: None }, t0()) else {
            panic!("expected a persist effect");
        };
        assert_eq!(log.recording_url.as_deref(), Some("https://r/9"));
        assert_eq!(log.purpose, "Confirm the Friday site visit");
    }

    #[test]
    fn test_start_failure_classification() {
        let (mut s, _rx) = CallSession::new(CallContext::custom("lead-4", "Follow up", "en"));
        s.begin().unwrap();
        s.start_failed("Meeting has ended").unwrap();
        assert_eq!(s.status(), CallStatus::Ended);

        let (mut e, _rx) = CallSession::new(CallContext::custom("lead-4", "Follow up", "en"));
        e.begin().unwrap();
        e.start_failed("").unwrap();
        assert_eq!(e.state().error.as_deref(), Some(START_FAILED_MESSAGE));
    }

    #[test]
    fn test_context_purpose() {
        assert_eq!(CallContext::custom("lead-5", "  Quote for 3kW rooftop  ", "en").purpose, "Quote for 3kW rooftop");
        assert_eq!(CallContext::custom("lead-5", "   ", "en").purpose, CUSTOM_PURPOSE);

        let agent = crate::testing::sample_agent("a1", "asst-1");
        let ctx = CallContext::for_agent("lead-5", &agent);
        assert_eq!(ctx.purpose, agent.purpose_label());
        assert_eq!(ctx.language, agent.language);
    }

    #[test]
    fn test_ordinary_error_while_connecting_fails_session() {
        let (mut s, mut rx) = CallSession::new(CallContext::custom("lead-6", "Follow up", "en"));
        s.begin().unwrap();
        s.apply(SessionEvent::Error("Assistant not found".into()), t0());
        assert_eq!(s.status(), CallStatus::Error);
        let last = std::iter::from_fn(|| rx.try_recv().ok()).last().unwrap();
        assert_eq!(last.state.status, CallStatus::Error);
        assert_eq!(last.state.error.as_deref(), Some("Assistant not found"));
    }

    #[test]
    fn test_updates_are_published_in_order() {
        let (mut s, mut rx) = connected();
        s.set_muted(true).unwrap();
        let seqs: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok()).map(|u| u.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);

        s.apply(SessionEvent::CallStart { call_id: None }, t0());
        assert!(rx.try_recv().is_err());
    }
}
