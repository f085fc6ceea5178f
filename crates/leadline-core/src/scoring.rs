//! Call scoring: rate a finished call transcript 0-100 with a language model.
//!
//! The model is asked for a bare JSON object. Replies are fence-stripped, parsed strictly, then
//! normalized: the score is rounded and clamped, and an out-of-vocabulary qualification is
//! derived from the score.

use std::sync::Arc;

use futures_util::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::CallStore;
use crate::call::{Call, CallAnalysis, Role, TranscriptMessage};
use crate::error::ScoringError;
use crate::gemini::{GenerationSettings, LanguageModel};

/// Fewer participant messages than this and the call is not scored.
pub const MIN_SCORABLE_MESSAGES: usize = 2;

pub const DEFAULT_PURPOSE: &str = "General inquiry";

pub const SCORING_SETTINGS: GenerationSettings = GenerationSettings { temperature: 0.1, max_output_tokens: 256 };

static OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[a-z]*\n?").expect("valid regex"));
static CLOSING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualification {
    Qualified,
    Partial,
    Unqualified,
}

impl Qualification {
    /// 70 and up is qualified, 40 and up partial.
    pub fn from_score(score: u8) -> Self {
        if score >= 70 {
            Qualification::Qualified
        } else if score >= 40 {
            Qualification::Partial
        } else {
            Qualification::Unqualified
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qualified" => Some(Qualification::Qualified),
            "partial" => Some(Qualification::Partial),
            "unqualified" => Some(Qualification::Unqualified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallScore {
    pub score: u8,
    pub summary: String,
    pub qualification: Qualification,
}

impl CallScore {
    pub fn to_analysis(&self) -> CallAnalysis {
        CallAnalysis { summary: self.summary.clone(), ai_score: self.score, qualification: self.qualification }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreOutcome {
    Scored(CallScore),
    Skipped { reason: String },
}

// ---------------------------------------------------------------------------
// Prompt and parsing
// ---------------------------------------------------------------------------

/// User and assistant turns, in order.
pub fn scorable_messages(transcript: &[TranscriptMessage]) -> Vec<&TranscriptMessage> {
    transcript.iter().filter(|m| m.role.is_participant()).collect()
}

pub fn build_prompt(purpose: Option<&str>, messages: &[&TranscriptMessage]) -> String {
    let purpose = purpose.map(str::trim).filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PURPOSE);
    let conversation = messages
        .iter()
        .map(|m| {
            let speaker = if m.role == Role::Assistant { "AI" } else { "USER" };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a call quality analyser. Analyse this AI voice call transcript and respond with ONLY a valid JSON object, no markdown, no code blocks, no extra text.

Call Purpose: {purpose}

Transcript:
{conversation}

Respond with exactly this JSON:
{{
  \"score\": <integer 0-100>,
  \"summary\": \"<2-3 sentence summary of what was discussed and the outcome>\",
  \"qualification\": \"<exactly one of: qualified, partial, unqualified>\"
}}

Scoring:
- 80-100: Purpose fully achieved, lead engaged and interested
- 60-79: Good conversation, some interest shown
- 40-59: Partial engagement, purpose not fully met
- 20-39: Minimal engagement
- 0-19: No real conversation or call failed"
    )
}

/// Remove a Markdown code fence around the reply, if there is one.
pub fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = OPENING_FENCE.replace(trimmed, "");
    CLOSING_FENCE.replace(&without_open, "").trim().to_string()
}

fn numeric(v: Option<&Value>) -> f64 {
    let n = match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

/// Parse and normalize a model reply.
pub fn parse_score(raw: &str) -> Result<CallScore, ScoringError> {
    let text = strip_code_fence(raw);
    let parsed: Value = serde_json::from_str(&text)
        .map_err(|e| ScoringError::Parse { reason: e.to_string(), raw: text.clone() })?;

    let score = numeric(parsed.get("score")).round().clamp(0.0, 100.0) as u8;
    let summary = match parsed.get("summary") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let qualification = parsed
        .get("qualification")
        .and_then(Value::as_str)
        .and_then(Qualification::parse)
        .unwrap_or_else(|| Qualification::from_score(score));

    Ok(CallScore { score, summary, qualification })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Scores calls with a language model and writes the result back.
pub struct ScoringClient {
    model: Arc<dyn LanguageModel>,
}

impl ScoringClient {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Score one call record. No remote request is made for a call that is too short.
    pub async fn score(&self, call: &Call) -> Result<ScoreOutcome, ScoringError> {
        let messages = scorable_messages(&call.transcript);
        if messages.len() < MIN_SCORABLE_MESSAGES {
            return Ok(ScoreOutcome::Skipped { reason: "Not enough transcript to analyse".to_string() });
        }
        let prompt = build_prompt(call.purpose.as_deref(), &messages);
        let raw = self.model.generate(&prompt, SCORING_SETTINGS).await?;
        let score = parse_score(&raw)?;
        Ok(ScoreOutcome::Scored(score))
    }

    /// Fetch, score and persist one call.
    pub async fn analyze_call(&self, calls: &dyn CallStore, call_id: &str) -> Result<ScoreOutcome, ScoringError> {
        let call = calls.get_call(call_id).await.map_err(|e| {
            if e.is_not_found() {
                ScoringError::NotFound(call_id.to_string())
            } else {
                ScoringError::Lookup(e)
            }
        })?;

        let outcome = self.score(&call).await?;
        if let ScoreOutcome::Scored(score) = &outcome {
            calls.save_analysis(call_id, &score.to_analysis()).await.map_err(ScoringError::Persist)?;
            tracing::info!(
                "[SCORING] call {} scored {} ({:?})",
                call_id,
                score.score,
                score.qualification
            );
        }
        Ok(outcome)
    }

    /// Analyze many calls concurrently. One failure does not stop the others; returns how many
    /// were scored and saved.
    pub async fn analyze_calls(&self, calls: &dyn CallStore, call_ids: &[String]) -> usize {
        let results = join_all(call_ids.iter().map(|id| self.analyze_call(calls, id))).await;
        let mut scored = 0;
        for (id, result) in call_ids.iter().zip(results) {
            match result {
                Ok(ScoreOutcome::Scored(_)) => scored += 1,
                Ok(ScoreOutcome::Skipped { reason }) => {
                    tracing::info!("[SCORING] call {} skipped: {}", id, reason)
                }
                Err(e) => tracing::warn!("[SCORING] call {} failed: {}", id, e),
            }
        }
        scored
    }
}

// ---------------------------------------------------------------------------
// Detached dispatch
// ---------------------------------------------------------------------------

/// Result of one background analysis.
#[derive(Debug)]
pub struct ScoringReport {
    pub call_id: String,
    pub result: Result<ScoreOutcome, ScoringError>,
}

/// Runs analyses as detached tasks and reports each outcome on its own channel, so a session
/// never waits on scoring.
#[derive(Clone)]
pub struct ScoringDispatcher {
    client: Arc<ScoringClient>,
    calls: Arc<dyn CallStore>,
    outcome_tx: mpsc::UnboundedSender<ScoringReport>,
}

impl ScoringDispatcher {
    pub fn new(
        client: Arc<ScoringClient>,
        calls: Arc<dyn CallStore>,
    ) -> (Self, mpsc::UnboundedReceiver<ScoringReport>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        (Self { client, calls, outcome_tx }, outcome_rx)
    }

    pub fn submit(&self, call_id: String) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let calls = Arc::clone(&self.calls);
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = client.analyze_call(calls.as_ref(), &call_id).await;
            if let Err(e) = &result {
                tracing::warn!("[SCORING] background analysis of {} failed: {}", call_id, e);
            }
            let _ = tx.send(ScoringReport { call_id, result });
        })
    }
}
