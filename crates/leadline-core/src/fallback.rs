//! Fallback resolver: primary provider plus an ordered same-language fallback plan.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::catalog::{self, CatalogOption, ModelOption, ProviderRef, TranscriberOption, VoiceOption};

/// Which kind of provider a selection is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Voice,
    Transcriber,
}

/// Ordered alternates the platform tries when the primary fails. Never contains the primary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackPlan {
    pub entries: Vec<ProviderRef>,
}

/// Primary plus fallbacks for one provider kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub kind: ProviderKind,
    pub primary: ProviderRef,
    pub fallback_plan: FallbackPlan,
}

/// Language model choice. Not language-specific.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub provider: String,
    pub model: String,
}

/// The three option lists shown in the agent builder for one language.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderOptions {
    pub voices: &'static [VoiceOption],
    pub transcribers: &'static [TranscriberOption],
    pub models: &'static [ModelOption],
}

const EN_DEFAULT_VOICE: (&str, &str) = ("openai", "echo");
const EN_DEFAULT_TRANSCRIBER: (&str, &str, &str) = ("google", "English", "gemini-2.0-flash-lite");
const DEFAULT_MODEL: (&str, &str) = ("google", "gemini-2.0-flash-lite");

/// Resolve the primary and fallback plan for `kind` in `language`.
///
/// A given selection is used verbatim as the primary; otherwise the language's recommended
/// entry is. Fallbacks come from the language's fallback table in catalog order, minus any entry
/// naming the same provider and id as the primary. Unknown languages use the English tables.
pub fn resolve(kind: ProviderKind, language: &str, selection: Option<ProviderRef>) -> ProviderSelection {
    let table = catalog::language_or_default(language);
    let (recommended, fallbacks) = match kind {
        ProviderKind::Voice => (
            catalog::recommended(table.voices).map(CatalogOption::to_ref),
            table.voice_fallbacks,
        ),
        ProviderKind::Transcriber => (
            catalog::recommended(table.transcribers).map(CatalogOption::to_ref),
            table.transcriber_fallbacks,
        ),
    };

    let primary = selection.or(recommended).unwrap_or_else(|| match kind {
        ProviderKind::Voice => ProviderRef::new(EN_DEFAULT_VOICE.0, EN_DEFAULT_VOICE.1),
        ProviderKind::Transcriber => {
            ProviderRef::new(EN_DEFAULT_TRANSCRIBER.0, EN_DEFAULT_TRANSCRIBER.1)
                .with_model(EN_DEFAULT_TRANSCRIBER.2)
        }
    });

    let entries = fallbacks
        .iter()
        .map(|f| f.to_ref())
        .filter(|f| !f.same_target(&primary))
        .collect();

    ProviderSelection { kind, primary, fallback_plan: FallbackPlan { entries } }
}

/// The given model, else the recommended global model.
pub fn resolve_model(selection: Option<ModelSelection>) -> ModelSelection {
    selection.unwrap_or_else(|| {
        catalog::recommended(catalog::models())
            .map(|m| ModelSelection { provider: m.provider.to_string(), model: m.model.to_string() })
            .unwrap_or_else(|| ModelSelection {
                provider: DEFAULT_MODEL.0.to_string(),
                model: DEFAULT_MODEL.1.to_string(),
            })
    })
}

/// Option lists for the builder, falling back to English for unknown languages.
pub fn options_for(language: &str) -> ProviderOptions {
    let table = catalog::language_or_default(language);
    ProviderOptions { voices: table.voices, transcribers: table.transcribers, models: catalog::models() }
}

fn entry_json(kind: ProviderKind, r: &ProviderRef) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("provider".into(), json!(r.provider));
    match kind {
        ProviderKind::Voice => {
            obj.insert("voiceId".into(), json!(r.id));
        }
        ProviderKind::Transcriber => {
            obj.insert("language".into(), json!(r.id));
        }
    }
    if let Some(model) = &r.model {
        obj.insert("model".into(), json!(model));
    }
    Value::Object(obj)
}

impl ProviderSelection {
    /// Outbound assistant payload fragment:
    /// `{provider, voiceId, fallbackPlan: {voices}}` or
    /// `{provider, language, model?, fallbackPlan: {transcribers}}`.
    pub fn to_payload(&self) -> Value {
        let mut payload = entry_json(self.kind, &self.primary);
        let list_key = match self.kind {
            ProviderKind::Voice => "voices",
            ProviderKind::Transcriber => "transcribers",
        };
        let entries: Vec<Value> =
            self.fallback_plan.entries.iter().map(|e| entry_json(self.kind, e)).collect();
        let mut plan = serde_json::Map::new();
        plan.insert(list_key.into(), Value::Array(entries));
        if let Value::Object(obj) = &mut payload {
            obj.insert("fallbackPlan".into(), Value::Object(plan));
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_voice_for_hindi() {
        let sel = resolve(ProviderKind::Voice, "hi", None);
        assert_eq!(sel.primary, ProviderRef::new("azure", "hi-IN-SwaraNeural"));
        assert_eq!(sel.fallback_plan.entries, vec![ProviderRef::new("azure", "hi-IN-MadhurNeural")]);
    }

    #[test]
    fn test_unknown_language_resolves_to_english() {
        let sel = resolve(ProviderKind::Voice, "xx", None);
        assert_eq!(sel.primary, ProviderRef::new("openai", "echo"));
        let ids: Vec<&str> = sel.fallback_plan.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["en-US-JennyNeural", "lily"]);
    }

    #[test]
    fn test_selected_primary_is_removed_from_fallbacks() {
        let sel = resolve(ProviderKind::Voice, "en", Some(ProviderRef::new("azure", "en-US-JennyNeural")));
        assert_eq!(sel.primary.id, "en-US-JennyNeural");
        assert_eq!(sel.fallback_plan.entries, vec![ProviderRef::new("lmnt", "lily")]);
    }

    #[test]
    fn test_same_voice_id_other_provider_is_kept() {
        let sel = resolve(ProviderKind::Voice, "es", Some(ProviderRef::new("azure", "nova")));
        assert_eq!(sel.fallback_plan.entries, vec![ProviderRef::new("openai", "nova")]);
        let sel = resolve(ProviderKind::Voice, "es", Some(ProviderRef::new("openai", "nova")));
        assert!(sel.fallback_plan.entries.is_empty());
    }

    #[test]
    fn test_transcriber_default_carries_model() {
        let sel = resolve(ProviderKind::Transcriber, "en", None);
        assert_eq!(sel.primary.model.as_deref(), Some("gemini-2.0-flash-lite"));
        assert_eq!(sel.fallback_plan.entries, vec![ProviderRef::new("deepgram", "en").with_model("nova-2")]);
    }

    #[test]
    fn test_voice_payload_shape() {
        let payload = resolve(ProviderKind::Voice, "ta", None).to_payload();
        assert_eq!(
            payload,
            json!({
                "provider": "azure",
                "voiceId": "ta-IN-PallaviNeural",
                "fallbackPlan": { "voices": [{ "provider": "azure", "voiceId": "ta-IN-ValluvarNeural" }] }
            })
        );
    }

    #[test]
    fn test_transcriber_payload_omits_absent_model() {
        let payload = resolve(ProviderKind::Transcriber, "ar", None).to_payload();
        assert_eq!(payload["language"], "ar-SA");
        assert!(payload.get("model").is_none());
        assert_eq!(payload["fallbackPlan"]["transcribers"][0], json!({ "provider": "talkscriber", "language": "ar" }));
    }

    #[test]
    fn test_resolve_model_default_and_override() {
        assert_eq!(resolve_model(None).model, "gemini-2.0-flash-lite");
        let pick = ModelSelection { provider: "openai".into(), model: "gpt-4o".into() };
        assert_eq!(resolve_model(Some(pick.clone())), pick);
    }

    #[test]
    fn test_options_for_unknown_language() {
        let opts = options_for("zz");
        assert_eq!(opts.voices[0].voice_id, "echo");
        assert_eq!(opts.models.len(), 5);
    }

    #[test]
    fn test_every_language_and_selection_keeps_primary_out_of_fallbacks() {
        for lang in catalog::languages() {
            for kind in [ProviderKind::Voice, ProviderKind::Transcriber] {
                let (recommended, options, fallbacks): (ProviderRef, Vec<ProviderRef>, Vec<ProviderRef>) = match kind {
                    ProviderKind::Voice => (
                        catalog::recommended(lang.voices).unwrap().to_ref(),
                        lang.voices.iter().map(CatalogOption::to_ref).collect(),
                        lang.voice_fallbacks.iter().map(|f| f.to_ref()).collect(),
                    ),
                    ProviderKind::Transcriber => (
                        catalog::recommended(lang.transcribers).unwrap().to_ref(),
                        lang.transcribers.iter().map(CatalogOption::to_ref).collect(),
                        lang.transcriber_fallbacks.iter().map(|f| f.to_ref()).collect(),
                    ),
                };

                let selections = std::iter::once(None)
                    .chain(options.iter().cloned().map(Some))
                    .chain(fallbacks.iter().cloned().map(Some));
                for selection in selections {
                    let sel = resolve(kind, lang.code, selection.clone());
                    let expected = selection.unwrap_or_else(|| recommended.clone());
                    assert_eq!(sel.primary, expected, "{} {:?}", lang.code, kind);
                    assert!(
                        sel.fallback_plan.entries.iter().all(|e| !e.same_target(&sel.primary)),
                        "{} {:?}: primary {:?} in fallbacks",
                        lang.code,
                        kind,
                        sel.primary
                    );
                    let kept: Vec<&ProviderRef> =
                        fallbacks.iter().filter(|f| !f.same_target(&sel.primary)).collect();
                    assert_eq!(sel.fallback_plan.entries.iter().collect::<Vec<_>>(), kept);
                }
            }
        }
    }
}
