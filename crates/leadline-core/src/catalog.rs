//! Provider catalog: static voice, transcriber and model options per language.
//!
//! Every language carries the options offered in the agent builder (one marked recommended),
//! the fallback tables used when building an assistant, and the "free tier" providers the
//! platform bills at base price. Unknown languages resolve to the English tables.

use serde::{Deserialize, Serialize};

/// Language used when a code is missing from the catalog.
pub const DEFAULT_LANGUAGE: &str = "en";

const REC: bool = true;
const ALT: bool = false;

// ---------------------------------------------------------------------------
// Option types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceOption {
    pub provider: &'static str,
    pub voice_id: &'static str,
    pub label: &'static str,
    pub gender: Gender,
    pub description: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub recommended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriberOption {
    pub provider: &'static str,
    pub language: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'static str>,
    pub label: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub recommended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOption {
    pub provider: &'static str,
    pub model: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub recommended: bool,
}

/// Entry of a fallback table. `id` is the voice id for voices and the language for transcribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackEntry {
    pub provider: &'static str,
    pub id: &'static str,
    pub model: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeVoice {
    pub provider: &'static str,
    pub voice_id: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreeTranscriber {
    pub provider: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'static str>,
    pub language: &'static str,
    pub label: &'static str,
}

/// Everything the catalog knows about one language.
#[derive(Debug)]
pub struct LanguageCatalog {
    pub code: &'static str,
    pub voices: &'static [VoiceOption],
    pub voice_fallbacks: &'static [FallbackEntry],
    pub transcribers: &'static [TranscriberOption],
    pub transcriber_fallbacks: &'static [FallbackEntry],
    pub free_voices: &'static [FreeVoice],
    pub free_transcribers: &'static [FreeTranscriber],
}

/// Provider reference carried through selection and into the outbound payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRef {
    pub provider: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderRef {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self { provider: provider.into(), id: id.into(), model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Fallback filtering identity: provider plus id, model ignored.
    pub fn same_target(&self, other: &ProviderRef) -> bool {
        self.provider == other.provider && self.id == other.id
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Common view over catalog entries so selection logic is written once.
pub trait CatalogOption {
    fn is_recommended(&self) -> bool;
    fn to_ref(&self) -> ProviderRef;
}

impl CatalogOption for VoiceOption {
    fn is_recommended(&self) -> bool {
        self.recommended
    }

    fn to_ref(&self) -> ProviderRef {
        ProviderRef::new(self.provider, self.voice_id)
    }
}

impl CatalogOption for TranscriberOption {
    fn is_recommended(&self) -> bool {
        self.recommended
    }

    fn to_ref(&self) -> ProviderRef {
        let r = ProviderRef::new(self.provider, self.language);
        match self.model {
            Some(m) => r.with_model(m),
            None => r,
        }
    }
}

impl CatalogOption for ModelOption {
    fn is_recommended(&self) -> bool {
        self.recommended
    }

    fn to_ref(&self) -> ProviderRef {
        ProviderRef::new(self.provider, self.model)
    }
}

impl FallbackEntry {
    pub fn to_ref(&self) -> ProviderRef {
        let r = ProviderRef::new(self.provider, self.id);
        match self.model {
            Some(m) => r.with_model(m),
            None => r,
        }
    }
}

/// The entry marked recommended, else the first entry.
pub fn recommended<T: CatalogOption>(entries: &[T]) -> Option<&T> {
    entries.iter().find(|e| e.is_recommended()).or_else(|| entries.first())
}

/// Exact lookup by language code.
pub fn language(code: &str) -> Option<&'static LanguageCatalog> {
    LANGUAGES.iter().find(|l| l.code == code)
}

/// Lookup with the English fallback for unknown or empty codes.
pub fn language_or_default(code: &str) -> &'static LanguageCatalog {
    language(code).unwrap_or(&EN)
}

/// All catalogued languages in display order.
pub fn languages() -> &'static [LanguageCatalog] {
    LANGUAGES
}

/// Global language model options.
pub fn models() -> &'static [ModelOption] {
    MODELS
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

const fn voice(
    provider: &'static str,
    voice_id: &'static str,
    label: &'static str,
    gender: Gender,
    description: &'static str,
    recommended: bool,
) -> VoiceOption {
    VoiceOption { provider, voice_id, label, gender, description, recommended }
}

const fn transcriber(
    provider: &'static str,
    language: &'static str,
    model: Option<&'static str>,
    label: &'static str,
    description: &'static str,
    recommended: bool,
) -> TranscriberOption {
    TranscriberOption { provider, language, model, label, description, recommended }
}

const fn model(
    provider: &'static str,
    model: &'static str,
    label: &'static str,
    description: &'static str,
    recommended: bool,
) -> ModelOption {
    ModelOption { provider, model, label, description, recommended }
}

const fn fb(provider: &'static str, id: &'static str, model: Option<&'static str>) -> FallbackEntry {
    FallbackEntry { provider, id, model }
}

const fn free_voice(provider: &'static str, voice_id: &'static str, label: &'static str) -> FreeVoice {
    FreeVoice { provider, voice_id, label }
}

const fn free_stt(
    provider: &'static str,
    model: Option<&'static str>,
    language: &'static str,
    label: &'static str,
) -> FreeTranscriber {
    FreeTranscriber { provider, model, language, label }
}

use Gender::{Female, Male, Neutral};

static MODELS: &[ModelOption] = &[
    model("google", "gemini-2.0-flash-lite", "Gemini 2.0 Flash Lite", "Fastest • Free • Great for most agents", REC),
    model("google", "gemini-2.0-flash", "Gemini 2.0 Flash", "Balanced speed & quality", ALT),
    model("google", "gemini-1.5-flash", "Gemini 1.5 Flash", "Stable & reliable", ALT),
    model("openai", "gpt-4o-mini", "GPT-4o Mini", "OpenAI • Fast & capable", ALT),
    model("openai", "gpt-4o", "GPT-4o", "OpenAI • Best reasoning quality", ALT),
];

const EN: LanguageCatalog = LanguageCatalog {
    code: "en",
    voices: &[
        voice("openai", "echo", "Echo", Male, "Deep, confident • Business-ready", REC),
        voice("openai", "nova", "Nova", Female, "Warm, friendly • Great for support", ALT),
        voice("openai", "shimmer", "Shimmer", Female, "Clear, professional", ALT),
        voice("openai", "alloy", "Alloy", Neutral, "Balanced, natural", ALT),
        voice("openai", "fable", "Fable", Male, "Expressive, engaging", ALT),
        voice("openai", "onyx", "Onyx", Male, "Deep, authoritative", ALT),
        voice("azure", "en-US-JennyNeural", "Jenny", Female, "Natural US female (Azure)", ALT),
        voice("azure", "en-US-GuyNeural", "Guy", Male, "Natural US male (Azure)", ALT),
        voice("azure", "en-US-AriaNeural", "Aria", Female, "Conversational US female (Azure)", ALT),
        voice("azure", "en-US-DavisNeural", "Davis", Male, "Deep US male (Azure)", ALT),
    ],
    voice_fallbacks: &[fb("azure", "en-US-JennyNeural", None), fb("lmnt", "lily", None)],
    transcribers: &[
        transcriber("google", "English", Some("gemini-2.0-flash-lite"), "Gemini Flash Lite", "Fast & accurate • Free tier", REC),
        transcriber("google", "English", Some("gemini-2.0-flash"), "Gemini Flash", "Higher accuracy", ALT),
        transcriber("deepgram", "en", Some("nova-2"), "Deepgram Nova-2", "Low latency • Industry standard", ALT),
    ],
    transcriber_fallbacks: &[fb("deepgram", "en", Some("nova-2"))],
    free_voices: &[
        free_voice("openai", "nova", "OpenAI Nova"),
        free_voice("azure", "en-US-JennyNeural", "Azure Jenny"),
        free_voice("lmnt", "lily", "LMNT Lily"),
    ],
    free_transcribers: &[
        free_stt("deepgram", Some("nova-2"), "en", "Deepgram Nova-2"),
        free_stt("talkscriber", None, "en", "Talkscriber"),
    ],
};

/// Indic languages share one shape: an Azure female/male pair for voice, Azure primary and
/// Talkscriber fallback for transcription.
macro_rules! indic_language {
    ($code:literal, $locale:literal, $name:literal,
     ($female_id:literal, $female:literal), ($male_id:literal, $male:literal)) => {
        LanguageCatalog {
            code: $code,
            voices: &[
                voice("azure", $female_id, $female, Female, concat!("Natural ", $name, " female"), REC),
                voice("azure", $male_id, $male, Male, concat!("Natural ", $name, " male"), ALT),
            ],
            voice_fallbacks: &[fb("azure", $male_id, None)],
            transcribers: &[
                transcriber("azure", $locale, None, concat!("Azure ", $name), concat!("Best for ", $name), REC),
                transcriber("talkscriber", $locale, None, concat!("Talkscriber ", $name), concat!("Specialized ", $name, " ASR"), ALT),
            ],
            transcriber_fallbacks: &[fb("talkscriber", $locale, None)],
            free_voices: &[
                free_voice("azure", $female_id, concat!("Azure ", $female, " (", $code, ")")),
                free_voice("azure", $male_id, concat!("Azure ", $male, " (", $code, ")")),
            ],
            free_transcribers: &[
                free_stt("azure", None, $locale, concat!("Azure ", $locale)),
                free_stt("talkscriber", None, $locale, "Talkscriber"),
            ],
        }
    };
}

static LANGUAGES: &[LanguageCatalog] = &[
    EN,
    LanguageCatalog {
        code: "hi",
        voices: &[
            voice("azure", "hi-IN-SwaraNeural", "Swara", Female, "Natural Hindi female", REC),
            voice("azure", "hi-IN-MadhurNeural", "Madhur", Male, "Natural Hindi male", ALT),
        ],
        voice_fallbacks: &[fb("azure", "hi-IN-MadhurNeural", None)],
        transcribers: &[
            transcriber("deepgram", "hi", Some("nova-2"), "Deepgram Nova-2", "Hindi support", REC),
            transcriber("talkscriber", "hi", None, "Talkscriber Hindi", "Specialized Hindi ASR", ALT),
        ],
        transcriber_fallbacks: &[fb("talkscriber", "hi", None)],
        free_voices: &[
            free_voice("azure", "hi-IN-SwaraNeural", "Azure Swara (hi)"),
            free_voice("azure", "hi-IN-MadhurNeural", "Azure Madhur (hi)"),
        ],
        free_transcribers: &[
            free_stt("deepgram", Some("nova-2"), "hi", "Deepgram Nova-2 (hi)"),
            free_stt("talkscriber", None, "hi", "Talkscriber"),
        ],
    },
    indic_language!("ta", "ta-IN", "Tamil", ("ta-IN-PallaviNeural", "Pallavi"), ("ta-IN-ValluvarNeural", "Valluvar")),
    indic_language!("te", "te-IN", "Telugu", ("te-IN-ShrutiNeural", "Shruti"), ("te-IN-MohanNeural", "Mohan")),
    indic_language!("kn", "kn-IN", "Kannada", ("kn-IN-SapnaNeural", "Sapna"), ("kn-IN-GaganNeural", "Gagan")),
    indic_language!("ml", "ml-IN", "Malayalam", ("ml-IN-SobhanaNeural", "Sobhana"), ("ml-IN-MidhunNeural", "Midhun")),
    indic_language!("bn", "bn-IN", "Bengali", ("bn-IN-TanishaaNeural", "Tanishaa"), ("bn-IN-BashkarNeural", "Bashkar")),
    indic_language!("mr", "mr-IN", "Marathi", ("mr-IN-AarohiNeural", "Aarohi"), ("mr-IN-ManoharNeural", "Manohar")),
    indic_language!("gu", "gu-IN", "Gujarati", ("gu-IN-DhwaniNeural", "Dhwani"), ("gu-IN-NiranjanNeural", "Niranjan")),
    LanguageCatalog {
        code: "es",
        voices: &[
            voice("azure", "es-ES-ElviraNeural", "Elvira", Female, "Spain Spanish female", REC),
            voice("azure", "es-MX-DaliaNeural", "Dalia", Female, "Mexican Spanish female", ALT),
            voice("azure", "es-ES-AlvaroNeural", "Álvaro", Male, "Spain Spanish male", ALT),
            voice("openai", "nova", "Nova", Female, "OpenAI • Spanish-capable", ALT),
        ],
        voice_fallbacks: &[fb("openai", "nova", None)],
        transcribers: &[
            transcriber("deepgram", "es", Some("nova-2"), "Deepgram Nova-2", "Spanish support", REC),
            transcriber("talkscriber", "es", None, "Talkscriber ES", "Spanish ASR", ALT),
        ],
        transcriber_fallbacks: &[fb("talkscriber", "es", None)],
        free_voices: &[
            free_voice("azure", "es-ES-ElviraNeural", "Azure Elvira (es)"),
            free_voice("openai", "nova", "OpenAI Nova"),
        ],
        free_transcribers: &[
            free_stt("deepgram", Some("nova-2"), "es", "Deepgram Nova-2 (es)"),
            free_stt("talkscriber", None, "es", "Talkscriber"),
        ],
    },
    LanguageCatalog {
        code: "fr",
        voices: &[
            voice("azure", "fr-FR-DeniseNeural", "Denise", Female, "Natural French female", REC),
            voice("azure", "fr-FR-HenriNeural", "Henri", Male, "Natural French male", ALT),
            voice("openai", "nova", "Nova", Female, "OpenAI • French-capable", ALT),
        ],
        voice_fallbacks: &[fb("openai", "nova", None)],
        transcribers: &[
            transcriber("deepgram", "fr", Some("nova-2"), "Deepgram Nova-2", "French support", REC),
            transcriber("talkscriber", "fr", None, "Talkscriber FR", "French ASR", ALT),
        ],
        transcriber_fallbacks: &[fb("talkscriber", "fr", None)],
        free_voices: &[
            free_voice("azure", "fr-FR-DeniseNeural", "Azure Denise (fr)"),
            free_voice("openai", "nova", "OpenAI Nova"),
        ],
        free_transcribers: &[
            free_stt("deepgram", Some("nova-2"), "fr", "Deepgram Nova-2 (fr)"),
            free_stt("talkscriber", None, "fr", "Talkscriber"),
        ],
    },
    LanguageCatalog {
        code: "ar",
        voices: &[
            voice("azure", "ar-SA-ZariyahNeural", "Zariyah", Female, "Saudi Arabic female", REC),
            voice("azure", "ar-SA-HamedNeural", "Hamed", Male, "Saudi Arabic male", ALT),
            voice("azure", "ar-EG-SalmaNeural", "Salma", Female, "Egyptian Arabic female", ALT),
        ],
        voice_fallbacks: &[fb("azure", "ar-SA-HamedNeural", None)],
        transcribers: &[
            transcriber("azure", "ar-SA", None, "Azure Arabic", "Best for Arabic", REC),
            transcriber("talkscriber", "ar", None, "Talkscriber Arabic", "Arabic ASR", ALT),
        ],
        transcriber_fallbacks: &[fb("talkscriber", "ar", None)],
        free_voices: &[
            free_voice("azure", "ar-SA-ZariyahNeural", "Azure Zariyah (ar)"),
            free_voice("azure", "ar-SA-HamedNeural", "Azure Hamed (ar)"),
        ],
        free_transcribers: &[
            free_stt("azure", None, "ar-SA", "Azure ar-SA"),
            free_stt("talkscriber", None, "ar", "Talkscriber"),
        ],
    },
];

/// Free-tier providers grouped as `{ voice: { lang: [...] }, transcriber: { lang: [...] } }`.
pub fn free_providers() -> serde_json::Value {
    let mut voice = serde_json::Map::new();
    let mut transcriber = serde_json::Map::new();
    for lang in LANGUAGES {
        voice.insert(lang.code.to_string(), serde_json::json!(lang.free_voices));
        transcriber.insert(lang.code.to_string(), serde_json::json!(lang.free_transcribers));
    }
    serde_json::json!({ "voice": voice, "transcriber": transcriber })
}
