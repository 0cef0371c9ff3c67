use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CampusError, Result};

/// Sentence used when neither the requested language nor English has a
/// canned response for a given kind.
const GENERIC_APOLOGY: &str = "I'm sorry, I couldn't process your request.";

/// Top-level configuration for the campus assistant.
///
/// Loaded from `~/.campus-assist/config.toml` by default. Every section has
/// defaults, so a partial file (or no file at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampusConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub nlp: NlpConfig,
    #[serde(default)]
    pub languages: LanguageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub support: SupportConfig,
    #[serde(default)]
    pub suggestions: SuggestionConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default = "default_responses")]
    pub responses: BTreeMap<String, CannedResponses>,
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,
}

impl Default for CampusConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            nlp: NlpConfig::default(),
            languages: LanguageConfig::default(),
            session: SessionConfig::default(),
            support: SupportConfig::default(),
            suggestions: SuggestionConfig::default(),
            translation: TranslationConfig::default(),
            responses: default_responses(),
            categories: default_categories(),
        }
    }
}

impl CampusConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CampusConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or is invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.nlp.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CampusError::Config(format!(
                "nlp.confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.languages.supported.is_empty() {
            return Err(CampusError::Config(
                "languages.supported must not be empty".to_string(),
            ));
        }
        if !self.languages.is_supported(&self.languages.default) {
            return Err(CampusError::Config(format!(
                "default language '{}' is not in languages.supported",
                self.languages.default
            )));
        }
        if self.session.window_size == 0 {
            return Err(CampusError::Config(
                "session.window_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up a canned response in `language`, falling back to English and
    /// then to a generic apology.
    pub fn canned(&self, kind: ResponseKind, language: &str) -> String {
        self.responses
            .get(language)
            .and_then(|r| r.get(kind))
            .or_else(|| self.responses.get("en").and_then(|r| r.get(kind)))
            .map(str::to_string)
            .unwrap_or_else(|| GENERIC_APOLOGY.to_string())
    }

    /// The localized no-match message with the support contact filled in.
    pub fn no_match_message(&self, language: &str) -> String {
        self.canned(ResponseKind::NoMatch, language)
            .replace("{contact}", &self.support.contact)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.campus-assist/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Matching and capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NlpConfig {
    /// Sentence-transformer model identifier (informational).
    pub model_name: String,
    /// Directory holding `model.onnx` and `tokenizer.json`. When unset the
    /// offline token-hash embedder is used.
    pub model_dir: Option<String>,
    /// Minimum top-1 similarity needed to answer instead of escalating.
    pub confidence_threshold: f64,
    /// Number of candidates the matcher returns per turn.
    pub top_k: usize,
    /// Deadline for a single embedding call.
    pub embed_timeout_ms: u64,
    /// Deadline for a single translation call.
    pub translate_timeout_ms: u64,
    /// Periodic index refresh interval. Zero disables the refresh task.
    pub refresh_interval_secs: u64,
}

impl Default for NlpConfig {
    fn default() -> Self {
        Self {
            model_name: "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            model_dir: None,
            confidence_threshold: 0.7,
            top_k: 3,
            embed_timeout_ms: 10_000,
            translate_timeout_ms: 5_000,
            refresh_interval_secs: 600,
        }
    }
}

/// Supported languages and detection remapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// Supported language codes, in index-enumeration order.
    pub supported: Vec<String>,
    /// Default (canonical) language of FAQ questions and answers.
    pub default: String,
    /// Native display names by language code.
    pub names: BTreeMap<String, String>,
    /// Unsupported detections folded into a supported language.
    pub remap: BTreeMap<String, String>,
}

impl LanguageConfig {
    pub fn is_supported(&self, code: &str) -> bool {
        self.supported.iter().any(|s| s == code)
    }

    /// Display name for a language code, or the code itself.
    pub fn display_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        let supported = ["en", "hi", "ta", "te", "kn", "mr", "gu", "bn"];
        let names = [
            ("en", "English"),
            ("hi", "हिन्दी"),
            ("ta", "தமிழ்"),
            ("te", "తెలుగు"),
            ("kn", "ಕನ್ನಡ"),
            ("mr", "मराठी"),
            ("gu", "ગુજરાતી"),
            ("bn", "বাংলা"),
        ];
        let remap = [("ur", "hi"), ("ne", "hi"), ("sa", "hi")];
        Self {
            supported: supported.iter().map(|s| s.to_string()).collect(),
            default: "en".to_string(),
            names: names
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            remap: remap
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// In-memory session window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of turns kept per session.
    pub window_size: usize,
    /// Idle time after which `evict_idle` drops a session.
    pub idle_timeout_minutes: u32,
    /// Reuse the session's last language when detection is uncertain.
    pub sticky_language: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            idle_timeout_minutes: 30,
            sticky_language: true,
        }
    }
}

/// Human support details substituted into fallback messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    pub contact: String,
    pub college_name: String,
    pub admin_email: String,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            contact: "+91-XXXXXXXXXX".to_string(),
            college_name: "Campus University".to_string(),
            admin_email: "admin@campus.edu".to_string(),
        }
    }
}

/// Suggested-question limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    /// FAQ entries considered per suggestion request.
    pub candidate_limit: usize,
    /// Suggestions returned after truncation.
    pub max_suggestions: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 5,
            max_suggestions: 3,
        }
    }
}

/// Remote translation backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Base URL of a LibreTranslate-compatible service. Unset disables translation.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

/// The kinds of canned response the assistant can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Greeting,
    Farewell,
    NoMatch,
    Error,
}

/// Canned responses for one language. Missing keys fall back to English.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CannedResponses {
    pub greeting: Option<String>,
    pub farewell: Option<String>,
    /// May contain a `{contact}` placeholder.
    pub no_match: Option<String>,
    pub error: Option<String>,
}

impl CannedResponses {
    pub fn get(&self, kind: ResponseKind) -> Option<&str> {
        match kind {
            ResponseKind::Greeting => self.greeting.as_deref(),
            ResponseKind::Farewell => self.farewell.as_deref(),
            ResponseKind::NoMatch => self.no_match.as_deref(),
            ResponseKind::Error => self.error.as_deref(),
        }
    }
}

fn default_responses() -> BTreeMap<String, CannedResponses> {
    let mut table = BTreeMap::new();
    table.insert(
        "en".to_string(),
        CannedResponses {
            greeting: Some(
                "Hello! I'm your campus assistant. How can I help you today?".to_string(),
            ),
            farewell: Some("Thank you for using our service! Have a great day!".to_string()),
            no_match: Some(
                "I'm sorry, I couldn't find a specific answer to your question. Let me connect you with a human assistant. You can contact our support at {contact}."
                    .to_string(),
            ),
            error: Some(
                "I encountered an error while processing your request. Please try again or contact support."
                    .to_string(),
            ),
        },
    );
    table.insert(
        "hi".to_string(),
        CannedResponses {
            greeting: Some(
                "नमस्ते! मैं आपका कैंपस सहायक हूँ। आज मैं आपकी कैसे मदद कर सकता हूँ?".to_string(),
            ),
            farewell: Some("हमारी सेवा का उपयोग करने के लिए धन्यवाद! आपका दिन शुभ हो!".to_string()),
            no_match: Some(
                "क्षमा करें, मुझे आपके प्रश्न का विशिष्ट उत्तर नहीं मिला। मैं आपको एक मानव सहायक से जोड़ता हूँ। आप हमारे सपोर्ट से {contact} पर संपर्क कर सकते हैं।"
                    .to_string(),
            ),
            error: Some(
                "आपके अनुरोध को संसाधित करते समय मुझे एक त्रुटि का सामना करना पड़ा। कृपया पुनः प्रयास करें या सपोर्ट से संपर्क करें।"
                    .to_string(),
            ),
        },
    );
    table
}

/// A category and the keyword substrings that vote for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "admissions",
            &[
                "admission",
                "apply",
                "application",
                "eligibility",
                "entrance",
                "course",
                "program",
                "degree",
            ],
        ),
        CategoryRule::new(
            "fees",
            &[
                "fee",
                "fees",
                "payment",
                "cost",
                "tuition",
                "scholarship",
                "financial",
            ],
        ),
        CategoryRule::new(
            "academics",
            &[
                "exam",
                "result",
                "grade",
                "syllabus",
                "curriculum",
                "subject",
                "marks",
                "semester",
            ],
        ),
        CategoryRule::new(
            "schedule",
            &[
                "schedule",
                "timetable",
                "class",
                "timing",
                "calendar",
                "holiday",
                "break",
            ],
        ),
        CategoryRule::new(
            "facilities",
            &[
                "library",
                "hostel",
                "canteen",
                "laboratory",
                "sports",
                "facility",
                "transport",
            ],
        ),
        CategoryRule::new(
            "placement",
            &[
                "placement",
                "job",
                "career",
                "internship",
                "company",
                "recruitment",
            ],
        ),
        CategoryRule::new(
            "contact",
            &[
                "contact", "phone", "email", "address", "office", "hours", "location",
            ],
        ),
    ]
}
