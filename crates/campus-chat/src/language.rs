//! Language detection.
//!
//! A [`LanguageClassifier`] guesses a raw language code; the
//! [`LanguageDetector`] wraps it with the supported-set policy: explicit
//! hints win, short input defaults, unsupported classifier codes are
//! remapped or defaulted, and classifier failures degrade to a
//! low-confidence default.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use campus_core::config::LanguageConfig;
use campus_core::error::CampusError;

use crate::types::{LanguageDetection, AUTO_LANGUAGE};

/// Confidence for a caller-supplied language.
pub const EXPLICIT_CONFIDENCE: f64 = 1.0;
/// Confidence when the classifier returned a supported language.
pub const SUPPORTED_CONFIDENCE: f64 = 0.9;
/// Confidence for a remapped or defaulted unsupported detection.
pub const REMAPPED_CONFIDENCE: f64 = 0.7;
/// Confidence when there was too little signal or the classifier failed.
pub const UNCERTAIN_CONFIDENCE: f64 = 0.5;

/// Cleaned input shorter than this many characters is not classified.
const MIN_DETECTABLE_CHARS: usize = 3;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

static NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\w\s?!.,\-'"]"#).expect("Invalid noise regex"));

/// Collapse whitespace runs and strip symbols, keeping letters, digits,
/// combining marks, and basic sentence punctuation.
pub fn clean_text(text: &str) -> String {
    let stripped = NOISE.replace_all(text, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Guesses the language of a piece of text.
pub trait LanguageClassifier: Send + Sync {
    /// Return a language code for `text`, or an error when the text carries
    /// no usable signal.
    fn classify(&self, text: &str) -> Result<String, CampusError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Devanagari,
    Bengali,
    Gurmukhi,
    Gujarati,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Arabic,
    Cyrillic,
    Greek,
    Thai,
    Hangul,
    Kana,
    Han,
}

impl Script {
    /// Declaration order doubles as the tie-break order.
    const ALL: [Script; 16] = [
        Script::Latin,
        Script::Devanagari,
        Script::Bengali,
        Script::Gurmukhi,
        Script::Gujarati,
        Script::Tamil,
        Script::Telugu,
        Script::Kannada,
        Script::Malayalam,
        Script::Arabic,
        Script::Cyrillic,
        Script::Greek,
        Script::Thai,
        Script::Hangul,
        Script::Kana,
        Script::Han,
    ];

    fn of(c: char) -> Option<Script> {
        let script = match c as u32 {
            0x0041..=0x005A | 0x0061..=0x007A | 0x00C0..=0x024F => Script::Latin,
            0x0370..=0x03FF => Script::Greek,
            0x0400..=0x04FF => Script::Cyrillic,
            0x0600..=0x06FF | 0x0750..=0x077F => Script::Arabic,
            0x0900..=0x097F => Script::Devanagari,
            0x0980..=0x09FF => Script::Bengali,
            0x0A00..=0x0A7F => Script::Gurmukhi,
            0x0A80..=0x0AFF => Script::Gujarati,
            0x0B80..=0x0BFF => Script::Tamil,
            0x0C00..=0x0C7F => Script::Telugu,
            0x0C80..=0x0CFF => Script::Kannada,
            0x0D00..=0x0D7F => Script::Malayalam,
            0x0E00..=0x0E7F => Script::Thai,
            0x1100..=0x11FF | 0xAC00..=0xD7AF => Script::Hangul,
            0x3040..=0x30FF => Script::Kana,
            0x4E00..=0x9FFF => Script::Han,
            _ => return None,
        };
        Some(script)
    }

    fn index(self) -> usize {
        Script::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }
}

/// Words that occur in Marathi but not in Hindi running text.
const MARATHI_MARKERS: [&str; 7] = ["आहे", "आहेत", "नाही", "काय", "कसे", "मला", "आणि"];

/// Classifies text by its dominant Unicode script.
///
/// Latin text is reported as English. Devanagari is Hindi unless Marathi
/// marker words appear. Text without any letters of a known script is a
/// classification failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptClassifier;

impl ScriptClassifier {
    pub fn new() -> Self {
        Self
    }

    fn devanagari_language(text: &str) -> &'static str {
        let is_marathi = text
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || c == '।')
            .any(|word| MARATHI_MARKERS.contains(&word) || word.ends_with("च्या"));
        if is_marathi {
            "mr"
        } else {
            "hi"
        }
    }
}

impl LanguageClassifier for ScriptClassifier {
    fn classify(&self, text: &str) -> Result<String, CampusError> {
        let mut counts = [0usize; Script::ALL.len()];
        for script in text.chars().filter_map(Script::of) {
            counts[script.index()] += 1;
        }

        let mut best: Option<(Script, usize)> = None;
        for (script, count) in Script::ALL.iter().zip(counts) {
            if count > best.map(|(_, c)| c).unwrap_or(0) {
                best = Some((*script, count));
            }
        }

        let (script, _) = best.ok_or_else(|| {
            CampusError::LanguageDetection("no letters of a known script".to_string())
        })?;

        let code = match script {
            Script::Latin => "en",
            Script::Devanagari => Self::devanagari_language(text),
            Script::Bengali => "bn",
            Script::Gurmukhi => "pa",
            Script::Gujarati => "gu",
            Script::Tamil => "ta",
            Script::Telugu => "te",
            Script::Kannada => "kn",
            Script::Malayalam => "ml",
            Script::Arabic => "ur",
            Script::Cyrillic => "ru",
            Script::Greek => "el",
            Script::Thai => "th",
            Script::Hangul => "ko",
            Script::Kana => "ja",
            Script::Han => "zh",
        };
        Ok(code.to_string())
    }
}

/// Maps raw text to a supported language code with a confidence.
pub struct LanguageDetector {
    classifier: Arc<dyn LanguageClassifier>,
    supported: Vec<String>,
    default_language: String,
    remap: BTreeMap<String, String>,
}

impl LanguageDetector {
    pub fn new(classifier: Arc<dyn LanguageClassifier>, config: &LanguageConfig) -> Self {
        Self {
            classifier,
            supported: config.supported.clone(),
            default_language: config.default.clone(),
            remap: config.remap.clone(),
        }
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.supported.iter().any(|s| s == code)
    }

    /// Supported target of a remap entry for `code`, if any.
    fn remapped(&self, code: &str) -> Option<&str> {
        self.remap
            .get(code)
            .map(String::as_str)
            .filter(|target| self.is_supported(target))
    }

    fn detection(&self, language: &str, confidence: f64) -> LanguageDetection {
        LanguageDetection {
            language: language.to_string(),
            confidence,
            supported: self.is_supported(language),
        }
    }

    /// Detect the language of `text`, honouring an explicit `hint`.
    ///
    /// A hint other than `"auto"` always wins. It is normalised and, when
    /// the remap table sends it to a supported language, remapped; any other
    /// hint is passed through as given. Only classifier output is folded into
    /// the supported set. Never fails.
    pub fn detect(&self, text: &str, hint: &str) -> LanguageDetection {
        let hint = hint.trim().to_lowercase();
        if !hint.is_empty() && hint != AUTO_LANGUAGE {
            if self.is_supported(&hint) {
                return self.detection(&hint, EXPLICIT_CONFIDENCE);
            }
            if let Some(target) = self.remapped(&hint) {
                return self.detection(target, EXPLICIT_CONFIDENCE);
            }
            debug!(hint = %hint, "Using unsupported language hint as given");
            return self.detection(&hint, EXPLICIT_CONFIDENCE);
        }

        let cleaned = clean_text(text);
        if cleaned.trim().chars().count() < MIN_DETECTABLE_CHARS {
            return self.detection(&self.default_language, UNCERTAIN_CONFIDENCE);
        }

        match self.classifier.classify(&cleaned) {
            Ok(code) if self.is_supported(&code) => self.detection(&code, SUPPORTED_CONFIDENCE),
            Ok(code) => {
                let language = self
                    .remapped(&code)
                    .unwrap_or(self.default_language.as_str())
                    .to_string();
                debug!(raw = %code, language = %language, "Folded unsupported detection");
                self.detection(&language, REMAPPED_CONFIDENCE)
            }
            Err(e) => {
                warn!("Language detection failed: {}", e);
                self.detection(&self.default_language, UNCERTAIN_CONFIDENCE)
            }
        }
    }
}
