//! Conversation-turn engine for the campus assistant.
//!
//! Detects the user's language, short-circuits greetings and farewells,
//! matches the question against the FAQ index, and composes a localized
//! answer or a fallback-to-human reply with suggested questions.

pub mod categorize;
pub mod context;
pub mod error;
pub mod intent;
pub mod language;
pub mod orchestrator;
pub mod recorder;
pub mod response;
pub mod translate;
pub mod types;

pub use categorize::QueryCategorizer;
pub use context::{SessionContext, SessionStore, SessionTurn};
pub use error::ChatError;
pub use intent::{Intent, IntentShortCircuit};
pub use language::{clean_text, LanguageClassifier, LanguageDetector, ScriptClassifier};
pub use orchestrator::{EngineServices, TurnEngine};
pub use recorder::ConversationRecorder;
pub use response::{ResponseComposer, SuggestionGenerator};
pub use translate::{HttpTranslator, NullTranslator, TranslationGate, TranslationOutcome, Translator};
pub use types::{
    HistoryEntry, LanguageDetection, LanguageInfo, TurnRequest, TurnResult, AUTO_LANGUAGE,
};
