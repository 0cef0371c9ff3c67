//! Request and result types exchanged with the turn engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campus_core::types::ConversationLog;

/// Language hint meaning "detect it for me".
pub const AUTO_LANGUAGE: &str = "auto";

/// One inbound user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    /// Explicit language code, or `"auto"` to detect.
    #[serde(default = "default_language_hint")]
    pub language: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_language_hint() -> String {
    AUTO_LANGUAGE.to_string()
}

impl TurnRequest {
    /// A request with language detection and no session or user.
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            language: default_language_hint(),
            session_id: None,
            user_id: None,
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }
}

/// The answer to one turn. Always well-formed, even when the turn failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub response: String,
    pub confidence: f64,
    pub detected_language: String,
    pub session_id: String,
    pub message_id: String,
    pub category: Option<String>,
    pub fallback_to_human: bool,
    pub suggested_questions: Vec<String>,
}

/// Outcome of language detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetection {
    pub language: String,
    pub confidence: f64,
    pub supported: bool,
}

/// A supported language with its native display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub code: String,
    pub name: String,
}

/// One persisted exchange as shown in a session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub message_id: String,
    pub user_message: String,
    pub bot_response: String,
    pub detected_language: String,
    pub confidence: f64,
    pub category: Option<String>,
    pub fallback_to_human: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<ConversationLog> for HistoryEntry {
    fn from(log: ConversationLog) -> Self {
        Self {
            message_id: log.message_id,
            user_message: log.user_message,
            bot_response: log.bot_response,
            detected_language: log.detected_language,
            confidence: log.confidence,
            category: log.category,
            fallback_to_human: log.fallback_triggered,
            timestamp: log.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_request_builders() {
        let req = TurnRequest::new("Where is the library?")
            .with_language("ta")
            .with_session("s-1")
            .with_user("u-1");
        assert_eq!(req.language, "ta");
        assert_eq!(req.session_id.as_deref(), Some("s-1"));
        assert_eq!(req.user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_turn_request_deserialize_defaults_to_auto() {
        let req: TurnRequest = serde_json::from_str(r#"{"message": "Hello"}"#).unwrap();
        assert_eq!(req.language, AUTO_LANGUAGE);
        assert!(req.session_id.is_none());
    }

    #[test]
    fn test_turn_result_serializes_all_fields() {
        let result = TurnResult {
            response: "Block C.".to_string(),
            confidence: 0.93,
            detected_language: "en".to_string(),
            session_id: "s-1".to_string(),
            message_id: "m-1".to_string(),
            category: Some("facilities".to_string()),
            fallback_to_human: false,
            suggested_questions: vec!["Q?".to_string()],
        };
        let json: serde_json::Value = serde_json::to_value(&result).unwrap();
        assert_eq!(json["category"], "facilities");
        assert_eq!(json["fallback_to_human"], false);
        assert_eq!(json["suggested_questions"][0], "Q?");
    }

    #[test]
    fn test_history_entry_from_log() {
        let log = ConversationLog {
            session_id: "s".to_string(),
            message_id: "m".to_string(),
            user_id: None,
            user_message: "hi".to_string(),
            bot_response: "Hello!".to_string(),
            detected_language: "en".to_string(),
            confidence: 1.0,
            category: None,
            timestamp: Utc::now(),
            fallback_triggered: true,
            response_time_ms: 3,
        };
        let entry = HistoryEntry::from(log);
        assert_eq!(entry.bot_response, "Hello!");
        assert!(entry.fallback_to_human);
    }
}
