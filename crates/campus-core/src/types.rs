use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// FAQ entries
// =============================================================================

/// Question and/or answer text for one language.
///
/// Overrides are sparse: a language may carry a localized question without an
/// answer or the reverse.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl LocalizedContent {
    pub fn new(question: &str, answer: &str) -> Self {
        Self {
            question: Some(question.to_string()),
            answer: Some(answer.to_string()),
        }
    }
}

/// A curated question/answer pair.
///
/// The canonical `question` and `answer` are in the default language and are
/// always present; `languages` holds optional per-language overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub languages: BTreeMap<String, LocalizedContent>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Tie-break weight. Advisory only; matching does not read it.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    1
}

impl FaqEntry {
    /// Create an active entry with no overrides.
    pub fn new(question: &str, answer: &str, category: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            question: question.to_string(),
            answer: answer.to_string(),
            keywords: Vec::new(),
            category: category.to_string(),
            languages: BTreeMap::new(),
            is_active: true,
            priority: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style helper to attach a language override.
    pub fn with_language(mut self, language: &str, question: &str, answer: &str) -> Self {
        self.languages
            .insert(language.to_string(), LocalizedContent::new(question, answer));
        self
    }

    /// Builder-style helper to set keywords.
    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Localized question override for `language`, if one exists and is non-empty.
    pub fn localized_question(&self, language: &str) -> Option<&str> {
        self.languages
            .get(language)
            .and_then(|c| c.question.as_deref())
            .filter(|q| !q.trim().is_empty())
    }

    /// Localized answer override for `language`, if one exists and is non-empty.
    pub fn localized_answer(&self, language: &str) -> Option<&str> {
        self.languages
            .get(language)
            .and_then(|c| c.answer.as_deref())
            .filter(|a| !a.trim().is_empty())
    }
}

// =============================================================================
// Conversation records
// =============================================================================

/// One persisted question/response exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    pub session_id: String,
    pub message_id: String,
    pub user_id: Option<String>,
    pub user_message: String,
    pub bot_response: String,
    pub detected_language: String,
    pub confidence: f64,
    pub category: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub fallback_triggered: bool,
    pub response_time_ms: u64,
}

/// A known end user and their language preference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub preferred_language: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub total_conversations: u64,
}

/// A 1-5 rating left for a specific response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub session_id: String,
    pub message_id: String,
    pub user_id: Option<String>,
    pub rating: u8,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate view over all feedback.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub average_rating: f64,
    pub total_feedback: u64,
    /// Count per rating value 1..=5.
    pub rating_distribution: BTreeMap<u8, u64>,
}

/// Aggregate view over recent conversations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_conversations: u64,
    pub unique_sessions: u64,
    pub languages_used: HashMap<String, u64>,
    pub categories_queried: HashMap<String, u64>,
    pub average_confidence: f64,
    /// Percentage of conversations that fell back to a human, 0-100.
    pub fallback_rate: f64,
    pub average_response_time_ms: f64,
}
