//! Repository implementations for SQLite-backed persistence.
//!
//! Provides FaqRepository, ConversationRepository, UserRepository, and
//! FeedbackRepository that operate on the Database struct using raw SQL.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use campus_core::error::CampusError;
use campus_core::types::{
    ConversationLog, ConversationStats, FaqEntry, Feedback, FeedbackStats, UserProfile,
};

use crate::db::Database;
use crate::stats;

const FAQ_COLUMNS: &str =
    "id, question, answer, keywords, category, languages, is_active, priority, created_at, updated_at";

const CONVERSATION_COLUMNS: &str = "session_id, message_id, user_id, user_message, bot_response, \
     detected_language, confidence, category, timestamp, fallback_triggered, response_time_ms";

/// Repository for curated FAQ entries.
pub struct FaqRepository {
    db: Arc<Database>,
}

impl FaqRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert an entry, replacing any existing entry with the same id.
    pub fn save(&self, faq: &FaqEntry) -> Result<(), CampusError> {
        let keywords = serde_json::to_string(&faq.keywords)?;
        let languages = serde_json::to_string(&faq.languages)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO faqs (id, question, answer, keywords, category, languages, is_active, priority, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    question = excluded.question,
                    answer = excluded.answer,
                    keywords = excluded.keywords,
                    category = excluded.category,
                    languages = excluded.languages,
                    is_active = excluded.is_active,
                    priority = excluded.priority,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    faq.id.to_string(),
                    faq.question,
                    faq.answer,
                    keywords,
                    faq.category,
                    languages,
                    faq.is_active as i32,
                    faq.priority,
                    faq.created_at.timestamp_millis(),
                    faq.updated_at.timestamp_millis(),
                ],
            )
            .map_err(|e| CampusError::Storage(format!("Failed to save FAQ: {}", e)))?;
            Ok(())
        })
    }

    /// Find an entry by ID, active or not.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<FaqEntry>, CampusError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM faqs WHERE id = ?1", FAQ_COLUMNS))
                .map_err(|e| CampusError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id.to_string()], |row| Ok(row_to_faq(row)))
                .optional()
                .map_err(|e| CampusError::Storage(e.to_string()))?;

            result.transpose()
        })
    }

    /// All entries in insertion order, optionally only the active ones.
    pub fn list(&self, active_only: bool) -> Result<Vec<FaqEntry>, CampusError> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM faqs WHERE is_active = 1 ORDER BY created_at ASC, rowid ASC",
                FAQ_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM faqs ORDER BY created_at ASC, rowid ASC",
                FAQ_COLUMNS
            )
        };
        self.query_faqs(&sql, rusqlite::params![])
    }

    /// Active entries in a category, in insertion order.
    pub fn find_by_category(&self, category: &str, limit: u64) -> Result<Vec<FaqEntry>, CampusError> {
        let sql = format!(
            "SELECT {} FROM faqs
             WHERE is_active = 1 AND category = ?1
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?2",
            FAQ_COLUMNS
        );
        self.query_faqs(&sql, rusqlite::params![category, limit])
    }

    fn query_faqs(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<FaqEntry>, CampusError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| CampusError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(params, |row| Ok(row_to_faq(row)))
                .map_err(|e| CampusError::Storage(e.to_string()))?;

            let mut faqs = Vec::new();
            for row in rows {
                faqs.push(row.map_err(|e| CampusError::Storage(e.to_string()))??);
            }
            Ok(faqs)
        })
    }

    /// Overwrite an existing entry and bump `updated_at`.
    ///
    /// Returns false when no entry has that id.
    pub fn update(&self, faq: &FaqEntry) -> Result<bool, CampusError> {
        let keywords = serde_json::to_string(&faq.keywords)?;
        let languages = serde_json::to_string(&faq.languages)?;
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE faqs SET question = ?2, answer = ?3, keywords = ?4, category = ?5,
                        languages = ?6, is_active = ?7, priority = ?8, updated_at = ?9
                     WHERE id = ?1",
                    rusqlite::params![
                        faq.id.to_string(),
                        faq.question,
                        faq.answer,
                        keywords,
                        faq.category,
                        languages,
                        faq.is_active as i32,
                        faq.priority,
                        Utc::now().timestamp_millis(),
                    ],
                )
                .map_err(|e| CampusError::Storage(format!("Failed to update FAQ: {}", e)))?;
            Ok(changed > 0)
        })
    }

    /// Soft delete: mark the entry inactive so rebuilds skip it.
    pub fn deactivate(&self, id: Uuid) -> Result<bool, CampusError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE faqs SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
                    rusqlite::params![id.to_string(), Utc::now().timestamp_millis()],
                )
                .map_err(|e| CampusError::Storage(format!("Failed to deactivate FAQ: {}", e)))?;
            Ok(changed > 0)
        })
    }

    pub fn count(&self, active_only: bool) -> Result<u64, CampusError> {
        let sql = if active_only {
            "SELECT COUNT(*) FROM faqs WHERE is_active = 1"
        } else {
            "SELECT COUNT(*) FROM faqs"
        };
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(|e| CampusError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

/// Repository for the append-only conversation log.
pub struct ConversationRepository {
    db: Arc<Database>,
}

impl ConversationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn save(&self, log: &ConversationLog) -> Result<(), CampusError> {
        self.db.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO conversations ({})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    CONVERSATION_COLUMNS
                ),
                rusqlite::params![
                    log.session_id,
                    log.message_id,
                    log.user_id,
                    log.user_message,
                    log.bot_response,
                    log.detected_language,
                    log.confidence,
                    log.category,
                    log.timestamp.timestamp_millis(),
                    log.fallback_triggered as i32,
                    log.response_time_ms as i64,
                ],
            )
            .map_err(|e| CampusError::Storage(format!("Failed to save conversation: {}", e)))?;
            Ok(())
        })
    }

    /// Most recent exchanges for a session, newest first.
    pub fn history(&self, session_id: &str, limit: u64) -> Result<Vec<ConversationLog>, CampusError> {
        let sql = format!(
            "SELECT {} FROM conversations
             WHERE session_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
            CONVERSATION_COLUMNS
        );
        self.query_logs(&sql, rusqlite::params![session_id, limit])
    }

    /// Every exchange at or after `since`, newest first.
    pub fn since(&self, since: DateTime<Utc>) -> Result<Vec<ConversationLog>, CampusError> {
        let sql = format!(
            "SELECT {} FROM conversations
             WHERE timestamp >= ?1
             ORDER BY timestamp DESC, id DESC",
            CONVERSATION_COLUMNS
        );
        self.query_logs(&sql, rusqlite::params![since.timestamp_millis()])
    }

    /// Exchanges from the last `hours` hours, newest first.
    pub fn recent(&self, hours: i64) -> Result<Vec<ConversationLog>, CampusError> {
        self.since(Utc::now() - Duration::hours(hours))
    }

    /// Aggregate statistics over the last `days` days.
    pub fn stats(&self, days: i64) -> Result<ConversationStats, CampusError> {
        let logs = self.since(Utc::now() - Duration::days(days))?;
        Ok(stats::conversation_stats(&logs))
    }

    fn query_logs(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ConversationLog>, CampusError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| CampusError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(params, |row| {
                    Ok(ConversationLog {
                        session_id: row.get(0)?,
                        message_id: row.get(1)?,
                        user_id: row.get(2)?,
                        user_message: row.get(3)?,
                        bot_response: row.get(4)?,
                        detected_language: row.get(5)?,
                        confidence: row.get(6)?,
                        category: row.get(7)?,
                        timestamp: from_millis(row.get(8)?),
                        fallback_triggered: row.get::<_, i32>(9)? != 0,
                        response_time_ms: row.get::<_, i64>(10)?.max(0) as u64,
                    })
                })
                .map_err(|e| CampusError::Storage(e.to_string()))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| CampusError::Storage(e.to_string()))
        })
    }
}

/// Repository for end-user profiles.
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create the user with `preferred_language`, or bump `last_active` and
    /// `total_conversations` if they already exist.
    ///
    /// An existing user's preferred language is left unchanged.
    pub fn upsert(&self, user_id: &str, preferred_language: &str) -> Result<(), CampusError> {
        let now = Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (user_id, preferred_language, created_at, last_active, total_conversations)
                 VALUES (?1, ?2, ?3, ?3, 1)
                 ON CONFLICT(user_id) DO UPDATE SET
                    last_active = excluded.last_active,
                    total_conversations = users.total_conversations + 1",
                rusqlite::params![user_id, preferred_language, now],
            )
            .map_err(|e| CampusError::Storage(format!("Failed to upsert user: {}", e)))?;
            Ok(())
        })
    }

    pub fn find(&self, user_id: &str) -> Result<Option<UserProfile>, CampusError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, name, email, preferred_language, created_at, last_active, total_conversations
                 FROM users WHERE user_id = ?1",
                rusqlite::params![user_id],
                |row| {
                    Ok(UserProfile {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        preferred_language: row.get(3)?,
                        created_at: from_millis(row.get(4)?),
                        last_active: from_millis(row.get(5)?),
                        total_conversations: row.get::<_, i64>(6)?.max(0) as u64,
                    })
                },
            )
            .optional()
            .map_err(|e| CampusError::Storage(e.to_string()))
        })
    }
}

/// Repository for response ratings.
pub struct FeedbackRepository {
    db: Arc<Database>,
}

impl FeedbackRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a rating. Ratings outside 1..=5 are rejected.
    pub fn save(&self, feedback: &Feedback) -> Result<(), CampusError> {
        validate_rating(feedback.rating)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO feedback (session_id, message_id, user_id, rating, comment, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    feedback.session_id,
                    feedback.message_id,
                    feedback.user_id,
                    feedback.rating as i64,
                    feedback.comment,
                    feedback.timestamp.timestamp_millis(),
                ],
            )
            .map_err(|e| CampusError::Storage(format!("Failed to save feedback: {}", e)))?;
            Ok(())
        })
    }

    pub fn stats(&self) -> Result<FeedbackStats, CampusError> {
        let ratings = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT rating FROM feedback")
                .map_err(|e| CampusError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, i64>(0))
                .map_err(|e| CampusError::Storage(e.to_string()))?;
            rows.map(|r| r.map(|v| v.clamp(1, 5) as u8))
                .collect::<Result<Vec<u8>, _>>()
                .map_err(|e| CampusError::Storage(e.to_string()))
        })?;
        Ok(stats::feedback_stats(&ratings))
    }
}

/// Reject ratings outside the 1-5 scale.
pub fn validate_rating(rating: u8) -> Result<(), CampusError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(CampusError::Storage(format!(
            "rating must be between 1 and 5, got {}",
            rating
        )))
    }
}

// ============================================================================
// Helper functions for row-to-entity conversion.
// ============================================================================

fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

fn row_to_faq(row: &rusqlite::Row<'_>) -> Result<FaqEntry, CampusError> {
    let get_err = |e: rusqlite::Error| CampusError::Storage(e.to_string());

    let id_str: String = row.get(0).map_err(get_err)?;
    let keywords_json: String = row.get(3).map_err(get_err)?;
    let languages_json: String = row.get(5).map_err(get_err)?;
    let is_active: i32 = row.get(6).map_err(get_err)?;

    Ok(FaqEntry {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| CampusError::Storage(format!("Invalid UUID: {}", e)))?,
        question: row.get(1).map_err(get_err)?,
        answer: row.get(2).map_err(get_err)?,
        keywords: serde_json::from_str(&keywords_json)?,
        category: row.get(4).map_err(get_err)?,
        languages: serde_json::from_str(&languages_json)?,
        is_active: is_active != 0,
        priority: row.get(7).map_err(get_err)?,
        created_at: from_millis(row.get(8).map_err(get_err)?),
        updated_at: from_millis(row.get(9).map_err(get_err)?),
    })
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_db() -> Arc<Database> {
        Arc::new(Database::in_memory().unwrap())
    }

    fn make_faq(question: &str, category: &str) -> FaqEntry {
        FaqEntry::new(question, "Some answer.", category)
            .with_keywords(&["alpha", "beta"])
            .with_language("hi", "प्रश्न?", "उत्तर।")
    }

    fn make_log(session: &str, message: &str, offset_ms: i64) -> ConversationLog {
        ConversationLog {
            session_id: session.to_string(),
            message_id: Uuid::new_v4().to_string(),
            user_id: Some("u-1".to_string()),
            user_message: message.to_string(),
            bot_response: format!("re: {}", message),
            detected_language: "en".to_string(),
            confidence: 0.9,
            category: Some("fees".to_string()),
            timestamp: Utc::now() + Duration::milliseconds(offset_ms),
            fallback_triggered: false,
            response_time_ms: 12,
        }
    }

    #[test]
    fn test_faq_save_and_find() {
        let repo = FaqRepository::new(make_db());
        let faq = make_faq("What is the fee?", "fees");
        repo.save(&faq).unwrap();

        let found = repo.find_by_id(faq.id).unwrap().unwrap();
        assert_eq!(found.question, "What is the fee?");
        assert_eq!(found.keywords, vec!["alpha", "beta"]);
        assert_eq!(found.localized_question("hi"), Some("प्रश्न?"));
        assert!(found.is_active);
    }

    #[test]
    fn test_faq_find_missing() {
        let repo = FaqRepository::new(make_db());
        assert!(repo.find_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_faq_save_is_upsert() {
        let repo = FaqRepository::new(make_db());
        let mut faq = make_faq("Old question?", "fees");
        repo.save(&faq).unwrap();
        faq.question = "New question?".to_string();
        repo.save(&faq).unwrap();

        assert_eq!(repo.count(false).unwrap(), 1);
        assert_eq!(
            repo.find_by_id(faq.id).unwrap().unwrap().question,
            "New question?"
        );
    }

    #[test]
    fn test_faq_list_preserves_insertion_order() {
        let repo = FaqRepository::new(make_db());
        let first = make_faq("First?", "fees");
        let second = make_faq("Second?", "admissions");
        repo.save(&first).unwrap();
        repo.save(&second).unwrap();

        let listed = repo.list(true).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[test]
    fn test_faq_deactivate_hides_from_active_list() {
        let repo = FaqRepository::new(make_db());
        let faq = make_faq("Gone soon?", "contact");
        repo.save(&faq).unwrap();

        assert!(repo.deactivate(faq.id).unwrap());
        assert!(!repo.deactivate(faq.id).unwrap());
        assert!(repo.list(true).unwrap().is_empty());
        assert_eq!(repo.list(false).unwrap().len(), 1);
        assert_eq!(repo.count(true).unwrap(), 0);
    }

    #[test]
    fn test_faq_update() {
        let repo = FaqRepository::new(make_db());
        let mut faq = make_faq("Where?", "facilities");
        assert!(!repo.update(&faq).unwrap());

        repo.save(&faq).unwrap();
        faq.answer = "Block D.".to_string();
        assert!(repo.update(&faq).unwrap());
        assert_eq!(repo.find_by_id(faq.id).unwrap().unwrap().answer, "Block D.");
    }

    #[test]
    fn test_faq_find_by_category() {
        let repo = FaqRepository::new(make_db());
        repo.save(&make_faq("Fee one?", "fees")).unwrap();
        repo.save(&make_faq("Fee two?", "fees")).unwrap();
        repo.save(&make_faq("Admit?", "admissions")).unwrap();

        assert_eq!(repo.find_by_category("fees", 10).unwrap().len(), 2);
        assert_eq!(repo.find_by_category("fees", 1).unwrap().len(), 1);
        assert!(repo.find_by_category("placement", 10).unwrap().is_empty());
    }

    #[test]
    fn test_conversation_history_newest_first_with_limit() {
        let repo = ConversationRepository::new(make_db());
        repo.save(&make_log("s-1", "first", -20)).unwrap();
        repo.save(&make_log("s-1", "second", -10)).unwrap();
        repo.save(&make_log("s-1", "third", 0)).unwrap();
        repo.save(&make_log("s-2", "other", 0)).unwrap();

        let history = repo.history("s-1", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user_message, "third");
        assert_eq!(history[1].user_message, "second");
        assert_eq!(history[0].category.as_deref(), Some("fees"));
        assert_eq!(history[0].response_time_ms, 12);
    }

    #[test]
    fn test_conversation_history_same_timestamp_uses_insert_order() {
        let repo = ConversationRepository::new(make_db());
        let mut a = make_log("s-1", "a", 0);
        let mut b = make_log("s-1", "b", 0);
        let ts = Utc::now();
        a.timestamp = ts;
        b.timestamp = ts;
        repo.save(&a).unwrap();
        repo.save(&b).unwrap();

        let history = repo.history("s-1", 10).unwrap();
        assert_eq!(history[0].user_message, "b");
        assert_eq!(history[1].user_message, "a");
    }

    #[test]
    fn test_conversation_recent_and_stats() {
        let repo = ConversationRepository::new(make_db());
        repo.save(&make_log("s-1", "now", 0)).unwrap();
        let mut old = make_log("s-2", "old", 0);
        old.timestamp = Utc::now() - Duration::days(40);
        repo.save(&old).unwrap();

        assert_eq!(repo.recent(24).unwrap().len(), 1);
        let stats = repo.stats(30).unwrap();
        assert_eq!(stats.total_conversations, 1);
        assert_eq!(stats.unique_sessions, 1);
    }

    #[test]
    fn test_user_upsert() {
        let repo = UserRepository::new(make_db());
        repo.upsert("u-1", "hi").unwrap();
        repo.upsert("u-1", "ta").unwrap();

        let user = repo.find("u-1").unwrap().unwrap();
        assert_eq!(user.preferred_language, "hi");
        assert_eq!(user.total_conversations, 2);
        assert!(repo.find("nobody").unwrap().is_none());
    }

    #[test]
    fn test_feedback_save_and_stats() {
        let repo = FeedbackRepository::new(make_db());
        for rating in [5u8, 3, 4] {
            repo.save(&Feedback {
                session_id: "s-1".to_string(),
                message_id: "m-1".to_string(),
                user_id: None,
                rating,
                comment: None,
                timestamp: Utc::now(),
            })
            .unwrap();
        }

        let stats = repo.stats().unwrap();
        assert_eq!(stats.total_feedback, 3);
        assert!((stats.average_rating - 4.0).abs() < 1e-9);
        assert_eq!(stats.rating_distribution.get(&5), Some(&1));
    }

    #[test]
    fn test_feedback_rejects_out_of_range() {
        let repo = FeedbackRepository::new(make_db());
        let result = repo.save(&Feedback {
            session_id: "s-1".to_string(),
            message_id: "m-1".to_string(),
            user_id: None,
            rating: 0,
            comment: None,
            timestamp: Utc::now(),
        });
        assert!(matches!(result, Err(CampusError::Storage(_))));
    }
}
