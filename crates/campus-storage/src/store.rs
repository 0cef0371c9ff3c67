//! Async capability adapters over the persistence backends.
//!
//! `SqliteStore` runs each blocking SQLite call on the blocking thread pool.
//! `MemoryStore` keeps everything in process memory and is the backend for
//! tests and for running without a data directory.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::debug;

use campus_core::error::{CampusError, Result};
use campus_core::store::{ConversationStore, FaqSource};
use campus_core::types::{
    ConversationLog, ConversationStats, FaqEntry, Feedback, FeedbackStats, UserProfile,
};

use crate::db::Database;
use crate::repository::{
    validate_rating, ConversationRepository, FaqRepository, FeedbackRepository, UserRepository,
};
use crate::stats;

/// Run a blocking closure against the database on the blocking pool.
async fn blocking<T, F>(db: &Arc<Database>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(Arc<Database>) -> Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(db))
        .await
        .map_err(|e| CampusError::Storage(format!("Storage task panicked: {}", e)))?
}

/// SQLite-backed implementation of the persistence capabilities.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    /// Open (or create) `campus.db` inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let db = Database::new(&data_dir.join("campus.db"))?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Database::in_memory()?),
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn faqs(&self) -> FaqRepository {
        FaqRepository::new(Arc::clone(&self.db))
    }

    pub fn conversations(&self) -> ConversationRepository {
        ConversationRepository::new(Arc::clone(&self.db))
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(Arc::clone(&self.db))
    }

    pub fn feedback(&self) -> FeedbackRepository {
        FeedbackRepository::new(Arc::clone(&self.db))
    }

    /// Insert or replace every entry, returning how many were written.
    pub async fn save_faqs(&self, faqs: Vec<FaqEntry>) -> Result<usize> {
        blocking(&self.db, move |db| {
            let repo = FaqRepository::new(db);
            for faq in &faqs {
                repo.save(faq)?;
            }
            Ok(faqs.len())
        })
        .await
    }

    pub async fn conversation_stats(&self, days: i64) -> Result<ConversationStats> {
        blocking(&self.db, move |db| ConversationRepository::new(db).stats(days)).await
    }

    pub async fn feedback_stats(&self) -> Result<FeedbackStats> {
        blocking(&self.db, |db| FeedbackRepository::new(db).stats()).await
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let user_id = user_id.to_string();
        blocking(&self.db, move |db| UserRepository::new(db).find(&user_id)).await
    }
}

#[async_trait]
impl FaqSource for SqliteStore {
    async fn load_faqs(&self) -> Result<Vec<FaqEntry>> {
        let faqs = blocking(&self.db, |db| FaqRepository::new(db).list(true)).await?;
        debug!(count = faqs.len(), "Loaded FAQs from SQLite");
        Ok(faqs)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn save_conversation(&self, log: &ConversationLog) -> Result<()> {
        let log = log.clone();
        blocking(&self.db, move |db| ConversationRepository::new(db).save(&log)).await
    }

    async fn upsert_user(&self, user_id: &str, preferred_language: &str) -> Result<()> {
        let user_id = user_id.to_string();
        let language = preferred_language.to_string();
        blocking(&self.db, move |db| {
            UserRepository::new(db).upsert(&user_id, &language)
        })
        .await
    }

    async fn conversation_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationLog>> {
        let session_id = session_id.to_string();
        blocking(&self.db, move |db| {
            ConversationRepository::new(db).history(&session_id, limit as u64)
        })
        .await
    }

    async fn save_feedback(&self, feedback: &Feedback) -> Result<()> {
        let feedback = feedback.clone();
        blocking(&self.db, move |db| FeedbackRepository::new(db).save(&feedback)).await
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    faqs: Vec<FaqEntry>,
    conversations: Vec<ConversationLog>,
    users: Vec<UserProfile>,
    feedback: Vec<Feedback>,
}

/// In-process implementation of the persistence capabilities.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faqs(faqs: Vec<FaqEntry>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                faqs,
                ..MemoryState::default()
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| CampusError::Storage(format!("Memory store lock poisoned: {}", e)))
    }

    /// Replace the FAQ list. The next `load_faqs` sees the new entries.
    pub fn set_faqs(&self, faqs: Vec<FaqEntry>) -> Result<()> {
        self.lock()?.faqs = faqs;
        Ok(())
    }

    /// Every recorded exchange in insertion order.
    pub fn conversations(&self) -> Result<Vec<ConversationLog>> {
        Ok(self.lock()?.conversations.clone())
    }

    pub fn user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned())
    }

    pub fn conversation_stats(&self, days: i64) -> Result<ConversationStats> {
        let cutoff = Utc::now() - Duration::days(days);
        let state = self.lock()?;
        let recent: Vec<ConversationLog> = state
            .conversations
            .iter()
            .filter(|c| c.timestamp >= cutoff)
            .cloned()
            .collect();
        Ok(stats::conversation_stats(&recent))
    }

    pub fn feedback_stats(&self) -> Result<FeedbackStats> {
        let ratings: Vec<u8> = self.lock()?.feedback.iter().map(|f| f.rating).collect();
        Ok(stats::feedback_stats(&ratings))
    }
}

#[async_trait]
impl FaqSource for MemoryStore {
    async fn load_faqs(&self) -> Result<Vec<FaqEntry>> {
        Ok(self
            .lock()?
            .faqs
            .iter()
            .filter(|f| f.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn save_conversation(&self, log: &ConversationLog) -> Result<()> {
        self.lock()?.conversations.push(log.clone());
        Ok(())
    }

    async fn upsert_user(&self, user_id: &str, preferred_language: &str) -> Result<()> {
        let now = Utc::now();
        let mut state = self.lock()?;
        match state.users.iter_mut().find(|u| u.user_id == user_id) {
            Some(user) => {
                user.last_active = now;
                user.total_conversations += 1;
            }
            None => state.users.push(UserProfile {
                user_id: user_id.to_string(),
                name: None,
                email: None,
                preferred_language: preferred_language.to_string(),
                created_at: now,
                last_active: now,
                total_conversations: 1,
            }),
        }
        Ok(())
    }

    async fn conversation_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationLog>> {
        Ok(self
            .lock()?
            .conversations
            .iter()
            .rev()
            .filter(|c| c.session_id == session_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn save_feedback(&self, feedback: &Feedback) -> Result<()> {
        validate_rating(feedback.rating)?;
        self.lock()?.feedback.push(feedback.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(session: &str, message: &str) -> ConversationLog {
        ConversationLog {
            session_id: session.to_string(),
            message_id: message.to_string(),
            user_id: None,
            user_message: message.to_string(),
            bot_response: "ok".to_string(),
            detected_language: "en".to_string(),
            confidence: 1.0,
            category: None,
            timestamp: Utc::now(),
            fallback_triggered: false,
            response_time_ms: 5,
        }
    }

    fn feedback(rating: u8) -> Feedback {
        Feedback {
            session_id: "s".to_string(),
            message_id: "m".to_string(),
            user_id: None,
            rating,
            comment: Some("useful".to_string()),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_sqlite_store_faq_source_skips_inactive() {
        let store = SqliteStore::in_memory().unwrap();
        let mut hidden = FaqEntry::new("Hidden?", "No.", "contact");
        hidden.is_active = false;
        let written = store
            .save_faqs(vec![FaqEntry::new("Visible?", "Yes.", "contact"), hidden])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let faqs = store.load_faqs().await.unwrap();
        assert_eq!(faqs.len(), 1);
        assert_eq!(faqs[0].question, "Visible?");
    }

    #[tokio::test]
    async fn test_sqlite_store_history_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        store.save_conversation(&log("s-1", "one")).await.unwrap();
        store.save_conversation(&log("s-1", "two")).await.unwrap();

        let history = store.conversation_history("s-1", 20).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user_message, "two");
        assert!(store
            .conversation_history("unknown", 20)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_store_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteStore::open(dir.path()).unwrap();
            store.upsert_user("u-1", "ta").await.unwrap();
        }
        let store = SqliteStore::open(dir.path()).unwrap();
        let user = store.find_user("u-1").await.unwrap().unwrap();
        assert_eq!(user.preferred_language, "ta");
    }

    #[tokio::test]
    async fn test_sqlite_store_feedback_stats() {
        let store = SqliteStore::in_memory().unwrap();
        store.save_feedback(&feedback(4)).await.unwrap();
        store.save_feedback(&feedback(2)).await.unwrap();
        assert!(store.save_feedback(&feedback(6)).await.is_err());

        let stats = store.feedback_stats().await.unwrap();
        assert_eq!(stats.total_feedback, 2);
        assert!((stats.average_rating - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_memory_store_history_newest_first() {
        let store = MemoryStore::new();
        store.save_conversation(&log("s-1", "one")).await.unwrap();
        store.save_conversation(&log("s-2", "other")).await.unwrap();
        store.save_conversation(&log("s-1", "two")).await.unwrap();
        store.save_conversation(&log("s-1", "three")).await.unwrap();

        let history = store.conversation_history("s-1", 2).await.unwrap();
        let messages: Vec<&str> = history.iter().map(|c| c.user_message.as_str()).collect();
        assert_eq!(messages, vec!["three", "two"]);
    }

    #[tokio::test]
    async fn test_memory_store_upsert_user() {
        let store = MemoryStore::new();
        store.upsert_user("u-1", "hi").await.unwrap();
        store.upsert_user("u-1", "en").await.unwrap();

        let user = store.user("u-1").unwrap().unwrap();
        assert_eq!(user.preferred_language, "hi");
        assert_eq!(user.total_conversations, 2);
    }

    #[tokio::test]
    async fn test_memory_store_faqs_and_stats() {
        let store = MemoryStore::with_faqs(vec![FaqEntry::new("Q?", "A.", "fees")]);
        assert_eq!(store.load_faqs().await.unwrap().len(), 1);
        store.set_faqs(Vec::new()).unwrap();
        assert!(store.load_faqs().await.unwrap().is_empty());

        store.save_conversation(&log("s-1", "one")).await.unwrap();
        let stats = store.conversation_stats(30).unwrap();
        assert_eq!(stats.total_conversations, 1);

        store.save_feedback(&feedback(5)).await.unwrap();
        assert_eq!(store.feedback_stats().unwrap().total_feedback, 1);
    }
}
