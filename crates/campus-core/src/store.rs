//! Persistence capabilities consumed by the turn engine.
//!
//! The engine only needs to read the FAQ list and to record what happened;
//! concrete backends live in `campus-storage`.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ConversationLog, FaqEntry, Feedback};

/// Source of the curated FAQ list.
#[async_trait]
pub trait FaqSource: Send + Sync {
    /// Load every active FAQ entry in a stable order.
    async fn load_faqs(&self) -> Result<Vec<FaqEntry>>;
}

/// Sink and query surface for conversation records.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append one exchange to the conversation log.
    async fn save_conversation(&self, log: &ConversationLog) -> Result<()>;

    /// Create the user with `preferred_language`, or bump their activity.
    async fn upsert_user(&self, user_id: &str, preferred_language: &str) -> Result<()>;

    /// Most recent exchanges for a session, newest first.
    async fn conversation_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationLog>>;

    /// Record a rating for a previous response.
    async fn save_feedback(&self, feedback: &Feedback) -> Result<()>;
}
