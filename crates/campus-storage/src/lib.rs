//! Campus Storage crate - SQLite persistence, in-memory store, FAQ import.
//!
//! Provides a WAL-mode SQLite database with migrations, repositories for
//! FAQs, conversation logs, users and feedback, conversation analytics, and
//! async adapters implementing the core persistence capabilities.

pub mod db;
pub mod import;
pub mod migrations;
pub mod repository;
pub mod stats;
pub mod store;

pub use db::Database;
pub use import::{import_faqs_json, parse_faqs_json, FaqRecord};
pub use repository::{
    ConversationRepository, FaqRepository, FeedbackRepository, UserRepository,
};
pub use store::{MemoryStore, SqliteStore};
