//! JSON import of curated FAQ records.
//!
//! The file is a JSON array. Only `question` and `answer` are required;
//! everything else falls back to sensible defaults so hand-written files
//! stay short.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use campus_core::error::{CampusError, Result};
use campus_core::types::{FaqEntry, LocalizedContent};

/// One FAQ as written in an import file.
#[derive(Debug, Deserialize)]
pub struct FaqRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub languages: BTreeMap<String, LocalizedContent>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    1
}

impl FaqRecord {
    /// Convert into an entry. Records without an id get a fresh one.
    pub fn into_entry(self) -> Result<FaqEntry> {
        if self.question.trim().is_empty() {
            return Err(CampusError::Serialization(
                "FAQ record has an empty question".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(FaqEntry {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            question: self.question,
            answer: self.answer,
            keywords: self.keywords,
            category: self.category,
            languages: self.languages,
            is_active: self.is_active,
            priority: self.priority,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Parse a JSON array of FAQ records.
pub fn parse_faqs_json(content: &str) -> Result<Vec<FaqEntry>> {
    let records: Vec<FaqRecord> = serde_json::from_str(content)?;
    records.into_iter().map(FaqRecord::into_entry).collect()
}

/// Read and parse a JSON array of FAQ records from `path`.
pub fn import_faqs_json(path: &Path) -> Result<Vec<FaqEntry>> {
    let content = std::fs::read_to_string(path)?;
    let faqs = parse_faqs_json(&content)?;
    info!(count = faqs.len(), "Parsed FAQ import from {}", path.display());
    Ok(faqs)
}
