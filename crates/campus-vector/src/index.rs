//! In-memory embedding index over FAQ question variants.
//!
//! Every active FAQ contributes one variant for its canonical question plus
//! one per non-empty localized question. The index is published as an
//! immutable [`IndexSnapshot`] behind an `Arc`; readers clone the pointer and
//! a rebuild swaps in a fresh snapshot, so a query never observes a
//! half-built index.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use campus_core::error::CampusError;
use campus_core::types::FaqEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embedding::{embed_batch_within, DynEmbeddingService};

/// One question text that was embedded, with a back-reference to its FAQ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedVariant {
    /// Position of the owning FAQ in [`IndexSnapshot::faqs`].
    pub faq_index: usize,
    /// Language of `text`; the default language for canonical questions.
    pub language: String,
    pub text: String,
}

/// Summary of the currently published index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub faq_count: usize,
    pub variant_count: usize,
    pub variants_by_language: BTreeMap<String, usize>,
    pub dimensions: usize,
    pub built_at: Option<DateTime<Utc>>,
}

/// An immutable, fully-built index generation.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    faqs: Vec<Arc<FaqEntry>>,
    variants: Vec<IndexedVariant>,
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
    built_at: Option<DateTime<Utc>>,
}

impl IndexSnapshot {
    /// Snapshot with no entries. Every query against it is a no-match.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a snapshot from already-computed vectors.
    ///
    /// `vectors` must be parallel to `variants`; a length mismatch is an
    /// [`CampusError::Index`] error.
    pub fn from_parts(
        faqs: Vec<Arc<FaqEntry>>,
        variants: Vec<IndexedVariant>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, CampusError> {
        if variants.len() != vectors.len() {
            return Err(CampusError::Index(format!(
                "embedding batch returned {} vectors for {} variants",
                vectors.len(),
                variants.len()
            )));
        }
        if let Some(bad) = variants.iter().find(|v| v.faq_index >= faqs.len()) {
            return Err(CampusError::Index(format!(
                "variant '{}' points past the FAQ list",
                bad.text
            )));
        }
        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if vectors.iter().any(|v| v.len() != dimensions) {
            return Err(CampusError::Index(
                "embedding vectors have inconsistent dimensions".to_string(),
            ));
        }

        Ok(Self {
            faqs,
            variants,
            vectors,
            dimensions,
            built_at: Some(Utc::now()),
        })
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn faqs(&self) -> &[Arc<FaqEntry>] {
        &self.faqs
    }

    pub fn variants(&self) -> &[IndexedVariant] {
        &self.variants
    }

    /// The FAQ that owns variant `variant_index`.
    pub fn faq_for(&self, variant_index: usize) -> Option<&Arc<FaqEntry>> {
        self.variants
            .get(variant_index)
            .and_then(|v| self.faqs.get(v.faq_index))
    }

    /// Cosine similarity of `query` against every variant, in index order.
    pub fn score_all(&self, query: &[f32]) -> Vec<f64> {
        self.vectors
            .iter()
            .map(|v| cosine_similarity(query, v))
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        let mut variants_by_language = BTreeMap::new();
        for variant in &self.variants {
            *variants_by_language
                .entry(variant.language.clone())
                .or_insert(0) += 1;
        }
        IndexStats {
            faq_count: self.faqs.len(),
            variant_count: self.variants.len(),
            variants_by_language,
            dimensions: self.dimensions,
            built_at: self.built_at,
        }
    }
}

/// Enumerate the question variants of `faqs` in a deterministic order.
///
/// For each FAQ the canonical question comes first (tagged with
/// `default_language`), followed by localized questions in `language_order`,
/// then any remaining override languages alphabetically. Empty texts are
/// skipped.
pub fn enumerate_variants(
    faqs: &[Arc<FaqEntry>],
    language_order: &[String],
    default_language: &str,
) -> Vec<IndexedVariant> {
    let mut variants = Vec::new();

    for (faq_index, faq) in faqs.iter().enumerate() {
        if !faq.question.trim().is_empty() {
            variants.push(IndexedVariant {
                faq_index,
                language: default_language.to_string(),
                text: faq.question.clone(),
            });
        }

        let configured = language_order.iter().map(String::as_str);
        let extra = faq
            .languages
            .keys()
            .map(String::as_str)
            .filter(|lang| !language_order.iter().any(|l| l == lang));

        for lang in configured.chain(extra) {
            if let Some(text) = faq.localized_question(lang) {
                variants.push(IndexedVariant {
                    faq_index,
                    language: lang.to_string(),
                    text: text.to_string(),
                });
            }
        }
    }

    variants
}

/// Thread-safe holder of the current [`IndexSnapshot`].
pub struct EmbeddingIndex {
    current: RwLock<Arc<IndexSnapshot>>,
    /// Ticket handed to each rebuild; only the newest finished one installs.
    generation: AtomicU64,
    installed: AtomicU64,
    language_order: Vec<String>,
    default_language: String,
}

impl EmbeddingIndex {
    pub fn new(language_order: Vec<String>, default_language: &str) -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexSnapshot::empty())),
            generation: AtomicU64::new(0),
            installed: AtomicU64::new(0),
            language_order,
            default_language: default_language.to_string(),
        }
    }

    /// The currently published snapshot.
    ///
    /// Holding the returned `Arc` keeps that generation alive even if a
    /// rebuild installs a newer one meanwhile.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn stats(&self) -> IndexStats {
        self.snapshot().stats()
    }

    /// Re-embed every active FAQ and atomically publish the result.
    ///
    /// Inactive entries are skipped. On any failure (embedding error, timeout,
    /// batch length mismatch) the previous snapshot stays in place and the
    /// error is returned. If two rebuilds overlap, the one that started last
    /// wins, and the superseded call reports the stats of the snapshot that
    /// is actually installed.
    pub async fn rebuild(
        &self,
        faqs: Vec<FaqEntry>,
        embedder: &dyn DynEmbeddingService,
        deadline: Duration,
    ) -> Result<IndexStats, CampusError> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let faqs: Vec<Arc<FaqEntry>> = faqs
            .into_iter()
            .filter(|f| f.is_active)
            .map(Arc::new)
            .collect();
        let variants = enumerate_variants(&faqs, &self.language_order, &self.default_language);
        let texts: Vec<String> = variants.iter().map(|v| v.text.clone()).collect();

        debug!(
            faqs = faqs.len(),
            variants = variants.len(),
            "Embedding FAQ variants"
        );

        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embed_batch_within(embedder, &texts, deadline).await?
        };

        let snapshot = IndexSnapshot::from_parts(faqs, variants, vectors)?;
        let stats = snapshot.stats();

        if !self.install(Arc::new(snapshot), ticket) {
            warn!(ticket, "Discarding rebuild superseded by a newer one");
            return Ok(self.stats());
        }
        info!(
            faqs = stats.faq_count,
            variants = stats.variant_count,
            "FAQ index rebuilt"
        );
        Ok(stats)
    }

    /// Publish `snapshot` unless a newer generation is already installed.
    fn install(&self, snapshot: Arc<IndexSnapshot>, ticket: u64) -> bool {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if ticket < self.installed.load(Ordering::SeqCst) {
            return false;
        }
        self.installed.store(ticket, Ordering::SeqCst);
        *guard = snapshot;
        true
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
