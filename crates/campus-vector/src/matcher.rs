//! Semantic FAQ matching over the published index.

use std::sync::Arc;
use std::time::Duration;

use campus_core::error::CampusError;
use campus_core::types::FaqEntry;
use tracing::debug;

use crate::embedding::{embed_batch_within, DynEmbeddingService};
use crate::index::{EmbeddingIndex, IndexSnapshot, IndexStats};

/// A ranked candidate.
#[derive(Debug, Clone)]
pub struct Match {
    pub faq: Arc<FaqEntry>,
    /// Similarity clamped to [0, 1] for reporting.
    pub score: f64,
    /// Raw cosine similarity used for ranking and thresholding.
    pub raw_score: f64,
    /// The variant text that produced this score.
    pub matched_text: String,
    pub matched_language: String,
}

/// Result of asking for the single best answer.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(Match),
    /// Nothing reached the threshold. Carries the best raw score seen, if the
    /// index had any entries at all.
    NoMatch { best_score: Option<f64> },
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

/// Rank every variant in `snapshot` against `query_vector`.
///
/// The sort is stable and descending, so variants with equal scores keep
/// their index order. At most `top_k` candidates are returned, unfiltered.
pub fn rank(snapshot: &IndexSnapshot, query_vector: &[f32], top_k: usize) -> Vec<Match> {
    let mut scored: Vec<(usize, f64)> = snapshot
        .score_all(query_vector)
        .into_iter()
        .enumerate()
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    scored
        .into_iter()
        .filter_map(|(idx, raw)| {
            let variant = snapshot.variants().get(idx)?;
            let faq = snapshot.faq_for(idx)?;
            Some(Match {
                faq: Arc::clone(faq),
                score: raw.clamp(0.0, 1.0),
                raw_score: raw,
                matched_text: variant.text.clone(),
                matched_language: variant.language.clone(),
            })
        })
        .collect()
}

/// Embeds queries and ranks them against the shared [`EmbeddingIndex`].
pub struct Matcher {
    index: Arc<EmbeddingIndex>,
    embedder: Arc<dyn DynEmbeddingService>,
    threshold: f64,
    embed_timeout: Duration,
}

impl Matcher {
    pub fn new(
        index: Arc<EmbeddingIndex>,
        embedder: Arc<dyn DynEmbeddingService>,
        threshold: f64,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            index,
            embedder,
            threshold,
            embed_timeout,
        }
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Rebuild the shared index with this matcher's embedder.
    pub async fn rebuild(&self, faqs: Vec<FaqEntry>) -> Result<IndexStats, CampusError> {
        self.index
            .rebuild(faqs, self.embedder.as_ref(), self.embed_timeout)
            .await
    }

    async fn top_candidates(&self, query: &str, top_k: usize) -> Result<Vec<Match>, CampusError> {
        let snapshot = self.index.snapshot();
        if snapshot.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let texts = [query.to_string()];
        let query_vector = embed_batch_within(self.embedder.as_ref(), &texts, self.embed_timeout)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CampusError::Embedding("no vector returned for query".to_string()))?;

        Ok(rank(&snapshot, &query_vector, top_k))
    }

    /// Up to `top_k` candidates whose raw score reaches the threshold, best
    /// first.
    pub async fn find_matches(&self, query: &str, top_k: usize) -> Result<Vec<Match>, CampusError> {
        let threshold = self.threshold;
        Ok(self
            .top_candidates(query, top_k)
            .await?
            .into_iter()
            .filter(|m| m.raw_score >= threshold)
            .collect())
    }

    /// The single best candidate, or why there was none.
    pub async fn best_match(&self, query: &str, top_k: usize) -> Result<MatchOutcome, CampusError> {
        let mut candidates = self.top_candidates(query, top_k.max(1)).await?;
        if candidates.is_empty() {
            return Ok(MatchOutcome::NoMatch { best_score: None });
        }

        let best = candidates.swap_remove(0);
        debug!(
            score = best.raw_score,
            threshold = self.threshold,
            faq = %best.faq.id,
            "Best FAQ candidate"
        );
        if best.raw_score >= self.threshold {
            Ok(MatchOutcome::Matched(best))
        } else {
            Ok(MatchOutcome::NoMatch {
                best_score: Some(best.raw_score),
            })
        }
    }
}
