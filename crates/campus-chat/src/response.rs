//! Localized answer composition and suggested follow-up questions.

use std::sync::Arc;

use campus_core::config::SuggestionConfig;
use campus_core::types::FaqEntry;

use crate::translate::TranslationGate;

/// Picks or derives the answer text for a matched FAQ in the user's language.
#[derive(Clone)]
pub struct ResponseComposer {
    gate: TranslationGate,
    default_language: String,
}

impl ResponseComposer {
    pub fn new(gate: TranslationGate, default_language: &str) -> Self {
        Self {
            gate,
            default_language: default_language.to_string(),
        }
    }

    /// Answer for `faq` in `language`.
    ///
    /// An answer override is returned verbatim. Otherwise the canonical answer
    /// is translated from the default language, falling back to the canonical
    /// text when translation is unavailable.
    pub async fn compose(&self, faq: &FaqEntry, language: &str) -> String {
        if let Some(answer) = faq.localized_answer(language) {
            return answer.to_string();
        }
        if language == self.default_language {
            return faq.answer.clone();
        }
        self.gate
            .translate(&faq.answer, &self.default_language, language)
            .await
            .into_text()
    }

    /// Question text for `faq` in `language`, by the same override-then-translate policy.
    pub async fn localize_question(&self, faq: &FaqEntry, language: &str) -> String {
        if let Some(question) = faq.localized_question(language) {
            return question.to_string();
        }
        if language == self.default_language {
            return faq.question.clone();
        }
        self.gate
            .translate(&faq.question, &self.default_language, language)
            .await
            .into_text()
    }
}

/// First-N suggestion policy over the current FAQ list.
#[derive(Clone)]
pub struct SuggestionGenerator {
    composer: ResponseComposer,
    candidate_limit: usize,
    max_suggestions: usize,
}

impl SuggestionGenerator {
    pub fn new(composer: ResponseComposer, config: &SuggestionConfig) -> Self {
        Self {
            composer,
            candidate_limit: config.candidate_limit,
            max_suggestions: config.max_suggestions,
        }
    }

    /// Up to `max_suggestions` questions in `language`, taken in list order
    /// from entries in `category` (or all entries when `None`).
    pub async fn suggest(
        &self,
        faqs: &[Arc<FaqEntry>],
        category: Option<&str>,
        language: &str,
    ) -> Vec<String> {
        let candidates = faqs
            .iter()
            .filter(|faq| category.map_or(true, |c| faq.category == c))
            .take(self.candidate_limit);

        let mut suggestions = Vec::new();
        for faq in candidates {
            let question = self.composer.localize_question(faq, language).await;
            if !question.trim().is_empty() {
                suggestions.push(question);
            }
        }
        suggestions.truncate(self.max_suggestions);
        suggestions
    }
}
