//! Turn engine: central coordinator wiring detection, intents, matching and
//! response composition.
//!
//! `process_turn` never fails. Anything that goes wrong inside a turn is
//! logged and turned into a localized error reply with the fallback flag set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use campus_core::config::{CampusConfig, ResponseKind};
use campus_core::store::{ConversationStore, FaqSource};
use campus_core::types::{ConversationLog, FaqEntry, Feedback};
use campus_vector::embedding::DynEmbeddingService;
use campus_vector::index::{EmbeddingIndex, IndexStats};
use campus_vector::matcher::{MatchOutcome, Matcher};

use crate::categorize::QueryCategorizer;
use crate::context::{SessionContext, SessionStore};
use crate::error::ChatError;
use crate::intent::{Intent, IntentShortCircuit};
use crate::language::{LanguageClassifier, LanguageDetector, UNCERTAIN_CONFIDENCE};
use crate::recorder::ConversationRecorder;
use crate::response::{ResponseComposer, SuggestionGenerator};
use crate::translate::{TranslationGate, Translator};
use crate::types::{HistoryEntry, LanguageDetection, LanguageInfo, TurnRequest, TurnResult};

/// Persisted turns returned by `get_session_history`.
const HISTORY_LIMIT: usize = 20;

/// Capabilities the engine is built from. Constructed once at startup.
pub struct EngineServices {
    pub embedder: Arc<dyn DynEmbeddingService>,
    pub classifier: Arc<dyn LanguageClassifier>,
    pub translator: Arc<dyn Translator>,
    pub faq_source: Arc<dyn FaqSource>,
    pub store: Arc<dyn ConversationStore>,
}

/// The reply computed for a turn, before ids and logging are attached.
struct Reply {
    response: String,
    confidence: f64,
    language: String,
    category: Option<String>,
    fallback: bool,
    suggestions: Vec<String>,
}

/// Processes conversation turns against the shared FAQ index.
pub struct TurnEngine {
    config: CampusConfig,
    matcher: Matcher,
    detector: LanguageDetector,
    intents: IntentShortCircuit,
    categorizer: QueryCategorizer,
    composer: ResponseComposer,
    suggestions: SuggestionGenerator,
    sessions: SessionStore,
    faq_source: Arc<dyn FaqSource>,
    store: Arc<dyn ConversationStore>,
    recorder: ConversationRecorder,
}

impl TurnEngine {
    /// Build an engine with an empty index.
    ///
    /// Must be called from within a Tokio runtime: the conversation recorder
    /// task is spawned here.
    pub fn new(config: CampusConfig, services: EngineServices) -> Self {
        let default_language = config.languages.default.clone();

        let index = Arc::new(EmbeddingIndex::new(
            config.languages.supported.clone(),
            &default_language,
        ));
        let matcher = Matcher::new(
            index,
            services.embedder,
            config.nlp.confidence_threshold,
            Duration::from_millis(config.nlp.embed_timeout_ms),
        );

        let gate = TranslationGate::new(
            services.translator,
            Duration::from_millis(config.nlp.translate_timeout_ms),
        );
        let composer = ResponseComposer::new(gate, &default_language);
        let suggestions = SuggestionGenerator::new(composer.clone(), &config.suggestions);

        let (recorder, _task) = ConversationRecorder::spawn(Arc::clone(&services.store));

        Self {
            detector: LanguageDetector::new(services.classifier, &config.languages),
            intents: IntentShortCircuit::new(),
            categorizer: QueryCategorizer::new(config.categories.clone()),
            sessions: SessionStore::new(config.session.window_size),
            faq_source: services.faq_source,
            store: services.store,
            matcher,
            composer,
            suggestions,
            recorder,
            config,
        }
    }

    pub fn config(&self) -> &CampusConfig {
        &self.config
    }

    // ---- Index lifecycle ----

    /// Replace the index with embeddings of `faqs`.
    pub async fn rebuild_index(&self, faqs: Vec<FaqEntry>) -> Result<IndexStats, ChatError> {
        Ok(self.matcher.rebuild(faqs).await?)
    }

    /// Reload FAQs from the source and rebuild.
    pub async fn refresh_index(&self) -> Result<IndexStats, ChatError> {
        let faqs = self.faq_source.load_faqs().await?;
        self.rebuild_index(faqs).await
    }

    pub fn index_stats(&self) -> IndexStats {
        self.matcher.stats()
    }

    /// Refresh the index and evict idle sessions every `interval` until the
    /// handle is aborted. The first tick happens one interval from now.
    pub fn spawn_refresh_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match engine.refresh_index().await {
                    Ok(stats) => debug!(variants = stats.variant_count, "Periodic index refresh"),
                    Err(e) => warn!("Periodic index refresh failed: {}", e),
                }
                engine.evict_idle_sessions();
            }
        })
    }

    // ---- Turns ----

    /// Answer one message. Always returns a well-formed result.
    pub async fn process_turn(&self, request: TurnRequest) -> TurnResult {
        let started = Instant::now();
        let session_id = request
            .session_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let message_id = Uuid::new_v4().to_string();

        match self.handle_turn(&request, &session_id).await {
            Ok(reply) => {
                let elapsed = started.elapsed().as_millis() as u64;
                self.recorder.record(ConversationLog {
                    session_id: session_id.clone(),
                    message_id: message_id.clone(),
                    user_id: request.user_id.clone(),
                    user_message: request.message.clone(),
                    bot_response: reply.response.clone(),
                    detected_language: reply.language.clone(),
                    confidence: reply.confidence,
                    category: reply.category.clone(),
                    timestamp: Utc::now(),
                    fallback_triggered: reply.fallback,
                    response_time_ms: elapsed,
                });
                debug!(
                    session_id = %session_id,
                    language = %reply.language,
                    confidence = reply.confidence,
                    fallback = reply.fallback,
                    elapsed_ms = elapsed,
                    "Turn processed"
                );
                TurnResult {
                    response: reply.response,
                    confidence: reply.confidence,
                    detected_language: reply.language,
                    session_id,
                    message_id,
                    category: reply.category,
                    fallback_to_human: reply.fallback,
                    suggested_questions: reply.suggestions,
                }
            }
            Err(e) => {
                error!(session_id = %session_id, "Turn failed: {}", e);
                let language = self.config.languages.default.clone();
                TurnResult {
                    response: self.config.canned(ResponseKind::Error, &language),
                    confidence: 0.0,
                    detected_language: language,
                    session_id,
                    message_id,
                    category: None,
                    fallback_to_human: true,
                    suggested_questions: Vec::new(),
                }
            }
        }
    }

    async fn handle_turn(&self, request: &TurnRequest, session_id: &str) -> Result<Reply, ChatError> {
        let message = request.message.trim();
        let language = self.resolve_language(message, &request.language, session_id);
        self.sessions.record_turn(session_id, message, &language);

        match self.intents.check(message) {
            Some(Intent::Greeting) => {
                let suggestions = self.get_suggestions(None, &language).await;
                return Ok(Reply {
                    response: self.config.canned(ResponseKind::Greeting, &language),
                    confidence: 1.0,
                    language,
                    category: None,
                    fallback: false,
                    suggestions,
                });
            }
            Some(Intent::Farewell) => {
                self.sessions.remove(session_id);
                return Ok(Reply {
                    response: self.config.canned(ResponseKind::Farewell, &language),
                    confidence: 1.0,
                    language,
                    category: None,
                    fallback: false,
                    suggestions: Vec::new(),
                });
            }
            None => {}
        }

        // Nothing to embed in a blank message.
        let outcome = if message.is_empty() {
            MatchOutcome::NoMatch { best_score: None }
        } else {
            match self.matcher.best_match(message, self.config.nlp.top_k).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(session_id = %session_id, "Matching failed, escalating: {}", e);
                    MatchOutcome::NoMatch { best_score: None }
                }
            }
        };

        match outcome {
            MatchOutcome::Matched(best) => {
                let response = self.composer.compose(&best.faq, &language).await;
                let category = best.faq.category.clone();
                let suggestions = self.get_suggestions(Some(&category), &language).await;
                Ok(Reply {
                    response,
                    confidence: best.score,
                    language,
                    category: Some(category),
                    fallback: false,
                    suggestions,
                })
            }
            MatchOutcome::NoMatch { best_score } => {
                debug!(session_id = %session_id, ?best_score, "No confident match");
                let category = self.categorizer.categorize(message).map(str::to_string);
                let suggestions = self.get_suggestions(category.as_deref(), &language).await;
                Ok(Reply {
                    response: self.config.no_match_message(&language),
                    confidence: 0.0,
                    language,
                    category,
                    fallback: true,
                    suggestions,
                })
            }
        }
    }

    /// Detect the reply language, reusing the session's last language when
    /// detection had too little signal.
    fn resolve_language(&self, message: &str, hint: &str, session_id: &str) -> String {
        let detection = self.detector.detect(message, hint);
        if self.config.session.sticky_language && detection.confidence <= UNCERTAIN_CONFIDENCE {
            if let Some(last) = self.sessions.last_language(session_id) {
                debug!(session_id = %session_id, language = %last, "Keeping session language");
                return last;
            }
        }
        detection.language
    }

    // ---- Queries ----

    /// Up to three questions in `language`, optionally limited to `category`.
    pub async fn get_suggestions(&self, category: Option<&str>, language: &str) -> Vec<String> {
        let snapshot = self.matcher.index().snapshot();
        self.suggestions
            .suggest(snapshot.faqs(), category, language)
            .await
    }

    /// Persisted turns for a session, oldest first.
    pub async fn get_session_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, ChatError> {
        self.recorder.flush().await;
        let mut logs = self
            .store
            .conversation_history(session_id, HISTORY_LIMIT)
            .await?;
        logs.reverse();
        Ok(logs.into_iter().map(HistoryEntry::from).collect())
    }

    pub fn detect_language(&self, text: &str) -> LanguageDetection {
        self.detector.detect(text, crate::types::AUTO_LANGUAGE)
    }

    pub fn supported_languages(&self) -> Vec<LanguageInfo> {
        let languages = &self.config.languages;
        languages
            .supported
            .iter()
            .map(|code| LanguageInfo {
                code: code.clone(),
                name: languages.display_name(code).to_string(),
            })
            .collect()
    }

    /// Store a 1-5 rating for a previous response.
    pub async fn submit_feedback(
        &self,
        session_id: &str,
        message_id: &str,
        rating: u8,
        comment: Option<String>,
        user_id: Option<String>,
    ) -> Result<(), ChatError> {
        let feedback = Feedback {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
            user_id,
            rating,
            comment,
            timestamp: Utc::now(),
        };
        self.store.save_feedback(&feedback).await?;
        info!(session_id = %session_id, rating, "Feedback recorded");
        Ok(())
    }

    /// Wait until every queued conversation log has been handed to the store.
    pub async fn flush(&self) {
        self.recorder.flush().await;
    }

    // ---- Sessions ----

    /// Drop sessions idle longer than `session.idle_timeout_minutes`.
    pub fn evict_idle_sessions(&self) -> usize {
        let timeout = chrono::Duration::minutes(i64::from(self.config.session.idle_timeout_minutes));
        let evicted = self.sessions.evict_idle(timeout);
        if evicted > 0 {
            info!(evicted, "Evicted idle sessions");
        }
        evicted
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session_context(&self, session_id: &str) -> Option<SessionContext> {
        self.sessions.get(session_id)
    }
}
