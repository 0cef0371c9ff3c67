//! Aggregate analytics over conversation logs and feedback.
//!
//! Both backends collect the raw rows and fold them here so the SQLite and
//! in-memory stores report identical numbers.

use std::collections::{BTreeMap, HashMap, HashSet};

use campus_core::types::{ConversationLog, ConversationStats, FeedbackStats};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Summarize a set of conversation logs.
///
/// Conversations without a category are left out of `categories_queried`.
pub fn conversation_stats(logs: &[ConversationLog]) -> ConversationStats {
    if logs.is_empty() {
        return ConversationStats::default();
    }

    let total = logs.len() as f64;
    let mut sessions = HashSet::new();
    let mut languages_used: HashMap<String, u64> = HashMap::new();
    let mut categories_queried: HashMap<String, u64> = HashMap::new();
    let mut confidence_sum = 0.0;
    let mut response_time_sum = 0.0;
    let mut fallbacks = 0u64;

    for log in logs {
        sessions.insert(log.session_id.as_str());
        *languages_used
            .entry(log.detected_language.clone())
            .or_default() += 1;
        if let Some(category) = log.category.as_ref().filter(|c| !c.is_empty()) {
            *categories_queried.entry(category.clone()).or_default() += 1;
        }
        confidence_sum += log.confidence;
        response_time_sum += log.response_time_ms as f64;
        if log.fallback_triggered {
            fallbacks += 1;
        }
    }

    ConversationStats {
        total_conversations: logs.len() as u64,
        unique_sessions: sessions.len() as u64,
        languages_used,
        categories_queried,
        average_confidence: round2(confidence_sum / total),
        fallback_rate: round2(fallbacks as f64 / total * 100.0),
        average_response_time_ms: round2(response_time_sum / total),
    }
}

/// Summarize a set of 1-5 ratings.
pub fn feedback_stats(ratings: &[u8]) -> FeedbackStats {
    if ratings.is_empty() {
        return FeedbackStats::default();
    }

    let mut rating_distribution: BTreeMap<u8, u64> = (1..=5).map(|r| (r, 0)).collect();
    for rating in ratings {
        *rating_distribution.entry(*rating).or_default() += 1;
    }
    let sum: u64 = ratings.iter().map(|r| *r as u64).sum();

    FeedbackStats {
        average_rating: round2(sum as f64 / ratings.len() as f64),
        total_feedback: ratings.len() as u64,
        rating_distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn log(session: &str, lang: &str, category: Option<&str>, fallback: bool) -> ConversationLog {
        ConversationLog {
            session_id: session.to_string(),
            message_id: "m".to_string(),
            user_id: None,
            user_message: "q".to_string(),
            bot_response: "a".to_string(),
            detected_language: lang.to_string(),
            confidence: if fallback { 0.0 } else { 0.8 },
            category: category.map(str::to_string),
            timestamp: Utc::now(),
            fallback_triggered: fallback,
            response_time_ms: 30,
        }
    }

    #[test]
    fn test_empty_conversation_stats() {
        let stats = conversation_stats(&[]);
        assert_eq!(stats.total_conversations, 0);
        assert_eq!(stats.fallback_rate, 0.0);
    }

    #[test]
    fn test_conversation_stats_aggregates() {
        let logs = vec![
            log("s1", "en", Some("fees"), false),
            log("s1", "hi", Some("fees"), false),
            log("s2", "en", None, true),
            log("s3", "ta", Some("admissions"), false),
        ];
        let stats = conversation_stats(&logs);

        assert_eq!(stats.total_conversations, 4);
        assert_eq!(stats.unique_sessions, 3);
        assert_eq!(stats.languages_used.get("en"), Some(&2));
        assert_eq!(stats.categories_queried.get("fees"), Some(&2));
        assert_eq!(stats.categories_queried.len(), 2);
        assert!((stats.fallback_rate - 25.0).abs() < 1e-9);
        assert!((stats.average_confidence - 0.6).abs() < 1e-9);
        assert!((stats.average_response_time_ms - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_feedback_stats() {
        let stats = feedback_stats(&[5, 4, 4, 1]);
        assert_eq!(stats.total_feedback, 4);
        assert!((stats.average_rating - 3.5).abs() < 1e-9);
        assert_eq!(stats.rating_distribution.get(&4), Some(&2));
        assert_eq!(stats.rating_distribution.get(&2), Some(&0));
        assert_eq!(stats.rating_distribution.len(), 5);
    }

    #[test]
    fn test_feedback_stats_empty() {
        let stats = feedback_stats(&[]);
        assert_eq!(stats.total_feedback, 0);
        assert!(stats.rating_distribution.is_empty());
    }
}
