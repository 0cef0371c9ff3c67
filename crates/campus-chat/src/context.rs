//! In-memory session context.
//!
//! Each session keeps a short FIFO window of recent turns and the last
//! language seen. The map lock is only held to find or insert a session;
//! turns on one session serialize on that session's own mutex.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};

/// One remembered user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTurn {
    pub text: String,
    pub language: String,
    pub timestamp: DateTime<Utc>,
}

/// Rolling state for a single conversation.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: String,
    pub turns: VecDeque<SessionTurn>,
    pub last_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl SessionContext {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            turns: VecDeque::new(),
            last_language: None,
            created_at: now,
            last_active: now,
        }
    }

    /// Append a turn, dropping the oldest ones beyond `window`.
    fn push(&mut self, text: &str, language: &str, window: usize) {
        let now = Utc::now();
        self.turns.push_back(SessionTurn {
            text: text.to_string(),
            language: language.to_string(),
            timestamp: now,
        });
        while self.turns.len() > window {
            self.turns.pop_front();
        }
        self.last_language = Some(language.to_string());
        self.last_active = now;
    }
}

type SharedContext = Arc<Mutex<SessionContext>>;

/// Session contexts keyed by session id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedContext>>,
    window: usize,
}

impl SessionStore {
    pub fn new(window: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            window: window.max(1),
        }
    }

    fn existing(&self, session_id: &str) -> Option<SharedContext> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    fn get_or_create(&self, session_id: &str) -> SharedContext {
        if let Some(ctx) = self.existing(session_id) {
            return ctx;
        }
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionContext::new(session_id))))
            .clone()
    }

    /// Record a turn, creating the session on first use. Returns the window length.
    pub fn record_turn(&self, session_id: &str, text: &str, language: &str) -> usize {
        let ctx = self.get_or_create(session_id);
        let mut guard = ctx.lock().unwrap_or_else(PoisonError::into_inner);
        guard.push(text, language, self.window);
        guard.turns.len()
    }

    /// Last language recorded for the session, if it exists.
    pub fn last_language(&self, session_id: &str) -> Option<String> {
        let ctx = self.existing(session_id)?;
        let guard = ctx.lock().unwrap_or_else(PoisonError::into_inner);
        guard.last_language.clone()
    }

    /// Snapshot of a session's context.
    pub fn get(&self, session_id: &str) -> Option<SessionContext> {
        let ctx = self.existing(session_id)?;
        let guard = ctx.lock().unwrap_or_else(PoisonError::into_inner);
        Some(guard.clone())
    }

    /// Delete a session. Returns whether it existed.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    /// Drop sessions idle for longer than `timeout`. Returns how many were dropped.
    pub fn evict_idle(&self, timeout: Duration) -> usize {
        let cutoff = Utc::now() - timeout;
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, ctx| {
            let guard = ctx.lock().unwrap_or_else(PoisonError::into_inner);
            guard.last_active >= cutoff
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_turn_creates_session() {
        let store = SessionStore::new(5);
        assert!(store.get("s-1").is_none());
        assert_eq!(store.record_turn("s-1", "Hello", "en"), 1);
        let ctx = store.get("s-1").unwrap();
        assert_eq!(ctx.id, "s-1");
        assert_eq!(ctx.last_language.as_deref(), Some("en"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_window_is_fifo_and_bounded() {
        let store = SessionStore::new(5);
        for i in 0..12 {
            let len = store.record_turn("s-1", &format!("turn {}", i), "en");
            assert!(len <= 5);
        }
        let ctx = store.get("s-1").unwrap();
        let texts: Vec<_> = ctx.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["turn 7", "turn 8", "turn 9", "turn 10", "turn 11"]);
    }

    #[test]
    fn test_last_language_tracks_latest_turn() {
        let store = SessionStore::new(5);
        store.record_turn("s-1", "Hello", "en");
        store.record_turn("s-1", "नमस्ते", "hi");
        assert_eq!(store.last_language("s-1").as_deref(), Some("hi"));
        assert!(store.last_language("missing").is_none());
    }

    #[test]
    fn test_remove_clears_context() {
        let store = SessionStore::new(5);
        store.record_turn("s-1", "Hello", "en");
        assert!(store.remove("s-1"));
        assert!(!store.remove("s-1"));
        assert!(store.get("s-1").is_none());

        assert_eq!(store.record_turn("s-1", "Again", "en"), 1);
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = SessionStore::new(2);
        store.record_turn("a", "1", "en");
        store.record_turn("a", "2", "en");
        store.record_turn("b", "x", "ta");
        assert_eq!(store.get("a").unwrap().turns.len(), 2);
        assert_eq!(store.get("b").unwrap().turns.len(), 1);
    }

    #[test]
    fn test_evict_idle() {
        let store = SessionStore::new(5);
        store.record_turn("old", "Hello", "en");
        store.record_turn("fresh", "Hello", "en");
        {
            let ctx = store.existing("old").unwrap();
            ctx.lock().unwrap().last_active = Utc::now() - Duration::minutes(45);
        }
        assert_eq!(store.evict_idle(Duration::minutes(30)), 1);
        assert!(store.get("old").is_none());
        assert!(store.get("fresh").is_some());
    }

    #[test]
    fn test_zero_window_keeps_one_turn() {
        let store = SessionStore::new(0);
        store.record_turn("s", "a", "en");
        assert_eq!(store.record_turn("s", "b", "en"), 1);
    }

    #[test]
    fn test_concurrent_turns_on_one_session() {
        let store = Arc::new(SessionStore::new(5));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        store.record_turn("shared", &format!("{}-{}", i, j), "en");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("shared").unwrap().turns.len(), 5);
    }
}
