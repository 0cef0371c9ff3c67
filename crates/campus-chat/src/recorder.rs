//! Background conversation recording.
//!
//! Turns hand their log record to a channel and return immediately. A single
//! task drains the channel into the [`ConversationStore`]; failures are
//! logged and dropped so persistence never affects a reply.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use campus_core::store::ConversationStore;
use campus_core::types::ConversationLog;

enum RecorderMessage {
    Record(Box<ConversationLog>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the recorder task. Cloning shares the same task.
#[derive(Clone)]
pub struct ConversationRecorder {
    tx: mpsc::UnboundedSender<RecorderMessage>,
}

impl ConversationRecorder {
    /// Start the recorder task on the current runtime.
    pub fn spawn(store: Arc<dyn ConversationStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<RecorderMessage>();

        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    RecorderMessage::Record(log) => persist(store.as_ref(), &log).await,
                    RecorderMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Conversation recorder stopped");
        });

        (Self { tx }, task)
    }

    /// Queue a record. Never blocks.
    pub fn record(&self, log: ConversationLog) {
        if self.tx.send(RecorderMessage::Record(Box::new(log))).is_err() {
            warn!("Conversation recorder is not running; dropping log");
        }
    }

    /// Wait until every record queued before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(RecorderMessage::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn persist(store: &dyn ConversationStore, log: &ConversationLog) {
    if let Err(e) = store.save_conversation(log).await {
        warn!(session_id = %log.session_id, "Failed to save conversation log: {}", e);
    }
    if let Some(user_id) = &log.user_id {
        if let Err(e) = store.upsert_user(user_id, &log.detected_language).await {
            warn!(user_id = %user_id, "Failed to upsert user: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    use campus_core::error::{CampusError, Result};
    use campus_core::types::Feedback;

    #[derive(Default)]
    struct RecordingStore {
        logs: Mutex<Vec<ConversationLog>>,
        users: Mutex<Vec<(String, String)>>,
        fail_saves: bool,
    }

    #[async_trait]
    impl ConversationStore for RecordingStore {
        async fn save_conversation(&self, log: &ConversationLog) -> Result<()> {
            if self.fail_saves {
                return Err(CampusError::Storage("disk full".to_string()));
            }
            self.logs.lock().unwrap().push(log.clone());
            Ok(())
        }

        async fn upsert_user(&self, user_id: &str, preferred_language: &str) -> Result<()> {
            self.users
                .lock()
                .unwrap()
                .push((user_id.to_string(), preferred_language.to_string()));
            Ok(())
        }

        async fn conversation_history(
            &self,
            _session_id: &str,
            _limit: usize,
        ) -> Result<Vec<ConversationLog>> {
            Ok(Vec::new())
        }

        async fn save_feedback(&self, _feedback: &Feedback) -> Result<()> {
            Ok(())
        }
    }

    fn log(message_id: &str, user_id: Option<&str>) -> ConversationLog {
        ConversationLog {
            session_id: "s-1".to_string(),
            message_id: message_id.to_string(),
            user_id: user_id.map(str::to_string),
            user_message: "Where is the library?".to_string(),
            bot_response: "Block C.".to_string(),
            detected_language: "ta".to_string(),
            confidence: 0.9,
            category: Some("facilities".to_string()),
            timestamp: Utc::now(),
            fallback_triggered: false,
            response_time_ms: 12,
        }
    }

    #[tokio::test]
    async fn test_records_in_order_after_flush() {
        let store = Arc::new(RecordingStore::default());
        let (recorder, _task) = ConversationRecorder::spawn(store.clone());
        recorder.record(log("m-1", None));
        recorder.record(log("m-2", None));
        recorder.flush().await;

        let ids: Vec<_> = store
            .logs
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.message_id.clone())
            .collect();
        assert_eq!(ids, vec!["m-1", "m-2"]);
        assert!(store.users.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upserts_user_with_detected_language() {
        let store = Arc::new(RecordingStore::default());
        let (recorder, _task) = ConversationRecorder::spawn(store.clone());
        recorder.record(log("m-1", Some("u-1")));
        recorder.flush().await;
        assert_eq!(
            store.users.lock().unwrap().as_slice(),
            &[("u-1".to_string(), "ta".to_string())]
        );
    }

    #[tokio::test]
    async fn test_save_failure_is_swallowed() {
        let store = Arc::new(RecordingStore {
            fail_saves: true,
            ..Default::default()
        });
        let (recorder, _task) = ConversationRecorder::spawn(store.clone());
        recorder.record(log("m-1", Some("u-1")));
        recorder.record(log("m-2", None));
        recorder.flush().await;
        assert!(store.logs.lock().unwrap().is_empty());
        assert_eq!(store.users.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stopped_recorder_does_not_hang() {
        let store = Arc::new(RecordingStore::default());
        let (recorder, task) = ConversationRecorder::spawn(store);
        task.abort();
        let _ = task.await;
        recorder.record(log("m-1", None));
        recorder.flush().await;
    }
}
