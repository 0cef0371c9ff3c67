//! Error types for the turn engine.

use campus_core::error::CampusError;

/// Errors raised inside a turn.
///
/// None of these reach the caller of `process_turn`; the engine converts
/// them into a localized error response at the turn boundary.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("matching error: {0}")]
    Matching(String),
    #[error("translation error: {0}")]
    Translation(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CampusError> for ChatError {
    fn from(err: CampusError) -> Self {
        match err {
            CampusError::Embedding(_) | CampusError::Index(_) | CampusError::Timeout { .. } => {
                ChatError::Matching(err.to_string())
            }
            CampusError::Translation(_) => ChatError::Translation(err.to_string()),
            CampusError::Storage(_) | CampusError::Io(_) => ChatError::Storage(err.to_string()),
            other => ChatError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::Matching("index error".to_string());
        assert_eq!(err.to_string(), "matching error: index error");

        let err = ChatError::Translation("quota".to_string());
        assert_eq!(err.to_string(), "translation error: quota");

        let err = ChatError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "storage error: disk full");

        let err = ChatError::Internal("boom".to_string());
        assert_eq!(err.to_string(), "internal error: boom");
    }

    #[test]
    fn test_from_campus_error_embedding() {
        let chat_err: ChatError = CampusError::Embedding("model not loaded".to_string()).into();
        assert!(matches!(chat_err, ChatError::Matching(_)));
        assert!(chat_err.to_string().contains("model not loaded"));
    }

    #[test]
    fn test_from_campus_error_timeout() {
        let chat_err: ChatError = CampusError::Timeout {
            operation: "embed".to_string(),
            millis: 10,
        }
        .into();
        assert!(matches!(chat_err, ChatError::Matching(_)));
    }

    #[test]
    fn test_from_campus_error_storage() {
        let chat_err: ChatError = CampusError::Storage("connection lost".to_string()).into();
        assert!(matches!(chat_err, ChatError::Storage(_)));
        assert!(chat_err.to_string().contains("connection lost"));
    }

    #[test]
    fn test_from_campus_error_config_is_internal() {
        let chat_err: ChatError = CampusError::Config("bad".to_string()).into();
        assert!(matches!(chat_err, ChatError::Internal(_)));
    }
}
