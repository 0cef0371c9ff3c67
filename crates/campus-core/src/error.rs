use thiserror::Error;

/// Top-level error type for the campus assistant.
///
/// Capability failures (embedding, translation, persistence) are reported
/// through this type. Most of them are recovered close to where they occur;
/// only the turn engine decides what the caller finally sees.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CampusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Language detection failed: {0}")]
    LanguageDetection(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: String, millis: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CampusError {
    fn from(err: toml::de::Error) -> Self {
        CampusError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CampusError {
    fn from(err: toml::ser::Error) -> Self {
        CampusError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CampusError {
    fn from(err: serde_json::Error) -> Self {
        CampusError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for campus assistant operations.
pub type Result<T> = std::result::Result<T, CampusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CampusError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(CampusError, &str)> = vec![
            (
                CampusError::Embedding("model not loaded".to_string()),
                "Embedding error: model not loaded",
            ),
            (
                CampusError::Translation("quota exceeded".to_string()),
                "Translation error: quota exceeded",
            ),
            (
                CampusError::LanguageDetection("no letters".to_string()),
                "Language detection failed: no letters",
            ),
            (
                CampusError::Index("dimension mismatch".to_string()),
                "Index error: dimension mismatch",
            ),
            (
                CampusError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                CampusError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_timeout_display() {
        let err = CampusError::Timeout {
            operation: "translate".to_string(),
            millis: 5000,
        };
        assert_eq!(err.to_string(), "translate timed out after 5000 ms");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CampusError = io_err.into();
        assert!(matches!(err, CampusError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let campus_err: CampusError = err.unwrap_err().into();
        assert!(matches!(campus_err, CampusError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let campus_err: CampusError = err.unwrap_err().into();
        assert!(matches!(campus_err, CampusError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
