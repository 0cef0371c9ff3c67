//! Machine translation capability.
//!
//! Translation is best-effort. [`TranslationGate`] turns every failure or
//! timeout into [`TranslationOutcome::Original`] so callers never see an
//! error from this path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use campus_core::error::{CampusError, Result};

use crate::types::AUTO_LANGUAGE;

/// A text translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Backend used when no translation service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTranslator;

#[async_trait]
impl Translator for NullTranslator {
    async fn translate(&self, _text: &str, _source: &str, _target: &str) -> Result<String> {
        Err(CampusError::Translation(
            "no translation backend configured".to_string(),
        ))
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

/// Client for a LibreTranslate-compatible `POST /translate` endpoint.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CampusError::Translation(format!("http client build: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/translate", endpoint.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let req = TranslateRequest {
            q: text,
            source,
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| CampusError::Translation(format!("POST {}: {e}", self.url)))?;

        if resp.status() != StatusCode::OK {
            let code = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".into());
            return Err(CampusError::Translation(format!(
                "translate non-200: {code}; body: {body}"
            )));
        }

        let parsed: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| CampusError::Translation(format!("parse translate json: {e}")))?;
        Ok(parsed.translated_text)
    }
}

/// Result of a best-effort translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated(String),
    /// Translation was skipped or failed; holds the source text.
    Original(String),
}

impl TranslationOutcome {
    pub fn is_translated(&self) -> bool {
        matches!(self, TranslationOutcome::Translated(_))
    }

    pub fn into_text(self) -> String {
        match self {
            TranslationOutcome::Translated(text) | TranslationOutcome::Original(text) => text,
        }
    }
}

/// Wraps a [`Translator`] with short-circuits, a deadline and the
/// fall-back-to-original policy.
#[derive(Clone)]
pub struct TranslationGate {
    translator: Arc<dyn Translator>,
    timeout: Duration,
}

impl TranslationGate {
    pub fn new(translator: Arc<dyn Translator>, timeout: Duration) -> Self {
        Self {
            translator,
            timeout,
        }
    }

    pub async fn translate(&self, text: &str, source: &str, target: &str) -> TranslationOutcome {
        if text.trim().is_empty() || source == target || target == AUTO_LANGUAGE {
            return TranslationOutcome::Original(text.to_string());
        }

        match tokio::time::timeout(self.timeout, self.translator.translate(text, source, target))
            .await
        {
            Ok(Ok(translated)) => {
                debug!(source, target, "Translated text");
                TranslationOutcome::Translated(translated)
            }
            Ok(Err(e)) => {
                warn!(source, target, "Translation failed, using original: {}", e);
                TranslationOutcome::Original(text.to_string())
            }
            Err(_) => {
                warn!(
                    source,
                    target,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Translation timed out, using original"
                );
                TranslationOutcome::Original(text.to_string())
            }
        }
    }
}
