//! Embedding service trait and implementations.
//!
//! - `OnnxEmbeddingService` loads a multilingual sentence-transformer ONNX
//!   export (e.g. paraphrase-multilingual-MiniLM-L12-v2) via ort and
//!   tokenizes with the HuggingFace tokenizers crate.
//! - `TokenHashEmbedding` is the offline backend: feature-hashed words and
//!   character trigrams, so lexically close questions land close together.
//! - `MockEmbedding` provides deterministic hash-based vectors for testing.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use campus_core::error::CampusError;
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::info;

/// Longest token sequence fed to the ONNX model; longer input is truncated.
const MAX_SEQUENCE_TOKENS: usize = 512;

/// Boxed future returned by [`DynEmbeddingService`].
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CampusError>> + Send + 'a>>;

/// Service for generating text embeddings.
///
/// Implementations must be deterministic: identical text always yields the
/// identical vector. Used both for index rebuilds and for incoming queries.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, CampusError>> + Send;

    /// Embed several texts, preserving input order.
    ///
    /// The default implementation embeds one text at a time; backends with
    /// real batching override it.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, CampusError>> + Send {
        async move {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }
    }

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every `EmbeddingService`
/// automatically implements `DynEmbeddingService`, which lets the matcher
/// hold an `Arc<dyn DynEmbeddingService>` without generics.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>>;

    fn embed_batch_boxed<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        Box::pin(self.embed(text))
    }

    fn embed_batch_boxed<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        Box::pin(self.embed_batch(texts))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

/// Run a batch embedding call under a deadline.
///
/// A call that outlives `deadline` is reported as [`CampusError::Timeout`].
pub async fn embed_batch_within(
    embedder: &dyn DynEmbeddingService,
    texts: &[String],
    deadline: Duration,
) -> Result<Vec<Vec<f32>>, CampusError> {
    match tokio::time::timeout(deadline, embedder.embed_batch_boxed(texts)).await {
        Ok(result) => result,
        Err(_) => Err(CampusError::Timeout {
            operation: "embed".to_string(),
            millis: deadline.as_millis() as u64,
        }),
    }
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vector.iter_mut() {
            *val /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - real ONNX Runtime inference
// ---------------------------------------------------------------------------

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimensions: usize,
}

// ort::Session is Send + Sync internally (uses Arc<SharedSessionInner>).
unsafe impl Send for OnnxModel {}
unsafe impl Sync for OnnxModel {}

/// ONNX Runtime-backed embedding service using a sentence-transformer model.
///
/// Expects a model directory containing:
/// - `model.onnx`: the sentence-transformer ONNX export
/// - `tokenizer.json`: the HuggingFace fast-tokenizer file
///
/// Inference is CPU-bound, so every call runs on the blocking thread pool and
/// the calling task suspends until the vectors come back.
#[derive(Clone)]
pub struct OnnxEmbeddingService {
    model: Arc<OnnxModel>,
}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("dimensions", &self.model.dimensions)
            .finish()
    }
}

impl OnnxEmbeddingService {
    /// Load a sentence-transformer model from the given directory.
    pub fn from_directory(model_dir: &Path) -> Result<Self, CampusError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
        )
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, CampusError> {
        if !model_path.exists() {
            return Err(CampusError::Embedding(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(CampusError::Embedding(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| CampusError::Embedding(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| CampusError::Embedding(format!("ONNX set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| CampusError::Embedding(format!("ONNX load model: {}", e)))?;

        // Output is [batch, seq_len, hidden_dim]; MiniLM variants use 384.
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|d| if d > 0 { d as usize } else { 384 })
            .unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| CampusError::Embedding(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| CampusError::Embedding(format!("Tokenizer truncation: {}", e)))?;

        info!(
            model = %model_path.display(),
            dimensions,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                tokenizer,
                dimensions,
            }),
        })
    }
}

impl OnnxModel {
    /// Tokenize, run inference, and mean-pool the output for one text.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, CampusError> {
        if text.trim().is_empty() {
            return Err(CampusError::Embedding("Cannot embed empty text".to_string()));
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| CampusError::Embedding(format!("Tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = input_ids.len();

        let as_batch = |values: Vec<i64>, name: &str| {
            ndarray::Array2::from_shape_vec((1, seq_len), values)
                .map_err(|e| CampusError::Embedding(format!("{} array: {}", name, e)))
        };
        let ids_array = as_batch(input_ids, "input_ids")?;
        let mask_array = as_batch(attention_mask.clone(), "attention_mask")?;
        let type_array = as_batch(token_type_ids, "token_type_ids")?;

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| CampusError::Embedding(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| CampusError::Embedding(format!("TensorRef attention_mask: {}", e)))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| CampusError::Embedding(format!("TensorRef token_type_ids: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| CampusError::Embedding(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| CampusError::Embedding(format!("ONNX inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| CampusError::Embedding(format!("Extract embeddings: {}", e)))?;

        let hidden_dim = match shape.iter().copied().collect::<Vec<i64>>().as_slice() {
            [_, .., last] if *last > 0 => *last as usize,
            other => {
                return Err(CampusError::Embedding(format!(
                    "Unexpected output shape: {:?}",
                    other
                )))
            }
        };

        // Masked mean pooling over the sequence dimension.
        let mut pooled = vec![0.0f32; hidden_dim];
        let mut count = 0.0f32;
        for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
            if mask_val > 0 {
                let offset = tok_idx * hidden_dim;
                for (dim, slot) in pooled.iter_mut().enumerate() {
                    *slot += data[offset + dim];
                }
                count += 1.0;
            }
        }
        if count > 0.0 {
            for val in &mut pooled {
                *val /= count;
            }
        }

        l2_normalize(&mut pooled);
        Ok(pooled)
    }
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CampusError> {
        let model = Arc::clone(&self.model);
        let text_owned = text.to_string();
        tokio::task::spawn_blocking(move || model.embed_one(&text_owned))
            .await
            .map_err(|e| CampusError::Embedding(format!("Embedding task panicked: {}", e)))?
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CampusError> {
        let model = Arc::clone(&self.model);
        let owned = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            owned
                .iter()
                .map(|text| model.embed_one(text))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| CampusError::Embedding(format!("Embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.model.dimensions
    }
}

// ---------------------------------------------------------------------------
// TokenHashEmbedding - offline lexical vectors
// ---------------------------------------------------------------------------

/// Feature-hashing embedder used when no sentence-transformer is installed.
///
/// Each lower-cased word contributes to one signed bucket and each of its
/// character trigrams to another at half weight. Works for any script because
/// it never needs a vocabulary, but it only captures lexical overlap.
#[derive(Debug, Clone)]
pub struct TokenHashEmbedding {
    dimensions: usize,
}

impl Default for TokenHashEmbedding {
    fn default() -> Self {
        Self::new(512)
    }
}

impl TokenHashEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % self.dimensions as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let words = lowered
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || c == '।' || c == '॥')
            .filter(|w| !w.is_empty());

        for word in words {
            self.add_feature(&mut vector, word, 1.0);

            let padded: Vec<char> = format!("#{}#", word).chars().collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                self.add_feature(&mut vector, &gram, 0.5);
            }
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingService for TokenHashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CampusError> {
        if text.trim().is_empty() {
            return Err(CampusError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding service that returns deterministic 384-dimensional vectors.
///
/// The output is derived from a hash of the whole input text, so identical
/// inputs always produce identical unit vectors while any two different texts
/// are nearly orthogonal.
#[derive(Debug, Clone, Default)]
pub struct MockEmbedding;

impl MockEmbedding {
    pub fn new() -> Self {
        Self
    }

    fn hash_to_vector(text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(384);
        for i in 0..384 {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }
        l2_normalize(&mut result);
        result
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CampusError> {
        if text.is_empty() {
            return Err(CampusError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(Self::hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        384
    }
}
