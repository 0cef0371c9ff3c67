//! Campus Vector crate - embedding services, the FAQ embedding index, and
//! semantic matching.
//!
//! The index is rebuilt as a whole and published atomically; the matcher
//! embeds an incoming query and ranks it against the current snapshot.

pub mod embedding;
pub mod index;
pub mod matcher;

pub use embedding::{
    DynEmbeddingService, EmbeddingService, MockEmbedding, OnnxEmbeddingService,
    TokenHashEmbedding,
};
pub use index::{EmbeddingIndex, IndexSnapshot, IndexStats, IndexedVariant};
pub use matcher::{Match, MatchOutcome, Matcher};
