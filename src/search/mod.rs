//! Glossary search.
//!
//! Provides ranked glossary lookups using:
//! - an external embedding provider for query vectors
//! - a nearest-neighbor index (in-memory scan or Qdrant) for similarity ranking
//! - a lexical substring search used whenever the semantic path fails
//!
//! # Architecture
//!
//! ```text
//!   raw query
//!       │
//!       ▼
//! ┌───────────────┐  reject   ┌──────────┐
//! │ ContentFilter │──────────▶│ Rejected │
//! └───────┬───────┘           └──────────┘
//!         │ allow
//!         ▼
//! ┌───────────────────┐  failure / timeout
//! │ EmbeddingProvider │───────────────────────┐
//! └───────┬───────────┘                       │
//!         │ [f32; 1024]                       │
//!         ▼                                   ▼
//! ┌────────────────────┐  storage error  ┌───────────────┐
//! │ VectorSearchEngine │────────────────▶│ LexicalSearch │
//! └───────┬────────────┘                 └───────┬───────┘
//!         │ score = cosine similarity            │ score = none
//!         └──────────────┬───────────────────────┘
//!                        ▼
//!                 ┌────────────┐
//!                 │ Responding │
//!                 └────────────┘
//! ```

mod lexical;
mod orchestrator;
mod qdrant;
mod vector;

pub use lexical::{LexicalSearch, LexicalStore, MatchTier, MemoryLexicalStore};
pub use orchestrator::{
    FailureKind, Rejection, SearchOrchestrator, SearchOutcome, SearchPath, SearchQuery,
    SearchRequest, SearchResponse, SearchResult, SearchSettings, SearchState,
    DEGRADED_MODE_MESSAGE,
};
pub use qdrant::QdrantIndex;
pub use vector::{l2_normalize, MemoryIndex, Neighbor, NeighborIndex, ScoredTerm, VectorSearchEngine};

use thiserror::Error;

/// Vector or lexical backend failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The backend could not be reached.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed the query.
    #[error("storage query failed: {0}")]
    Query(String),
}
