//! Glossary Search
//!
//! Semantic search over a glossary of terms extracted from books, with a
//! content filter in front and a lexical fallback behind.
//!
//! - [`filter`]: query sanitization and blocked-word / spam rules
//! - [`embedding`]: embedding provider client
//! - [`search`]: vector ranking, lexical fallback and the request orchestrator
//! - [`api`]: HTTP routes

pub mod api;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod search;

pub use api::{ApiServer, AppState, HealthResponse};
pub use config::{ApiConfig, EmbeddingConfig, FilterConfig, SearchConfig, ServiceConfig, VectorBackend};
pub use corpus::{Corpus, GlossaryTerm};
pub use embedding::{EmbeddingProvider, OllamaProvider, ProviderError, ProviderHealth};
pub use error::{Error, Result};
pub use filter::{BlockedWordSet, BlocklistHandle, ContentFilter, FilterDecision, RejectReason};
pub use metrics::{MetricsConfig, MetricsService};
pub use search::{
    LexicalSearch, MemoryIndex, MemoryLexicalStore, QdrantIndex, SearchOrchestrator,
    SearchOutcome, SearchRequest, SearchResponse, SearchSettings, VectorSearchEngine,
};
