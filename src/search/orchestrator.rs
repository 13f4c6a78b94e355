//! Query orchestration.
//!
//! One request walks an explicit state machine:
//!
//! ```text
//! Filtering ──reject──▶ Rejected
//!     │ allow
//!     ▼
//! Embedding ──failure──────────────┐
//!     │ vector                     ▼
//!     ▼                      LexicalFallback ──▶ Responding
//! VectorSearch ──storage error─────▲
//!     │ results (possibly empty)
//!     ▼
//! Responding
//! ```
//!
//! Degraded mode is part of the contract: provider or index failures are
//! logged and answered from the lexical path, never surfaced to the caller.

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

use super::lexical::LexicalSearch;
use super::vector::{ScoredTerm, VectorSearchEngine};
use super::StorageError;
use crate::config::ServiceConfig;
use crate::corpus::GlossaryTerm;
use crate::embedding::{EmbeddingProvider, ProviderError};
use crate::filter::{
    BlocklistHandle, ContentFilter, FilterDecision, RejectReason, RejectionLog,
    TracingRejectionLog, GENERIC_REJECTION_MESSAGE,
};
use crate::metrics::{DEGRADED_TOTAL, REQUESTS_TOTAL};

/// Note attached to responses served by the lexical path after a failure.
pub const DEGRADED_MODE_MESSAGE: &str =
    "Semantic search is temporarily unavailable; showing keyword matches instead.";

/// Inbound search arguments, as received from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<i64>,
    pub book_id: Option<i64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_book(mut self, book_id: i64) -> Self {
        self.book_id = Some(book_id);
        self
    }
}

/// A query that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub raw: String,
    /// Case-preserved sanitized text.
    pub sanitized: String,
    /// Lower-cased sanitized text used for lexical matching.
    pub matching: String,
    pub book_filter: Option<i64>,
    pub limit: usize,
}

/// One ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub term: String,
    pub description: String,
    pub book_name: String,
    pub book_id: i64,
    /// Cosine similarity; absent for lexical matches.
    pub score: Option<f32>,
}

impl SearchResult {
    fn lexical(term: GlossaryTerm) -> Self {
        Self {
            term: term.term,
            description: term.description,
            book_name: term.book_name,
            book_id: term.book_id,
            score: None,
        }
    }

    fn vector(scored: ScoredTerm) -> Self {
        Self {
            score: Some(scored.score),
            ..Self::lexical(scored.term)
        }
    }
}

/// Successful response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_found: usize,
    pub query: String,
    pub message: Option<String>,
}

/// Which backend produced the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPath {
    Vector,
    Lexical,
}

impl SearchPath {
    fn as_str(&self) -> &'static str {
        match self {
            SearchPath::Vector => "vector",
            SearchPath::Lexical => "lexical",
        }
    }
}

/// Why a request was refused before any search work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Malformed query or limit; the message is safe to show.
    Validation(String),
    /// Blocked by the content filter; only the generic message is shown.
    Content,
}

impl Rejection {
    pub fn message(&self) -> &str {
        match self {
            Rejection::Validation(message) => message,
            Rejection::Content => GENERIC_REJECTION_MESSAGE,
        }
    }
}

/// Server-side failure with no usable fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    StorageUnavailable,
}

/// Result of one search request.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Success {
        response: SearchResponse,
        path: SearchPath,
    },
    Rejected(Rejection),
    ServerFailure(FailureKind),
}

/// Orchestrator states, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Filtering,
    Embedding,
    VectorSearch,
    LexicalFallback,
    Responding,
    Rejected,
}

/// What sent a request to the lexical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FallbackCause {
    /// Keyword search was requested directly.
    Requested,
    Provider(&'static str),
    VectorStorage,
}

enum Step {
    Filtering,
    Embedding(SearchQuery),
    VectorSearch(SearchQuery, Arc<Vec<f32>>),
    LexicalFallback(SearchQuery, FallbackCause),
    Responding(SearchQuery, Vec<SearchResult>, SearchPath, Option<String>),
    Rejected(Rejection),
}

impl Step {
    fn state(&self) -> SearchState {
        match self {
            Step::Filtering => SearchState::Filtering,
            Step::Embedding(_) => SearchState::Embedding,
            Step::VectorSearch(..) => SearchState::VectorSearch,
            Step::LexicalFallback(..) => SearchState::LexicalFallback,
            Step::Responding(..) => SearchState::Responding,
            Step::Rejected(_) => SearchState::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Semantic,
    Keyword,
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    pub embedding_dim: usize,
    pub provider_timeout: Duration,
    pub cache_capacity: u64,
}

impl SearchSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            default_limit: config.search.default_limit,
            max_limit: config.search.max_limit,
            embedding_dim: config.search.embedding_dim,
            provider_timeout: config.embedding.timeout(),
            cache_capacity: config.embedding.cache_capacity,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

/// Composes filter, provider, vector engine and lexical search.
pub struct SearchOrchestrator {
    filter: ContentFilter,
    blocklist: BlocklistHandle,
    rejection_log: Arc<dyn RejectionLog>,
    provider: Arc<dyn EmbeddingProvider>,
    vector: VectorSearchEngine,
    lexical: LexicalSearch,
    cache: Option<Cache<String, Arc<Vec<f32>>>>,
    settings: SearchSettings,
}

impl SearchOrchestrator {
    pub fn new(
        filter: ContentFilter,
        blocklist: BlocklistHandle,
        provider: Arc<dyn EmbeddingProvider>,
        vector: VectorSearchEngine,
        lexical: LexicalSearch,
        settings: SearchSettings,
    ) -> Self {
        let cache = (settings.cache_capacity > 0).then(|| Cache::new(settings.cache_capacity));
        Self {
            filter,
            blocklist,
            rejection_log: Arc::new(TracingRejectionLog),
            provider,
            vector,
            lexical,
            cache,
            settings,
        }
    }

    /// Replace the rejection sink.
    pub fn with_rejection_log(mut self, log: Arc<dyn RejectionLog>) -> Self {
        self.rejection_log = log;
        self
    }

    pub fn blocklist(&self) -> &BlocklistHandle {
        &self.blocklist
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn vector(&self) -> &VectorSearchEngine {
        &self.vector
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Semantic search with lexical fallback.
    pub async fn search(&self, request: SearchRequest) -> SearchOutcome {
        self.run(request, Mode::Semantic).await
    }

    /// Lexical search only. Same filtering, never calls the provider.
    pub async fn keyword_search(&self, request: SearchRequest) -> SearchOutcome {
        self.run(request, Mode::Keyword).await
    }

    async fn run(&self, request: SearchRequest, mode: Mode) -> SearchOutcome {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("glossary_search", %request_id, mode = ?mode);
        self.drive(request, mode, &request_id).instrument(span).await
    }

    async fn drive(&self, request: SearchRequest, mode: Mode, request_id: &str) -> SearchOutcome {
        let mut step = Step::Filtering;
        loop {
            debug!(state = ?step.state(), "search state");
            step = match step {
                Step::Filtering => self.filtering(&request, mode, request_id),
                Step::Embedding(query) => self.embedding(query).await,
                Step::VectorSearch(query, vector) => self.vector_search(query, &vector).await,
                Step::LexicalFallback(query, cause) => {
                    match self.lexical_fallback(query, cause).await {
                        Ok(next) => next,
                        Err(e) => {
                            warn!(error = %e, "Lexical search failed");
                            metrics::counter!(REQUESTS_TOTAL, "path" => "failed")
                                .increment(1);
                            return SearchOutcome::ServerFailure(FailureKind::StorageUnavailable);
                        }
                    }
                }
                Step::Responding(query, results, path, message) => {
                    metrics::counter!(REQUESTS_TOTAL, "path" => path.as_str())
                        .increment(1);
                    info!(path = path.as_str(), results = results.len(), "search complete");
                    return SearchOutcome::Success {
                        response: SearchResponse {
                            total_found: results.len(),
                            results,
                            query: query.sanitized,
                            message,
                        },
                        path,
                    };
                }
                Step::Rejected(rejection) => {
                    metrics::counter!(REQUESTS_TOTAL, "path" => "rejected")
                        .increment(1);
                    return SearchOutcome::Rejected(rejection);
                }
            };
        }
    }

    fn filtering(&self, request: &SearchRequest, mode: Mode, request_id: &str) -> Step {
        let max_limit = self.settings.max_limit;
        let limit = match request.limit {
            None => self.settings.default_limit,
            Some(l) if l >= 1 && l <= max_limit as i64 => l as usize,
            Some(_) => {
                return Step::Rejected(Rejection::Validation(format!(
                    "limit must be between 1 and {}",
                    max_limit
                )));
            }
        };

        let blocked = self.blocklist.snapshot();
        let (normalized, decision) = self.filter.check(&request.query, &blocked);

        match decision {
            FilterDecision::Allow => {
                let query = SearchQuery {
                    raw: request.query.clone(),
                    sanitized: normalized.display,
                    matching: normalized.matching,
                    book_filter: request.book_id,
                    limit,
                };
                match mode {
                    Mode::Semantic => Step::Embedding(query),
                    Mode::Keyword => Step::LexicalFallback(query, FallbackCause::Requested),
                }
            }
            FilterDecision::Reject(reason) => {
                self.rejection_log.record(reason, request_id);
                let config = self.filter.config();
                Step::Rejected(match reason {
                    RejectReason::InvalidLength => Rejection::Validation(format!(
                        "Query must be between {} and {} characters",
                        config.min_length, config.max_length
                    )),
                    RejectReason::BlockedWord | RejectReason::SpamPattern => Rejection::Content,
                })
            }
        }
    }

    async fn embedding(&self, query: SearchQuery) -> Step {
        match self.embed(&query.sanitized).await {
            Ok(vector) => Step::VectorSearch(query, vector),
            Err(e) => {
                warn!(cause = e.kind(), error = %e, "Embedding failed, using lexical fallback");
                Step::LexicalFallback(query, FallbackCause::Provider(e.kind()))
            }
        }
    }

    /// One provider call under the hard timeout, memoised on success.
    ///
    /// The cache is keyed on the exact text sent to the provider, so a hit
    /// always returns what a fresh call for the same request would.
    async fn embed(&self, text: &str) -> Result<Arc<Vec<f32>>, ProviderError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(text).await {
                debug!("embedding cache hit");
                return Ok(hit);
            }
        }

        let timeout = self.settings.provider_timeout;
        let vector = tokio::time::timeout(timeout, self.provider.embed(text))
            .await
            .map_err(|_| ProviderError::Timeout(timeout.as_millis() as u64))??;

        if vector.len() != self.settings.embedding_dim {
            return Err(ProviderError::Error(format!(
                "expected {} dimensions, got {}",
                self.settings.embedding_dim,
                vector.len()
            )));
        }

        let vector = Arc::new(vector);
        if let Some(cache) = &self.cache {
            cache.insert(text.to_string(), vector.clone()).await;
        }
        Ok(vector)
    }

    async fn vector_search(&self, query: SearchQuery, vector: &[f32]) -> Step {
        match self
            .vector
            .search(vector, query.book_filter, query.limit)
            .await
        {
            Ok(scored) => {
                let results = scored.into_iter().map(SearchResult::vector).collect();
                Step::Responding(query, results, SearchPath::Vector, None)
            }
            Err(e) => {
                warn!(
                    index = self.vector.index_name(),
                    error = %e,
                    "Vector search failed, using lexical fallback"
                );
                Step::LexicalFallback(query, FallbackCause::VectorStorage)
            }
        }
    }

    async fn lexical_fallback(
        &self,
        query: SearchQuery,
        cause: FallbackCause,
    ) -> Result<Step, StorageError> {
        let terms = self
            .lexical
            .search_text(&query.matching, query.book_filter, query.limit)
            .await?;
        let results = terms.into_iter().map(SearchResult::lexical).collect();

        let message = match cause {
            FallbackCause::Requested => None,
            FallbackCause::Provider(kind) => {
                metrics::counter!(DEGRADED_TOTAL, "cause" => kind).increment(1);
                Some(DEGRADED_MODE_MESSAGE.to_string())
            }
            FallbackCause::VectorStorage => {
                metrics::counter!(DEGRADED_TOTAL, "cause" => "vector_storage")
                    .increment(1);
                Some(DEGRADED_MODE_MESSAGE.to_string())
            }
        };

        Ok(Step::Responding(query, results, SearchPath::Lexical, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::embedding::ProviderMetadata;
    use crate::filter::BlockedWordSet;
    use crate::search::lexical::{LexicalStore, MatchTier, MemoryLexicalStore};
    use crate::search::vector::{MemoryIndex, Neighbor, NeighborIndex};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 8;

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[i] = 1.0;
        v
    }

    fn blend(i: usize, j: usize, wi: f32) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[i] = wi;
        v[j] = 1.0 - wi;
        v
    }

    fn term(id: u64, name: &str, description: &str, book_id: i64, embedding: Vec<f32>) -> GlossaryTerm {
        GlossaryTerm {
            id,
            term: name.to_string(),
            description: description.to_string(),
            book_id,
            book_name: format!("Book {book_id}"),
            embedding: Some(embedding),
        }
    }

    fn corpus() -> Arc<Corpus> {
        Arc::new(
            Corpus::new(
                vec![
                    term(1, "guru", "spiritual teacher and master", 41, axis(0)),
                    term(2, "acarya", "one who teaches by example", 41, blend(0, 1, 0.8)),
                    term(3, "kirtana", "devotional singing of the holy names", 41, axis(2)),
                    term(4, "bhajana", "devotional singing and worship", 7, blend(2, 3, 0.7)),
                    term(5, "prema", "pure love for Krsna", 41, axis(4)),
                    term(6, "sneha", "affectionate love", 7, blend(4, 5, 0.6)),
                ],
                DIM,
            )
            .unwrap(),
        )
    }

    #[derive(Default)]
    struct MockProvider {
        vectors: HashMap<String, Vec<f32>>,
        fail: Option<ProviderError>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmbeddingProvider for MockProvider {
        fn metadata(&self) -> ProviderMetadata {
            ProviderMetadata {
                name: "mock".to_string(),
                model: "mock".to_string(),
                dimension: DIM,
            }
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(text.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = &self.fail {
                return Err(err.clone());
            }
            Ok(self
                .vectors
                .get(&text.to_lowercase())
                .cloned()
                .unwrap_or_else(|| axis(7)))
        }
    }

    struct DownIndex;

    #[async_trait]
    impl NeighborIndex for DownIndex {
        async fn nearest_neighbors(
            &self,
            _vector: &[f32],
            _book_filter: Option<i64>,
            _k: usize,
        ) -> Result<Vec<Neighbor>, StorageError> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }

        fn name(&self) -> &'static str {
            "down"
        }
    }

    struct DownStore;

    #[async_trait]
    impl LexicalStore for DownStore {
        async fn find_substring(
            &self,
            _needle: &str,
            _book_filter: Option<i64>,
        ) -> Result<Vec<(MatchTier, GlossaryTerm)>, StorageError> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingLog {
        reasons: Mutex<Vec<RejectReason>>,
    }

    impl RejectionLog for RecordingLog {
        fn record(&self, reason: RejectReason, _request_id: &str) {
            self.reasons.lock().push(reason);
        }
    }

    fn settings() -> SearchSettings {
        SearchSettings {
            default_limit: 5,
            max_limit: 20,
            embedding_dim: DIM,
            provider_timeout: Duration::from_millis(100),
            cache_capacity: 0,
        }
    }

    fn working_provider() -> MockProvider {
        let mut vectors = HashMap::new();
        vectors.insert("spiritual teacher".to_string(), blend(0, 1, 0.9));
        vectors.insert("love".to_string(), axis(4));
        MockProvider {
            vectors,
            ..Default::default()
        }
    }

    fn build(
        provider: Arc<MockProvider>,
        index: Arc<dyn NeighborIndex>,
        store: Arc<dyn LexicalStore>,
        settings: SearchSettings,
    ) -> SearchOrchestrator {
        SearchOrchestrator::new(
            ContentFilter::default(),
            BlocklistHandle::new(BlockedWordSet::fallback()),
            provider,
            VectorSearchEngine::new(index, corpus(), DIM),
            LexicalSearch::new(store),
            settings,
        )
    }

    fn orchestrator(provider: Arc<MockProvider>) -> SearchOrchestrator {
        let corpus = corpus();
        build(
            provider,
            Arc::new(MemoryIndex::from_corpus(&corpus)),
            Arc::new(MemoryLexicalStore::new(corpus)),
            settings(),
        )
    }

    fn success(outcome: SearchOutcome) -> (SearchResponse, SearchPath) {
        match outcome {
            SearchOutcome::Success { response, path } => (response, path),
            other => panic!("expected success, got {other:?}"),
        }
    }

    // ================================================================
    // Vector path
    // ================================================================

    #[tokio::test]
    async fn test_spiritual_teacher_ranks_guru_first() {
        let orchestrator = orchestrator(Arc::new(working_provider()));
        let (response, path) =
            success(orchestrator.search(SearchRequest::new("spiritual teacher").with_limit(5)).await);

        assert_eq!(path, SearchPath::Vector);
        assert_eq!(response.results[0].term, "guru");
        assert!(response.results.iter().all(|r| r.score.is_some()));
        assert!(response.message.is_none());
        assert_eq!(response.total_found, response.results.len());
        assert!(response.results.len() <= 5);
    }

    #[tokio::test]
    async fn test_book_filter_restricts_vector_results() {
        let orchestrator = orchestrator(Arc::new(working_provider()));
        let (response, _) = success(
            orchestrator
                .search(SearchRequest::new("love").with_limit(10).with_book(41))
                .await,
        );

        assert!(!response.results.is_empty());
        assert!(response.results.len() <= 10);
        assert!(response.results.iter().all(|r| r.book_id == 41));
    }

    #[tokio::test]
    async fn test_query_echoes_sanitized_text() {
        let orchestrator = orchestrator(Arc::new(working_provider()));
        let (response, _) = success(orchestrator.search(SearchRequest::new("  Spiritual   Teacher ")).await);
        assert_eq!(response.query, "Spiritual Teacher");
        assert_eq!(response.results[0].term, "guru");
    }

    #[tokio::test]
    async fn test_identical_requests_give_identical_results() {
        let orchestrator = orchestrator(Arc::new(working_provider()));
        let first = orchestrator.search(SearchRequest::new("love").with_limit(3)).await;
        let second = orchestrator.search(SearchRequest::new("love").with_limit(3)).await;
        assert_eq!(first, second);
    }

    // ================================================================
    // Rejections
    // ================================================================

    #[tokio::test]
    async fn test_spam_is_rejected_without_calling_provider() {
        let provider = Arc::new(working_provider());
        let log = Arc::new(RecordingLog::default());
        let orchestrator = orchestrator(provider.clone()).with_rejection_log(log.clone());

        let outcome = orchestrator.search(SearchRequest::new("aaaaaaaaaa!!!").with_limit(5)).await;
        assert_eq!(outcome, SearchOutcome::Rejected(Rejection::Content));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*log.reasons.lock(), vec![RejectReason::SpamPattern]);
    }

    #[tokio::test]
    async fn test_short_query_is_validation_error() {
        let provider = Arc::new(working_provider());
        let orchestrator = orchestrator(provider.clone());

        match orchestrator.search(SearchRequest::new("x").with_limit(5)).await {
            SearchOutcome::Rejected(Rejection::Validation(message)) => {
                assert!(message.contains("between 2 and 200"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_long_query_is_validation_error() {
        let provider = Arc::new(working_provider());
        let orchestrator = orchestrator(provider.clone());

        // 201 characters after sanitizing.
        let query = format!("{}gurus", "bhakti ".repeat(28));
        assert_eq!(query.chars().count(), 201);

        match orchestrator.search(SearchRequest::new(query).with_limit(5)).await {
            SearchOutcome::Rejected(Rejection::Validation(message)) => {
                assert!(message.contains("between 2 and 200"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let keyword = orchestrator
            .keyword_search(SearchRequest::new("guru ".repeat(41)))
            .await;
        assert!(matches!(keyword, SearchOutcome::Rejected(Rejection::Validation(_))));
    }

    #[tokio::test]
    async fn test_content_rejections_share_one_message() {
        let orchestrator = orchestrator(Arc::new(working_provider()));
        let blocked = orchestrator.search(SearchRequest::new("why (KILL)?")).await;
        let spam = orchestrator.search(SearchRequest::new("!!!??? om")).await;

        let message = |o: &SearchOutcome| match o {
            SearchOutcome::Rejected(r) => r.message().to_string(),
            other => panic!("expected rejection, got {other:?}"),
        };
        assert_eq!(message(&blocked), GENERIC_REJECTION_MESSAGE);
        assert_eq!(message(&blocked), message(&spam));
    }

    #[tokio::test]
    async fn test_limit_out_of_range_is_validation_error() {
        let orchestrator = orchestrator(Arc::new(working_provider()));
        for limit in [0, 21, -3] {
            let outcome = orchestrator.search(SearchRequest::new("love").with_limit(limit)).await;
            assert!(
                matches!(outcome, SearchOutcome::Rejected(Rejection::Validation(_))),
                "limit {limit}"
            );
        }
    }

    #[tokio::test]
    async fn test_blocklist_swap_applies_to_next_request() {
        let orchestrator = orchestrator(Arc::new(working_provider()));
        assert!(matches!(
            orchestrator.search(SearchRequest::new("love")).await,
            SearchOutcome::Success { .. }
        ));

        orchestrator.blocklist().swap(BlockedWordSet::new(["love"]));
        assert_eq!(
            orchestrator.search(SearchRequest::new("love")).await,
            SearchOutcome::Rejected(Rejection::Content)
        );
    }

    // ================================================================
    // Degraded mode
    // ================================================================

    #[tokio::test]
    async fn test_provider_down_falls_back_to_lexical() {
        let provider = Arc::new(MockProvider {
            fail: Some(ProviderError::Unavailable("connection refused".to_string())),
            ..Default::default()
        });
        let orchestrator = orchestrator(provider.clone());

        let (response, path) =
            success(orchestrator.search(SearchRequest::new("devotional singing").with_limit(5)).await);
        assert_eq!(path, SearchPath::Lexical);
        let names: Vec<&str> = response.results.iter().map(|r| r.term.as_str()).collect();
        assert_eq!(names, vec!["bhajana", "kirtana"]);
        assert!(response.results.iter().all(|r| r.score.is_none()));
        assert_eq!(response.message.as_deref(), Some(DEGRADED_MODE_MESSAGE));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_into_fallback() {
        let provider = Arc::new(MockProvider {
            delay: Some(Duration::from_secs(5)),
            ..working_provider()
        });
        let orchestrator = orchestrator(provider);

        let started = std::time::Instant::now();
        let (response, path) = success(orchestrator.search(SearchRequest::new("guru")).await);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(path, SearchPath::Lexical);
        assert_eq!(response.results[0].term, "guru");
        assert!(response.message.is_some());
    }

    #[tokio::test]
    async fn test_wrong_dimension_from_provider_falls_back() {
        let mut vectors = HashMap::new();
        vectors.insert("prema".to_string(), vec![1.0; DIM + 1]);
        let orchestrator = orchestrator(Arc::new(MockProvider {
            vectors,
            ..Default::default()
        }));

        let (_, path) = success(orchestrator.search(SearchRequest::new("prema")).await);
        assert_eq!(path, SearchPath::Lexical);
    }

    #[tokio::test]
    async fn test_vector_backend_failure_falls_back() {
        let corpus = corpus();
        let orchestrator = build(
            Arc::new(working_provider()),
            Arc::new(DownIndex),
            Arc::new(MemoryLexicalStore::new(corpus)),
            settings(),
        );

        let (response, path) = success(orchestrator.search(SearchRequest::new("love")).await);
        assert_eq!(path, SearchPath::Lexical);
        assert_eq!(response.message.as_deref(), Some(DEGRADED_MODE_MESSAGE));
        let names: Vec<&str> = response.results.iter().map(|r| r.term.as_str()).collect();
        assert_eq!(names, vec!["sneha", "prema"]);
    }

    #[tokio::test]
    async fn test_both_backends_down_is_server_failure() {
        let orchestrator = build(
            Arc::new(working_provider()),
            Arc::new(DownIndex),
            Arc::new(DownStore),
            settings(),
        );

        assert_eq!(
            orchestrator.search(SearchRequest::new("love")).await,
            SearchOutcome::ServerFailure(FailureKind::StorageUnavailable)
        );
    }

    // ================================================================
    // Keyword search and caching
    // ================================================================

    #[tokio::test]
    async fn test_keyword_search_skips_provider() {
        let provider = Arc::new(working_provider());
        let orchestrator = orchestrator(provider.clone());

        let (response, path) = success(
            orchestrator
                .keyword_search(SearchRequest::new("guru").with_limit(3))
                .await,
        );
        assert_eq!(path, SearchPath::Lexical);
        assert!(response.message.is_none());
        assert_eq!(response.results[0].term, "guru");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_avoids_repeat_provider_calls() {
        let provider = Arc::new(working_provider());
        let corpus = corpus();
        let orchestrator = build(
            provider.clone(),
            Arc::new(MemoryIndex::from_corpus(&corpus)),
            Arc::new(MemoryLexicalStore::new(corpus)),
            SearchSettings {
                cache_capacity: 16,
                ..settings()
            },
        );

        let first = orchestrator.search(SearchRequest::new("love")).await;
        let second = orchestrator.search(SearchRequest::new(" love ")).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let ids = |o: SearchOutcome| success(o).0.results;
        assert_eq!(ids(first), ids(second));

        // Different casing is a different provider input.
        orchestrator.search(SearchRequest::new("Love")).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_provider_receives_case_preserved_text() {
        let provider = Arc::new(working_provider());
        let orchestrator = orchestrator(provider.clone());

        orchestrator
            .search(SearchRequest::new("  Śrī   Kṛṣṇa Caitanya "))
            .await;
        assert_eq!(*provider.seen.lock(), vec!["Śrī Kṛṣṇa Caitanya".to_string()]);
    }
}
