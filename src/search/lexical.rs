//! Lexical fallback search.
//!
//! Case-insensitive substring matching over term names and descriptions, used
//! when the semantic path is unavailable. Deterministic and read-only.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;

use super::StorageError;
use crate::corpus::{Corpus, GlossaryTerm};

/// How specifically a term matched, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    ExactTerm,
    TermSubstring,
    DescriptionSubstring,
}

/// Classify a term against a lower-cased needle.
fn match_tier(term: &GlossaryTerm, needle: &str) -> Option<MatchTier> {
    let name = term.term.to_lowercase();
    if name == needle {
        Some(MatchTier::ExactTerm)
    } else if name.contains(needle) {
        Some(MatchTier::TermSubstring)
    } else if term.description.to_lowercase().contains(needle) {
        Some(MatchTier::DescriptionSubstring)
    } else {
        None
    }
}

/// Backend answering substring queries.
///
/// Implementations return every matching row with its tier; ordering and
/// truncation happen in [`LexicalSearch`].
#[async_trait]
pub trait LexicalStore: Send + Sync {
    async fn find_substring(
        &self,
        needle: &str,
        book_filter: Option<i64>,
    ) -> Result<Vec<(MatchTier, GlossaryTerm)>, StorageError>;
}

/// Substring scan over the in-memory corpus.
pub struct MemoryLexicalStore {
    corpus: Arc<Corpus>,
}

impl MemoryLexicalStore {
    pub fn new(corpus: Arc<Corpus>) -> Self {
        Self { corpus }
    }
}

#[async_trait]
impl LexicalStore for MemoryLexicalStore {
    async fn find_substring(
        &self,
        needle: &str,
        book_filter: Option<i64>,
    ) -> Result<Vec<(MatchTier, GlossaryTerm)>, StorageError> {
        Ok(self
            .corpus
            .iter()
            .filter(|t| book_filter.map_or(true, |b| b == t.book_id))
            .filter_map(|t| match_tier(t, needle).map(|tier| (tier, t.clone())))
            .collect())
    }
}

fn rank(a: &(MatchTier, GlossaryTerm), b: &(MatchTier, GlossaryTerm)) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.book_id.cmp(&b.1.book_id))
        .then_with(|| a.1.term.to_lowercase().cmp(&b.1.term.to_lowercase()))
        .then_with(|| a.1.term.cmp(&b.1.term))
        .then_with(|| a.1.id.cmp(&b.1.id))
}

/// Ranked lexical search.
#[derive(Clone)]
pub struct LexicalSearch {
    store: Arc<dyn LexicalStore>,
}

impl LexicalSearch {
    pub fn new(store: Arc<dyn LexicalStore>) -> Self {
        Self { store }
    }

    /// Terms whose name or description contains `query`, best tier first, then
    /// by `book_id` and term name. Empty when nothing matches.
    pub async fn search_text(
        &self,
        query: &str,
        book_filter: Option<i64>,
        limit: usize,
    ) -> Result<Vec<GlossaryTerm>, StorageError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut matches = self.store.find_substring(&needle, book_filter).await?;
        matches.retain(|(_, t)| book_filter.map_or(true, |b| b == t.book_id));
        matches.sort_by(rank);

        Ok(matches.into_iter().take(limit).map(|(_, t)| t).collect())
    }
}
