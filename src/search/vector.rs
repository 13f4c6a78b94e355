//! Vector similarity search over the glossary corpus.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;

use super::StorageError;
use crate::corpus::{Corpus, GlossaryTerm};

/// One candidate returned by a nearest-neighbor index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Glossary term id.
    pub id: u64,
    /// Cosine distance (`1 - cosine similarity`).
    pub distance: f32,
}

/// A ranked vector match.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTerm {
    pub term: GlossaryTerm,
    /// Cosine similarity.
    pub score: f32,
}

/// Narrow interface to a precomputed nearest-neighbor index.
///
/// The index is maintained elsewhere; this crate only queries it.
#[async_trait]
pub trait NeighborIndex: Send + Sync {
    /// Up to `k` nearest neighbors of a unit-length `vector`, restricted to
    /// `book_filter` when given.
    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        book_filter: Option<i64>,
        k: usize,
    ) -> Result<Vec<Neighbor>, StorageError>;

    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Whether the backing store answers at all.
    async fn is_available(&self) -> bool {
        true
    }
}

/// L2-normalize in place. Returns `false` for a zero (or non-finite) vector.
pub fn l2_normalize(vec: &mut [f32]) -> bool {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return false;
    }
    for x in vec.iter_mut() {
        *x /= norm;
    }
    true
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Extra neighbors requested per result, so ids the corpus no longer knows
/// do not shrink the result set.
const OVERFETCH_FACTOR: usize = 2;

/// Order by ascending distance, then ascending id.
fn by_distance_then_id(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.id.cmp(&b.id))
}

/// Exact cosine scan over corpus embeddings.
///
/// Embeddings are normalized once at construction, so each query costs one
/// dot product per term.
pub struct MemoryIndex {
    entries: Vec<(u64, i64, Vec<f32>)>,
}

impl MemoryIndex {
    /// Build from every corpus term that carries an embedding. Zero vectors are
    /// skipped.
    pub fn from_corpus(corpus: &Corpus) -> Self {
        let entries = corpus
            .iter()
            .filter_map(|term| {
                let mut embedding = term.embedding.clone()?;
                l2_normalize(&mut embedding).then_some((term.id, term.book_id, embedding))
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl NeighborIndex for MemoryIndex {
    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        book_filter: Option<i64>,
        k: usize,
    ) -> Result<Vec<Neighbor>, StorageError> {
        let mut neighbors: Vec<Neighbor> = self
            .entries
            .iter()
            .filter(|(_, book_id, _)| book_filter.map_or(true, |b| b == *book_id))
            .map(|(id, _, embedding)| Neighbor {
                id: *id,
                distance: 1.0 - dot(vector, embedding),
            })
            .collect();
        neighbors.sort_by(by_distance_then_id);
        neighbors.truncate(k);
        Ok(neighbors)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Ranks corpus terms by cosine similarity to a query vector.
#[derive(Clone)]
pub struct VectorSearchEngine {
    index: Arc<dyn NeighborIndex>,
    corpus: Arc<Corpus>,
    dimension: usize,
}

impl VectorSearchEngine {
    pub fn new(index: Arc<dyn NeighborIndex>, corpus: Arc<Corpus>, dimension: usize) -> Self {
        Self {
            index,
            corpus,
            dimension,
        }
    }

    pub fn index_name(&self) -> &'static str {
        self.index.name()
    }

    pub async fn is_available(&self) -> bool {
        self.index.is_available().await
    }

    /// Top `limit` terms by descending similarity, ties by ascending id.
    pub async fn search(
        &self,
        vector: &[f32],
        book_filter: Option<i64>,
        limit: usize,
    ) -> Result<Vec<ScoredTerm>, StorageError> {
        if vector.len() != self.dimension {
            return Err(StorageError::Query(format!(
                "query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut query = vector.to_vec();
        if !l2_normalize(&mut query) {
            return Err(StorageError::Query(
                "query vector has zero length".to_string(),
            ));
        }

        let mut neighbors = self
            .index
            .nearest_neighbors(&query, book_filter, limit.saturating_mul(OVERFETCH_FACTOR))
            .await?;
        // Approximate indexes do not promise a stable order for equal
        // distances; re-sort so results are reproducible.
        neighbors.sort_by(by_distance_then_id);

        let results = neighbors
            .into_iter()
            .filter_map(|n| {
                let term = self.corpus.get(n.id)?;
                if book_filter.is_some_and(|b| b != term.book_id) {
                    return None;
                }
                Some(ScoredTerm {
                    term: term.clone(),
                    score: 1.0 - n.distance,
                })
            })
            .take(limit)
            .collect();

        Ok(results)
    }
}
