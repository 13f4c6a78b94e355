//! Qdrant-backed nearest-neighbor index.
//!
//! The collection is built by the ingestion job: cosine metric, numeric point
//! ids equal to glossary ids, and an integer `book_id` payload field.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, Filter, ScoredPoint, SearchPoints, SearchPointsBuilder,
};
use qdrant_client::Qdrant;
use tracing::warn;

use super::vector::{Neighbor, NeighborIndex};
use super::StorageError;
use crate::error::{Error, Result};

/// Payload field used for the book filter.
pub const BOOK_ID_FIELD: &str = "book_id";

/// Payload filter restricting hits to one book.
fn book_filter(book_id: Option<i64>) -> Option<Filter> {
    book_id.map(|id| Filter::must([Condition::matches(BOOK_ID_FIELD, id)]))
}

fn search_request(collection: &str, vector: &[f32], book_id: Option<i64>, k: usize) -> SearchPoints {
    let mut request = SearchPointsBuilder::new(collection, vector.to_vec(), k as u64);
    if let Some(filter) = book_filter(book_id) {
        request = request.filter(filter);
    }
    request.into()
}

/// Convert a hit to a [`Neighbor`]. Points without a numeric id are skipped.
fn to_neighbor(point: ScoredPoint) -> Option<Neighbor> {
    match point.id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Num(id)) => Some(Neighbor {
            id,
            // Qdrant reports cosine similarity.
            distance: 1.0 - point.score,
        }),
        other => {
            warn!(id = ?other, "Skipping Qdrant point without a numeric id");
            None
        }
    }
}

pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    pub fn connect(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Error::Config(format!("invalid Qdrant configuration: {}", e)))?;
        Ok(Self {
            client,
            collection: collection.into(),
        })
    }
}

#[async_trait]
impl NeighborIndex for QdrantIndex {
    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        book_filter: Option<i64>,
        k: usize,
    ) -> std::result::Result<Vec<Neighbor>, StorageError> {
        let response = self
            .client
            .search_points(search_request(&self.collection, vector, book_filter, k))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(response.result.into_iter().filter_map(to_neighbor).collect())
    }

    fn name(&self) -> &'static str {
        "qdrant"
    }

    async fn is_available(&self) -> bool {
        self.client.health_check().await.is_ok()
    }
}
