//! Read-only glossary corpus.
//!
//! The corpus is produced offline by the ingestion job as JSON Lines, one
//! [`GlossaryTerm`] per line. It is loaded once at startup and shared behind an
//! `Arc` by every request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

/// One glossary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    /// Glossary row id; also the point id in the vector index.
    pub id: u64,
    pub term: String,
    pub description: String,
    pub book_id: i64,
    pub book_name: String,
    /// Precomputed embedding. May be omitted when vectors live only in an
    /// external index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Immutable in-memory corpus.
#[derive(Debug, Default)]
pub struct Corpus {
    terms: Vec<GlossaryTerm>,
    by_id: HashMap<u64, usize>,
}

impl Corpus {
    /// Build a corpus from terms, rejecting duplicate ids and embeddings of the
    /// wrong dimension.
    pub fn new(terms: Vec<GlossaryTerm>, embedding_dim: usize) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(terms.len());
        for (idx, term) in terms.iter().enumerate() {
            if let Some(embedding) = &term.embedding {
                if embedding.len() != embedding_dim {
                    return Err(Error::Corpus(format!(
                        "term {} has embedding dimension {}, expected {}",
                        term.id,
                        embedding.len(),
                        embedding_dim
                    )));
                }
            }
            if by_id.insert(term.id, idx).is_some() {
                return Err(Error::Corpus(format!("duplicate term id {}", term.id)));
            }
        }
        Ok(Self { terms, by_id })
    }

    /// Load a JSON Lines corpus file. Blank lines are skipped.
    pub fn load(path: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let mut terms = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let term: GlossaryTerm = serde_json::from_str(&line).map_err(|e| {
                Error::Corpus(format!("line {}: {}", line_no + 1, e))
            })?;
            terms.push(term);
        }
        Self::new(terms, embedding_dim)
    }

    pub fn get(&self, id: u64) -> Option<&GlossaryTerm> {
        self.by_id.get(&id).map(|&idx| &self.terms[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlossaryTerm> {
        self.terms.iter()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
