//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only surface the indexing and query
//! pipelines use to reach stored embeddings, so the SQLite backend in the
//! app crate and the [`memory::InMemoryVectorStore`] used by tests are
//! interchangeable.
//!
//! # Contract
//!
//! | Method | Behaviour |
//! |--------|-----------|
//! | [`upsert`](VectorStore::upsert) | Replace every stored chunk of each file present in the batch, then insert the batch |
//! | [`search`](VectorStore::search) | Top-k by descending cosine similarity, ties by insertion order |
//! | [`clear`](VectorStore::clear) | Drop everything, irreversibly |
//! | [`delete_source`](VectorStore::delete_source) | Drop one file's chunks |
//! | [`stats`](VectorStore::stats) | Chunk and file counts |
//!
//! Searching an empty store returns an empty list, never an error.

pub mod memory;

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentChunk, RetrievalResult, StoreStats};

/// Abstract vector storage backend.
///
/// Implementations must be `Send + Sync`; handlers share one instance
/// behind an `Arc`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add or replace chunks. Returns the number of chunks written.
    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize>;

    /// Return the `top_k` chunks nearest to `query_embedding`.
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>>;

    /// Delete all stored chunks.
    async fn clear(&self) -> Result<()>;

    /// Delete all chunks of one source file. Returns the number removed.
    async fn delete_source(&self, source_filename: &str) -> Result<u64>;

    /// Sorted list of indexed source files.
    async fn list_sources(&self) -> Result<Vec<String>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// A scored search candidate before truncation to `top_k`.
///
/// `seq` is the insertion sequence of the chunk; it breaks score ties so
/// earlier-inserted chunks (and lower chunk indices within one file) rank
/// first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub cosine: f32,
    pub seq: i64,
}

/// Rank candidates by descending cosine, then ascending insertion
/// sequence, keep the first `top_k`, and convert raw cosine into the
/// `[0, 1]` relevance score.
pub fn rank_candidates(mut candidates: Vec<ScoredChunk>, top_k: usize) -> Vec<RetrievalResult> {
    candidates.sort_by(|a, b| {
        b.cosine
            .partial_cmp(&a.cosine)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.seq.cmp(&b.seq))
    });
    candidates.truncate(top_k);
    candidates
        .into_iter()
        .map(|c| RetrievalResult {
            similarity_score: crate::embedding::relevance_score(c.cosine),
            chunk: c.chunk,
        })
        .collect()
}
