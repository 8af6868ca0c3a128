//! In-memory [`VectorStore`] implementation for tests.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Search is brute-force cosine
//! similarity over every stored vector.

use std::collections::BTreeSet;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{DocumentChunk, RetrievalResult, StoreStats};

use super::{rank_candidates, ScoredChunk, VectorStore};

struct StoredChunk {
    chunk: DocumentChunk,
    seq: i64,
}

#[derive(Default)]
struct Inner {
    chunks: Vec<StoredChunk>,
    next_seq: i64,
}

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory vector store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        let sources: BTreeSet<&str> = chunks.iter().map(|c| c.source_filename.as_str()).collect();
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner
            .chunks
            .retain(|sc| !sources.contains(sc.chunk.source_filename.as_str()));
        for c in chunks {
            // a repeated id inside one batch keeps the last copy
            inner.chunks.retain(|sc| sc.chunk.id != c.id);
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.chunks.push(StoredChunk {
                chunk: c.clone(),
                seq,
            });
        }
        Ok(chunks.len())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().map_err(poisoned)?;
        let candidates = inner
            .chunks
            .iter()
            .map(|sc| ScoredChunk {
                cosine: cosine_similarity(query_embedding, &sc.chunk.embedding),
                chunk: sc.chunk.clone(),
                seq: sc.seq,
            })
            .collect();
        Ok(rank_candidates(candidates, top_k))
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.chunks.clear();
        Ok(())
    }

    async fn delete_source(&self, source_filename: &str) -> Result<u64> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let before = inner.chunks.len();
        inner
            .chunks
            .retain(|sc| sc.chunk.source_filename != source_filename);
        Ok((before - inner.chunks.len()) as u64)
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let sources: BTreeSet<String> = inner
            .chunks
            .iter()
            .map(|sc| sc.chunk.source_filename.clone())
            .collect();
        Ok(sources.into_iter().collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.read().map_err(poisoned)?;
        let files: BTreeSet<&str> = inner
            .chunks
            .iter()
            .map(|sc| sc.chunk.source_filename.as_str())
            .collect();
        Ok(StoreStats {
            total_chunks: inner.chunks.len() as i64,
            indexed_files: files.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks_for(name: &str, vectors: &[[f32; 2]]) -> Vec<DocumentChunk> {
        vectors
            .iter()
            .enumerate()
            .map(|(i, v)| {
                DocumentChunk::new(
                    name,
                    i as i64,
                    vectors.len() as i64,
                    format!("{} chunk {}", name, i),
                    v.to_vec(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_store_search_is_empty() {
        let store = InMemoryVectorStore::new();
        let results = store.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_reupsert_same_file_replaces() {
        let store = InMemoryVectorStore::new();
        let first = chunks_for("a.txt", &[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        store.upsert(&first).await.unwrap();
        store.upsert(&first).await.unwrap();
        assert_eq!(store.stats().await.unwrap().total_chunks, 3);

        // file shrank: stale chunk 2 must disappear
        let second = chunks_for("a.txt", &[[1.0, 0.0], [0.0, 1.0]]);
        store.upsert(&second).await.unwrap();
        assert_eq!(
            store.stats().await.unwrap(),
            StoreStats {
                total_chunks: 2,
                indexed_files: 1
            }
        );
    }

    #[tokio::test]
    async fn test_search_ranks_and_breaks_ties_by_insertion() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&chunks_for("a.txt", &[[0.0, 1.0], [1.0, 0.0], [1.0, 0.0]]))
            .await
            .unwrap();
        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_index, 1);
        assert_eq!(results[1].chunk.chunk_index, 2);
        assert!((results[0].similarity_score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_delete_source_and_clear() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&chunks_for("a.txt", &[[1.0, 0.0]]))
            .await
            .unwrap();
        store
            .upsert(&chunks_for("b.txt", &[[1.0, 0.0], [0.5, 0.5]]))
            .await
            .unwrap();
        assert_eq!(store.list_sources().await.unwrap(), vec!["a.txt", "b.txt"]);
        assert_eq!(store.delete_source("b.txt").await.unwrap(), 2);
        assert_eq!(store.delete_source("missing.txt").await.unwrap(), 0);
        assert_eq!(store.stats().await.unwrap().total_chunks, 1);
        store.clear().await.unwrap();
        assert_eq!(store.stats().await.unwrap(), StoreStats::default());
    }
}
