//! SQLite-backed [`VectorStore`] implementation.
//!
//! Embeddings are stored as little-endian f32 BLOBs next to the chunk
//! text. Search is a brute-force cosine scan over every row, ranked with
//! [`rank_candidates`] so ties resolve by insertion order.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use docqa_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use docqa_core::models::{DocumentChunk, RetrievalResult, StoreStats};
use docqa_core::store::{rank_candidates, ScoredChunk, VectorStore};

use crate::{db, migrate};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `db_path` and make sure the schema exists.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        let sources: BTreeSet<&str> = chunks.iter().map(|c| c.source_filename.as_str()).collect();
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        for source in sources {
            sqlx::query("DELETE FROM chunks WHERE source_filename = ?")
                .bind(source)
                .execute(&mut *tx)
                .await?;
        }

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source_filename, chunk_index, total_chunks, text,
                                    embedding, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    total_chunks = excluded.total_chunks,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source_filename)
            .bind(chunk.chunk_index)
            .bind(chunk.total_chunks)
            .bind(&chunk.text)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(chunk.embedding.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(chunks.len())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT seq, id, source_filename, chunk_index, total_chunks, text, embedding FROM chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let embedding = blob_to_vec(&blob);
                ScoredChunk {
                    cosine: cosine_similarity(query_embedding, &embedding),
                    seq: row.get("seq"),
                    chunk: DocumentChunk {
                        id: row.get("id"),
                        source_filename: row.get("source_filename"),
                        chunk_index: row.get("chunk_index"),
                        total_chunks: row.get("total_chunks"),
                        text: row.get("text"),
                        embedding,
                    },
                }
            })
            .collect();

        Ok(rank_candidates(candidates, top_k))
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM chunks").execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_source(&self, source_filename: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE source_filename = ?")
            .bind(source_filename)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let sources: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT source_filename FROM chunks ORDER BY source_filename",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COUNT(DISTINCT source_filename) AS files FROM chunks",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreStats {
            total_chunks: row.get("total"),
            indexed_files: row.get("files"),
        })
    }
}
