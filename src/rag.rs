//! Retrieval-augmented generation service.
//!
//! [`RagService`] ties the pipeline together:
//!
//! ```text
//! index:  processor ──▶ embeddings ──▶ vector store
//! answer: embed query ──▶ search ──▶ history ──▶ prompt ──▶ LLM ──▶ append history
//! ```
//!
//! Every collaborator sits behind a trait object, so tests run the real
//! pipeline against fakes.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docqa_core::models::{
    ConversationTurn, DocumentChunk, IndexStats, RetrievalResult, StoreStats,
};
use docqa_core::prompt::PromptBuilder;
use docqa_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::{EmbeddingClient, OpenAiEmbeddings};
use crate::error::{Error, Result};
use crate::llm::{LanguageModel, OpenAiChat};
use crate::memory::ConversationMemory;
use crate::processor::DocumentProcessor;
use crate::sqlite_store::SqliteVectorStore;

/// A generated answer and the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub results: Vec<RetrievalResult>,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

pub struct RagService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn LanguageModel>,
    memory: Arc<ConversationMemory>,
    processor: DocumentProcessor,
    top_k: usize,
    index_lock: tokio::sync::Mutex<()>,
}

impl RagService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LanguageModel>,
        memory: Arc<ConversationMemory>,
        processor: DocumentProcessor,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            memory,
            processor,
            top_k,
            index_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Build the production service: SQLite store, OpenAI clients, and the
    /// on-disk conversation memory.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = SqliteVectorStore::open(&config.paths.db_path)
            .await
            .map_err(Error::vector_store)?;
        let embedder = OpenAiEmbeddings::from_config(config)?;
        let llm = OpenAiChat::from_config(config)?;
        let memory = ConversationMemory::open(
            &config.paths.conversations_dir,
            config.memory.max_history,
        )?;
        Ok(Self::new(
            Arc::new(store),
            Arc::new(embedder),
            Arc::new(llm),
            Arc::new(memory),
            DocumentProcessor::from_config(&config.chunking),
            config.retrieval.top_k,
        ))
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn llm_model(&self) -> &str {
        self.llm.model_name()
    }

    /// Answer `query` for `user_id` from retrieved context and the user's
    /// conversation history.
    ///
    /// The exchange is appended to memory only after generation succeeds.
    pub async fn answer(&self, user_id: &str, query: &str) -> Result<Answer> {
        if user_id.trim().is_empty() {
            return Err(Error::bad_request("user_id must not be empty"));
        }
        if query.trim().is_empty() {
            return Err(Error::bad_request("query must not be empty"));
        }

        let query_vec = self.embedder.embed_query(query).await?;

        let results = self
            .store
            .search(&query_vec, self.top_k)
            .await
            .map_err(Error::vector_store)?;

        let history = self.memory.get_history(user_id);
        let messages = PromptBuilder::build_messages(query, &results, &history);
        tracing::debug!(
            user_id,
            retrieved = results.len(),
            history = history.len(),
            "generating answer"
        );

        let answer = self.llm.generate(&messages).await?;

        // Runs to completion even if the caller goes away, so the exchange
        // is never half-written.
        let memory = Arc::clone(&self.memory);
        let owner = user_id.to_string();
        let exchange = vec![
            ConversationTurn::user(query),
            ConversationTurn::assistant(answer.clone()),
        ];
        tokio::spawn(async move { memory.append(&owner, exchange).await })
            .await
            .map_err(Error::memory)??;

        tracing::info!(user_id, retrieved = results.len(), "query answered");
        Ok(Answer {
            answer,
            results,
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Index every supported file under `dir`.
    ///
    /// All chunks are embedded before anything is written, so an embedding
    /// failure leaves the store untouched. Only one run may be in flight.
    pub async fn index_directory(&self, dir: &Path) -> Result<IndexStats> {
        let _guard = self
            .index_lock
            .try_lock()
            .map_err(|_| Error::IndexInProgress)?;

        let processor = self.processor.clone();
        let root = dir.to_path_buf();
        let corpus = tokio::task::spawn_blocking(move || processor.process_directory(&root))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        if corpus.files.is_empty() {
            return Err(Error::bad_request(format!(
                "no supported documents found in {} ({} skipped)",
                dir.display(),
                corpus.skipped.len()
            )));
        }

        let texts: Vec<String> = corpus.files.values().flatten().cloned().collect();
        tracing::info!(
            files = corpus.files.len(),
            chunks = texts.len(),
            skipped = corpus.skipped.len(),
            "embedding documents"
        );
        let vectors = self.embedder.embed_texts(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let mut vectors = vectors.into_iter();
        let mut chunks = Vec::with_capacity(texts.len());
        for (filename, file_chunks) in &corpus.files {
            let total = file_chunks.len() as i64;
            for (i, text) in file_chunks.iter().enumerate() {
                let embedding = vectors.next().unwrap_or_default();
                chunks.push(DocumentChunk::new(
                    filename,
                    i as i64,
                    total,
                    text.clone(),
                    embedding,
                ));
            }
        }

        let written = self
            .store
            .upsert(&chunks)
            .await
            .map_err(Error::vector_store)?;
        tracing::info!(files = corpus.files.len(), chunks = written, "indexing complete");

        Ok(IndexStats {
            processed_files: corpus.files.keys().cloned().collect(),
            total_chunks: written,
            skipped: corpus.skipped,
        })
    }

    /// Remove one file's chunks. Returns the number removed.
    pub async fn delete_document(&self, filename: &str) -> Result<u64> {
        let removed = self
            .store
            .delete_source(filename)
            .await
            .map_err(Error::vector_store)?;
        tracing::info!(filename, removed, "document removed from index");
        Ok(removed)
    }

    pub async fn clear_index(&self) -> Result<()> {
        self.store.clear().await.map_err(Error::vector_store)?;
        tracing::info!("vector store cleared");
        Ok(())
    }

    pub async fn store_stats(&self) -> Result<StoreStats> {
        self.store.stats().await.map_err(Error::vector_store)
    }

    pub async fn indexed_files(&self) -> Result<Vec<String>> {
        self.store.list_sources().await.map_err(Error::vector_store)
    }

    pub fn history(&self, user_id: &str) -> Vec<ConversationTurn> {
        self.memory.get_history(user_id)
    }

    pub async fn clear_history(&self, user_id: &str) -> Result<()> {
        self.memory.clear(user_id).await
    }
}
