//! Core data models shared by the indexing and query pipelines.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::chunk_id;

/// A slice of a document's text together with its embedding.
///
/// Chunks are immutable once built. Re-indexing a file replaces every
/// chunk of that file in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    /// Stable id derived from `source_filename` and `chunk_index`.
    pub id: String,
    /// Path of the source file relative to the documents directory.
    pub source_filename: String,
    /// Position of this chunk within its file, starting at 0.
    pub chunk_index: i64,
    /// Number of chunks the file was split into.
    pub total_chunks: i64,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl DocumentChunk {
    pub fn new(
        source_filename: &str,
        chunk_index: i64,
        total_chunks: i64,
        text: String,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: chunk_id(source_filename, chunk_index),
            source_filename: source_filename.to_string(),
            chunk_index,
            total_chunks,
            text,
            embedding,
        }
    }

    /// Lowercased file extension including the dot (e.g. `".pdf"`), or empty.
    pub fn file_type(&self) -> String {
        let name = self
            .source_filename
            .rsplit('/')
            .next()
            .unwrap_or(&self.source_filename);
        match name.rfind('.') {
            Some(pos) if pos > 0 => name[pos..].to_lowercase(),
            _ => String::new(),
        }
    }

    /// Basename of the source file.
    pub fn filename(&self) -> &str {
        self.source_filename
            .rsplit('/')
            .next()
            .unwrap_or(&self.source_filename)
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a user's conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,
    /// Cosine similarity clamped to `[0, 1]`.
    pub similarity_score: f32,
}

/// A file the document processor did not index, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// Summary of one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub processed_files: BTreeSet<String>,
    pub total_chunks: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Aggregate counts reported by a vector store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_chunks: i64,
    pub indexed_files: i64,
}
