//! Embedding client abstraction and the OpenAI implementation.
//!
//! [`EmbeddingClient`] turns texts into vectors, one per input and in
//! input order. The pipelines only ever see the trait, so tests can swap
//! in a deterministic fake.
//!
//! [`OpenAiEmbeddings`] batches inputs into requests of at most
//! `embedding.batch_size` texts, normalises whitespace, reorders the
//! response by its `index` field, and checks that every input got a
//! vector back. Transport retries live in [`crate::openai`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::openai::OpenAiHttp;

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a list of texts. The result has one vector per input, in order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("provider returned no vector for the query"))
    }
}

pub struct OpenAiEmbeddings {
    http: OpenAiHttp,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbeddings {
    pub fn new(http: OpenAiHttp, model: impl Into<String>, batch_size: usize) -> Self {
        Self {
            http,
            model: model.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// Build from configuration, reading the API key from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = OpenAiHttp::new(
            config.api_base.as_str(),
            OpenAiHttp::api_key_from_env()?,
            Duration::from_secs(config.embedding.timeout_secs),
            config.embedding.max_retries,
        )?;
        Ok(Self::new(
            http,
            config.embedding.model.clone(),
            config.embedding.batch_size,
        ))
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let input: Vec<String> = batch.iter().map(|t| clean_input(t)).collect();
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });
        let json = self
            .http
            .post_json("embeddings", &body)
            .await
            .map_err(Error::embedding)?;
        parse_embeddings_response(json, batch.len())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!(batch = i, size = batch.len(), model = %self.model, "embedding batch");
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}

/// Newlines degrade embedding quality for some models; collapse them.
fn clean_input(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Parse an embeddings response and return vectors ordered by `index`.
fn parse_embeddings_response(json: serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut response: EmbeddingsResponse = serde_json::from_value(json)
        .map_err(|e| Error::embedding(format!("invalid embeddings response: {}", e)))?;

    if response.data.len() != expected {
        return Err(Error::embedding(format!(
            "provider returned {} vectors for {} inputs",
            response.data.len(),
            expected
        )));
    }

    response.data.sort_by_key(|item| item.index);
    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}
