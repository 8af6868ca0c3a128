//! Configuration parsing and validation.
//!
//! Settings come from an optional TOML file (default `./config/docqa.toml`)
//! and are then overridden by environment variables. Everything is read
//! once at process start.
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [paths]
//! documents_dir = "./data/documents"
//! db_path = "./storage/vectors.sqlite"
//! conversations_dir = "./storage/conversations"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [embedding]
//! model = "text-embedding-3-small"
//! batch_size = 64
//!
//! [llm]
//! model = "gpt-4-turbo-preview"
//! temperature = 0.7
//! max_tokens = 1000
//!
//! [memory]
//! max_history = 10
//!
//! [retrieval]
//! top_k = 5
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./config/docqa.toml";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub retrieval: RetrievalConfig,
    /// Base URL of the OpenAI-compatible API.
    pub api_base: ApiBase,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub documents_dir: PathBuf,
    pub db_path: PathBuf,
    pub conversations_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./data/documents"),
            db_path: PathBuf::from("./storage/vectors.sqlite"),
            conversations_dir: PathBuf::from("./storage/conversations"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters repeated between adjacent chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            max_retries: 3,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum turns kept per user.
    pub max_history: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_history: 10 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(transparent)]
pub struct ApiBase(pub String);

impl Default for ApiBase {
    fn default() -> Self {
        Self("https://api.openai.com/v1".to_string())
    }
}

impl ApiBase {
    pub fn as_str(&self) -> &str {
        self.0.trim_end_matches('/')
    }
}

/// Load configuration from `path`, apply environment overrides, and validate.
///
/// A missing file is not an error: defaults apply.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DOCQA_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("DOCUMENTS_DIR") {
            self.paths.documents_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VECTOR_DB_PATH") {
            self.paths.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MEMORY_PATH") {
            self.paths.conversations_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_env("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_env("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = lookup("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("TEMPERATURE") {
            self.llm.temperature = parse_env("TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("MAX_TOKENS") {
            self.llm.max_tokens = parse_env("MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("MAX_CONVERSATION_HISTORY") {
            self.memory.max_history = parse_env("MAX_CONVERSATION_HISTORY", &v)?;
        }
        if let Some(v) = lookup("TOP_K") {
            self.retrieval.top_k = parse_env("TOP_K", &v)?;
        }
        if let Some(v) = lookup("OPENAI_BASE_URL") {
            self.api_base = ApiBase(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must be < chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.memory.max_history < 1 {
            anyhow::bail!("memory.max_history must be >= 1");
        }
        if self.retrieval.top_k < 1 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
        }
        if self.embedding.batch_size < 1 {
            anyhow::bail!("embedding.batch_size must be >= 1");
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", key, value))
}
