//! Deterministic stand-ins for the embedding and chat providers, shared by
//! the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docqa::embedding::EmbeddingClient;
use docqa::error::{Error, Result};
use docqa::llm::LanguageModel;
use docqa::memory::ConversationMemory;
use docqa::processor::DocumentProcessor;
use docqa::rag::RagService;
use docqa::sqlite_store::SqliteVectorStore;
use docqa_core::prompt::ChatMessage;
use parking_lot::Mutex;

pub const DIMS: usize = 64;

/// Bag-of-words embedder: each lowercase word is hashed into one of
/// [`DIMS`] buckets. Texts that share words get a positive cosine.
#[derive(Default)]
pub struct FakeEmbedder {
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeEmbedder {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

pub fn embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
            % DIMS;
        v[bucket] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingClient for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedding"
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::embedding("provider unavailable"));
        }
        Ok(texts.iter().map(|t| embed(t)).collect())
    }
}

/// Chat model that answers with a fixed prefix plus the final user message,
/// and records every transcript it receives.
#[derive(Default)]
pub struct FakeLlm {
    pub fail: AtomicBool,
    pub transcripts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeLlm {
    pub fn last_transcript(&self) -> Vec<ChatMessage> {
        self.transcripts.lock().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    fn model_name(&self) -> &str {
        "fake-chat"
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.transcripts.lock().push(messages.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::generation("model overloaded"));
        }
        let query = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        Ok(format!("answer to: {}", query))
    }
}

pub struct Harness {
    pub service: Arc<RagService>,
    pub embedder: Arc<FakeEmbedder>,
    pub llm: Arc<FakeLlm>,
}

/// Build a service over a SQLite store and memory directory inside `root`.
pub async fn harness(root: &Path, embedder: FakeEmbedder, max_history: usize) -> Harness {
    let store = SqliteVectorStore::open(&root.join("db/vectors.sqlite"))
        .await
        .unwrap();
    let memory = ConversationMemory::open(&root.join("conversations"), max_history).unwrap();
    let embedder = Arc::new(embedder);
    let llm = Arc::new(FakeLlm::default());
    let service = RagService::new(
        Arc::new(store),
        embedder.clone(),
        llm.clone(),
        Arc::new(memory),
        DocumentProcessor::new(100, 20),
        5,
    );
    Harness {
        service: Arc::new(service),
        embedder,
        llm,
    }
}

/// `len` ASCII characters built by repeating `sentence`.
pub fn text_of_len(sentence: &str, len: usize) -> String {
    sentence.chars().cycle().take(len).collect()
}

/// Three text files that chunk (size 100, overlap 20) into 10, 15 and 20
/// chunks respectively.
pub fn write_corpus(dir: &Path) {
    std::fs::create_dir_all(dir.join("guides")).unwrap();
    std::fs::write(
        dir.join("vpn.txt"),
        text_of_len("Connect to the corporate VPN with the wireguard client. ", 800),
    )
    .unwrap();
    std::fs::write(
        dir.join("guides/payroll.txt"),
        text_of_len("Payroll runs on the last friday of every month. ", 1200),
    )
    .unwrap();
    std::fs::write(
        dir.join("zebra.txt"),
        text_of_len("Zebras graze on the savanna grasslands at dawn. ", 1600),
    )
    .unwrap();
}
