//! Index and memory statistics for `docqa stats`.
//!
//! Opens the vector database and conversation directory directly, so it
//! works without provider credentials.

use anyhow::Result;
use docqa_core::store::VectorStore;

use crate::config::Config;
use crate::memory::ConversationMemory;
use crate::sqlite_store::SqliteVectorStore;

/// Query the store and memory and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteVectorStore::open(&config.paths.db_path).await?;
    let stats = store.stats().await?;
    let sources = store.list_sources().await?;
    let memory = ConversationMemory::open(
        &config.paths.conversations_dir,
        config.memory.max_history,
    )?;

    let db_size = std::fs::metadata(&config.paths.db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docqa — Index Stats");
    println!("===================");
    println!();
    println!("  Database:        {}", config.paths.db_path.display());
    println!("  Size:            {}", format_bytes(db_size));
    println!("  Files:           {}", stats.indexed_files);
    println!("  Chunks:          {}", stats.total_chunks);
    println!();
    println!("  Conversations:   {}", config.paths.conversations_dir.display());
    println!("  Users:           {}", memory.known_users());
    println!("  Max history:     {}", memory.max_history());
    println!();
    println!("  LLM model:       {}", config.llm.model);
    println!("  Embedding model: {}", config.embedding.model);
    println!(
        "  Chunking:        {} chars, {} overlap",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );

    if !sources.is_empty() {
        println!();
        println!("  Indexed files:");
        for source in &sources {
            println!("    {}", source);
        }
    }
    println!();

    store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
