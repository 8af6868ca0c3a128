//! CLI command implementations other than `serve` and `stats`.

use std::path::Path;

use anyhow::Result;
use docqa_core::store::VectorStore;

use crate::config::Config;
use crate::memory::ConversationMemory;
use crate::rag::RagService;
use crate::sqlite_store::SqliteVectorStore;

/// Create the storage directories and the database schema. Idempotent.
pub async fn run_init(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.paths.documents_dir)?;
    std::fs::create_dir_all(&config.paths.conversations_dir)?;
    let store = SqliteVectorStore::open(&config.paths.db_path).await?;
    store.close().await;

    println!("Initialized:");
    println!("  documents:     {}", config.paths.documents_dir.display());
    println!("  database:      {}", config.paths.db_path.display());
    println!("  conversations: {}", config.paths.conversations_dir.display());
    Ok(())
}

/// Index `dir` (or the configured documents directory) and print a summary.
pub async fn run_index(config: &Config, dir: Option<&Path>) -> Result<()> {
    let dir = dir.unwrap_or(&config.paths.documents_dir);
    let service = RagService::from_config(config).await?;
    let stats = service.index_directory(dir).await?;

    println!(
        "Indexed {} files into {} chunks from {}",
        stats.processed_files.len(),
        stats.total_chunks,
        dir.display()
    );
    for file in &stats.processed_files {
        println!("  + {}", file);
    }
    for skipped in &stats.skipped {
        println!("  - {} ({})", skipped.filename, skipped.reason);
    }
    Ok(())
}

/// Answer one question for `user` and print the answer with its sources.
pub async fn run_ask(config: &Config, user: &str, query: &str) -> Result<()> {
    let service = RagService::from_config(config).await?;
    let answer = service.answer(user, query).await?;

    println!("{}", answer.answer);
    if !answer.results.is_empty() {
        println!();
        println!("Sources:");
        for (i, r) in answer.results.iter().enumerate() {
            println!(
                "  [{}] {} (chunk {}/{}, relevance {:.2})",
                i + 1,
                r.chunk.source_filename,
                r.chunk.chunk_index + 1,
                r.chunk.total_chunks,
                r.similarity_score
            );
        }
    }
    Ok(())
}

/// Print or clear a user's conversation history.
pub async fn run_history(config: &Config, user: &str, clear: bool) -> Result<()> {
    let memory = ConversationMemory::open(
        &config.paths.conversations_dir,
        config.memory.max_history,
    )?;

    if clear {
        memory.clear(user).await?;
        println!("Cleared conversation history for {}", user);
        return Ok(());
    }

    let history = memory.get_history(user);
    if history.is_empty() {
        println!("No conversation history for {}", user);
        return Ok(());
    }
    for turn in &history {
        println!(
            "[{}] {}: {}",
            turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
            turn.role.as_str(),
            turn.content
        );
    }
    Ok(())
}

/// Delete every indexed chunk. Requires `--yes`.
pub async fn run_clear_db(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("refusing to clear the vector database without --yes");
    }
    let store = SqliteVectorStore::open(&config.paths.db_path).await?;
    let before = store.stats().await?;
    store.clear().await?;
    store.close().await;
    println!(
        "Cleared {} chunks from {} files.",
        before.total_chunks, before.indexed_files
    );
    Ok(())
}
