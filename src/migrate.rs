//! Schema migrations for the vector database.
//!
//! One table holds every chunk with its embedding. `seq` records insertion
//! order and breaks similarity ties at search time.

use anyhow::Result;
use sqlx::SqlitePool;

/// Create tables and indexes if they do not exist. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            source_filename TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(source_filename, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_filename)")
        .execute(pool)
        .await?;

    Ok(())
}
