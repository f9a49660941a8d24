//! Schema creation.
//!
//! Creates the two tables the chat backend reads. Every statement is
//! idempotent, so `repochat init` can run against an existing database.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create tables and indexes on an open pool.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Whole files, looked up by id when building the prompt context
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_file (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            filepath TEXT NOT NULL,
            file_type TEXT NOT NULL,
            file_metadata TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedded chunks searched by similarity
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_index (
            id TEXT PRIMARY KEY,
            file_id TEXT NOT NULL,
            source TEXT NOT NULL,
            start_index INTEGER,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_document_index_file_id ON document_index(file_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_document_file_filepath ON document_file(filepath)")
        .execute(pool)
        .await?;

    tracing::debug!("schema ready");
    Ok(())
}
