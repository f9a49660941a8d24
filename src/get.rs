//! Full-text record retrieval by ID.
//!
//! Backs the `repochat get <id>` command, which shows exactly what the
//! context loader would put into a prompt for a given file id.

use std::sync::Arc;

use anyhow::{bail, Result};

use repochat_core::models::FullTextRecord;
use repochat_core::store::FullTextStore;

use crate::config::Config;
use crate::db;
use crate::embedding::DisabledEmbedder;
use crate::sqlite_store::SqliteStore;

/// Fetch one record from `document_file`.
pub async fn get_file(config: &Config, id: &str) -> Result<FullTextRecord> {
    let pool = db::connect(config).await?;
    // Point lookups never embed, so no provider is needed here.
    let store = SqliteStore::new(pool.clone(), Arc::new(DisabledEmbedder));
    let record = store.get_by_id(id).await;
    pool.close().await;

    match record? {
        Some(record) => Ok(record),
        None => bail!("file not found: {}", id),
    }
}

/// CLI entry point: prints the record to stdout.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let record = get_file(config, id).await?;

    println!("--- File ---");
    println!("id:        {}", record.id);
    println!("filepath:  {}", record.filepath);
    println!("file_type: {}", record.file_type);
    if !record.metadata.is_empty() {
        println!("metadata:");
        for (key, value) in &record.metadata {
            println!("  {}: {}", key, value);
        }
    }
    println!();

    println!("--- Content ({} bytes) ---", record.content.len());
    println!("{}", record.content);

    Ok(())
}
