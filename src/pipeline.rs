//! Pipeline assembly from configuration.
//!
//! Opens the database, builds the embedder and chat clients once, and
//! wires them into a [`Pipeline`] that `serve` and `ask` share.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use repochat_core::pipeline::Pipeline;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::create_models;
use crate::sqlite_store::SqliteStore;

/// Build the production pipeline. The returned pool backs both stores.
pub async fn open_pipeline(config: &Config) -> Result<(Pipeline, SqlitePool)> {
    let pool = db::connect(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    if !config.embedding.is_enabled() {
        tracing::warn!("embedding provider is disabled; similarity search will fail");
    }

    let store = Arc::new(SqliteStore::new(pool.clone(), embedder));
    let models = create_models(&config.llm)?;

    let pipeline = Pipeline::new(
        store.clone(),
        store,
        models.term,
        models.answer,
        config.pipeline_options(),
    );
    Ok((pipeline, pool))
}
