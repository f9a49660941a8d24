//! SQLite-backed stores.
//!
//! [`SqliteStore`] serves both read paths of a chat turn from one pool:
//!
//! - [`FullTextStore::get_by_id`] is a primary-key lookup on `document_file`.
//! - [`VectorIndex::similarity_search`] embeds the query with the injected
//!   [`Embedder`] and ranks every row of `document_index` by cosine
//!   distance. Brute force is fine at single-repository scale.
//!
//! The writers ([`SqliteStore::insert_file`], [`SqliteStore::insert_chunk`])
//! exist for the ingestion collaborator and for tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use repochat_core::embedding::{
    blob_to_vec, cosine_distance, embed_one, ensure_same_dims, nearest, vec_to_blob, Embedder,
};
use repochat_core::models::{FullTextRecord, RetrievedChunk};
use repochat_core::store::{FullTextStore, VectorIndex};

/// SQLite implementation of [`VectorIndex`] and [`FullTextStore`].
pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

/// A file to insert with [`SqliteStore::insert_file`].
#[derive(Debug, Clone, Default)]
pub struct NewFile {
    pub content: String,
    pub filepath: String,
    pub file_type: String,
    pub metadata: BTreeMap<String, String>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    /// Insert a whole file and return its generated id.
    pub async fn insert_file(&self, file: &NewFile) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let metadata_json = serde_json::to_string(&file.metadata)?;

        sqlx::query(
            "INSERT INTO document_file (id, content, filepath, file_type, file_metadata) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&file.content)
        .bind(&file.filepath)
        .bind(&file.file_type)
        .bind(&metadata_json)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert file: {}", file.filepath))?;

        Ok(id)
    }

    /// Embed `content` and index it as a chunk of `file_id`.
    pub async fn insert_chunk(
        &self,
        file_id: &str,
        source: &str,
        content: &str,
        start_index: Option<i64>,
    ) -> Result<String> {
        let vector = embed_one(self.embedder.as_ref(), content).await?;
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO document_index (id, file_id, source, start_index, content, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(file_id)
        .bind(source)
        .bind(start_index)
        .bind(content)
        .bind(vec_to_blob(&vector))
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_index")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn parse_metadata(json: &str) -> BTreeMap<String, String> {
    let value: serde_json::Value = serde_json::from_str(json).unwrap_or(serde_json::json!({}));
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

#[async_trait]
impl FullTextStore for SqliteStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<FullTextRecord>> {
        let row = sqlx::query(
            "SELECT id, content, filepath, file_type, file_metadata FROM document_file WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let metadata_json: String = r.get("file_metadata");
            FullTextRecord {
                id: r.get("id"),
                content: r.get("content"),
                filepath: r.get("filepath"),
                file_type: r.get("file_type"),
                metadata: parse_metadata(&metadata_json),
            }
        }))
    }
}

#[async_trait]
impl VectorIndex for SqliteStore {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_one(self.embedder.as_ref(), query).await?;

        let rows = sqlx::query(
            "SELECT file_id, source, start_index, content, embedding FROM document_index",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f64, RetrievedChunk)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let source: String = row.get("source");
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            ensure_same_dims(&query_vec, &vector, &source)?;

            let distance = cosine_distance(&query_vec, &vector);
            scored.push((
                distance,
                RetrievedChunk {
                    source,
                    file_id: row.get("file_id"),
                    content: row.get("content"),
                    start_index: row.get("start_index"),
                    distance,
                },
            ));
        }

        Ok(nearest(scored, k).into_iter().map(|(_, c)| c).collect())
    }
}
