//! In-memory store for tests and embedding in other hosts.
//!
//! Implements both [`VectorIndex`] and [`FullTextStore`] with `HashMap`
//! and `Vec` behind `std::sync::RwLock`. Vector search is brute-force
//! cosine distance using the injected [`Embedder`] for the query.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{cosine_distance, embed_one, ensure_same_dims, nearest, Embedder};
use crate::models::{FullTextRecord, RetrievedChunk};

use super::{FullTextStore, VectorIndex};

struct StoredChunk {
    source: String,
    file_id: String,
    content: String,
    start_index: Option<i64>,
    vector: Vec<f32>,
}

/// In-memory vector index and full-text store.
pub struct InMemoryStore {
    embedder: Arc<dyn Embedder>,
    files: RwLock<HashMap<String, FullTextRecord>>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            files: RwLock::new(HashMap::new()),
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace a full-text record.
    pub fn insert_file(&self, record: FullTextRecord) {
        let mut files = self.files.write().unwrap();
        files.insert(record.id.clone(), record);
    }

    /// Embed and index a chunk of `file_id`.
    pub async fn insert_chunk(
        &self,
        source: &str,
        file_id: &str,
        content: &str,
        start_index: Option<i64>,
    ) -> Result<()> {
        let vector = embed_one(self.embedder.as_ref(), content).await?;
        let mut chunks = self.chunks.write().unwrap();
        chunks.push(StoredChunk {
            source: source.to_string(),
            file_id: file_id.to_string(),
            content: content.to_string(),
            start_index,
            vector,
        });
        Ok(())
    }

    /// Remove a full-text record, leaving its chunks indexed.
    pub fn remove_file(&self, id: &str) -> Option<FullTextRecord> {
        self.files.write().unwrap().remove(id)
    }
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_one(self.embedder.as_ref(), query).await?;

        let chunks = self.chunks.read().unwrap();
        let mut scored: Vec<(f64, &StoredChunk)> = Vec::with_capacity(chunks.len());
        for c in chunks.iter() {
            ensure_same_dims(&query_vec, &c.vector, &c.source)?;
            scored.push((cosine_distance(&query_vec, &c.vector), c));
        }

        Ok(nearest(scored, k)
            .into_iter()
            .map(|(distance, c)| RetrievedChunk {
                source: c.source.clone(),
                file_id: c.file_id.clone(),
                content: c.content.clone(),
                start_index: c.start_index,
                distance,
            })
            .collect())
    }
}

#[async_trait]
impl FullTextStore for InMemoryStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<FullTextRecord>> {
        Ok(self.files.read().unwrap().get(id).cloned())
    }
}
