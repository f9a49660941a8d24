//! Storage abstraction for the chat core.
//!
//! Two read-only capabilities back a chat turn:
//!
//! | Trait | Operation | Used by |
//! |-------|-----------|---------|
//! | [`VectorIndex`] | [`similarity_search`](VectorIndex::similarity_search) | [`retrieve`](crate::retrieve) |
//! | [`FullTextStore`] | [`get_by_id`](FullTextStore::get_by_id) | [`context`](crate::context) |
//!
//! Both are populated by ingestion, which is not part of this crate.
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{FullTextRecord, RetrievedChunk};

/// Nearest-neighbour search over indexed chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` chunks closest to `query`, ordered by ascending distance.
    ///
    /// Zero hits is a valid answer, not an error.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Keyed lookup of whole-file content.
#[async_trait]
pub trait FullTextStore: Send + Sync {
    /// Fetch a record by id. A missing record is `Ok(None)`.
    async fn get_by_id(&self, id: &str) -> Result<Option<FullTextRecord>>;
}
