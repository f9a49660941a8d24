//! Multi-term retrieval with source deduplication.
//!
//! Terms are searched in reverse list order, so the raw question and the
//! extracted names run before the fixed keywords. When two terms hit the
//! same source, the chunk found first keeps its position and later hits
//! for that source are discarded.

use std::collections::HashSet;

use crate::error::ChatError;
use crate::models::RetrievedChunk;
use crate::store::VectorIndex;

/// Default number of hits requested per search term.
pub const DEFAULT_TOP_K_PER_TERM: usize = 3;

/// Search `index` once per term and return unique-by-source chunks.
///
/// The result holds at most `top_k_per_term * terms.len()` chunks. A term
/// with no hits is skipped; an index failure aborts the whole retrieval.
pub async fn retrieve(
    index: &dyn VectorIndex,
    terms: &[String],
    top_k_per_term: usize,
) -> Result<Vec<RetrievedChunk>, ChatError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut results = Vec::new();

    for term in terms.iter().rev() {
        let hits = index
            .similarity_search(term, top_k_per_term)
            .await
            .map_err(|e| ChatError::external("vector index", e))?;

        let before = results.len();
        for chunk in hits {
            if seen.insert(chunk.source.clone()) {
                results.push(chunk);
            }
        }
        tracing::debug!(term = %term, added = results.len() - before, "similarity search");
    }

    Ok(results)
}
