//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that vector indexes use to turn a search
//! term into a query vector, plus pure helpers for vector serialization
//! and distance computation.
//!
//! Concrete embedders (OpenAI-compatible, Ollama) live in the `repochat`
//! app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text.
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embedder
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use repochat_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance in `[0.0, 2.0]`; `0.0` means same direction.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b) as f64
}

/// Fail when a stored vector was produced by a model with a different
/// dimensionality than the query vector.
pub fn ensure_same_dims(query: &[f32], stored: &[f32], source: &str) -> Result<()> {
    if query.len() != stored.len() {
        anyhow::bail!(
            "Embedding dimension mismatch: query has {} dims, stored vector for {} has {}",
            query.len(),
            source,
            stored.len()
        );
    }
    Ok(())
}

/// Sort `(distance, item)` pairs closest-first and keep the first `k`.
///
/// Pairs with a non-finite distance (a corrupt vector) are dropped.
pub fn nearest<T>(scored: Vec<(f64, T)>, k: usize) -> Vec<(f64, T)> {
    let before = scored.len();
    let mut scored: Vec<(f64, T)> = scored.into_iter().filter(|(d, _)| d.is_finite()).collect();
    if scored.len() < before {
        tracing::warn!(dropped = before - scored.len(), "ignoring vectors with non-finite distance");
    }
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_ensure_same_dims() {
        assert!(ensure_same_dims(&[1.0, 2.0], &[3.0, 4.0], "a.py").is_ok());
        let err = ensure_same_dims(&[1.0, 2.0, 3.0], &[1.0; 26], "a.py").unwrap_err();
        assert!(err.to_string().contains("query has 3 dims"));
        assert!(err.to_string().contains("a.py has 26"));
    }

    #[test]
    fn test_nearest_sorts_ascending_and_truncates() {
        let scored = vec![(0.9, "far"), (0.1, "near"), (0.5, "mid")];
        let top = nearest(scored, 2);
        let items: Vec<&str> = top.iter().map(|(_, s)| *s).collect();
        assert_eq!(items, vec!["near", "mid"]);
    }

    #[test]
    fn test_nearest_skips_nan_distances() {
        let scored: Vec<(f64, usize)> = (0..64)
            .map(|i| if i % 3 == 0 { (f64::NAN, i) } else { (64.0 - i as f64, i) })
            .collect();
        let top = nearest(scored, 5);
        let items: Vec<usize> = top.iter().map(|(_, i)| *i).collect();
        assert_eq!(items, vec![62, 61, 59, 58, 56]);
        assert!(top.iter().all(|(d, _)| d.is_finite()));
    }

    #[test]
    fn test_corrupt_blob_distance_is_not_finite() {
        let nan_blob = vec_to_blob(&[f32::NAN, 1.0]);
        let d = cosine_distance(&[1.0, 0.0], &blob_to_vec(&nan_blob));
        assert!(!d.is_finite());
        assert!(nearest(vec![(d, "bad"), (0.5, "ok")], 2).iter().all(|(_, s)| *s == "ok"));
    }
}
