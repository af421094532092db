//! Feature-hashing fallback encoder.
//!
//! Used when no embedding model is configured. Each whitespace token is
//! hashed into one of `ndims` buckets and the counts are L2-normalized, so
//! identical texts are at distance zero and retrieval keeps working without a
//! model.

use crate::memory::embedding::embedder::{EmbedFuture, Embedder};
use crate::memory::core::errors::MemoryResult;

/// Bucket count used by the fallback encoder.
pub const DEFAULT_HASHING_DIMS: usize = 256;

/// Deterministic bag-of-tokens embedder.
#[derive(Clone, Copy, Debug)]
pub struct HashingEmbedder {
    ndims: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMS)
    }
}

impl HashingEmbedder {
    /// Create an encoder with `ndims` buckets (at least one).
    #[must_use]
    pub fn new(ndims: usize) -> Self {
        Self {
            ndims: ndims.max(1),
        }
    }

    /// Encode synchronously.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0; self.ndims];
        for token in text.split_whitespace() {
            let bucket = crc32fast::hash(token.as_bytes()) as usize % self.ndims;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn embed_text<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, MemoryResult<Vec<f64>>> {
        Box::pin(async move { Ok(self.encode(text)) })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_normalized_and_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.encode("用户: 为什么\n智子: 因为\n状态: S2");
        let b = embedder.encode("用户: 为什么\n智子: 因为\n状态: S2");
        assert_eq!(a.len(), DEFAULT_HASHING_DIMS);
        assert_eq!(a, b);
        let norm = a.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert!(embedder.encode("   ").iter().all(|v| v.abs() < f64::EPSILON));
    }

    #[tokio::test]
    async fn test_embed_text_matches_encode() {
        let embedder = HashingEmbedder::new(32);
        let vector = embedder.embed_text("hello world").await.unwrap();
        assert_eq!(vector, embedder.encode("hello world"));
        assert_eq!(embedder.ndims(), 32);
    }
}
