//! Embedding model modules.

pub mod embedder;
pub mod hashing;

use std::sync::Arc;

use tracing::{info, warn};

use crate::memory::core::config::EmbeddingConfig;
use crate::memory::core::errors::MemoryResult;

pub use embedder::{CachedEmbedder, EmbedFuture, Embedder, OllamaEmbedder};
pub use hashing::{DEFAULT_HASHING_DIMS, HashingEmbedder};

/// Build the configured embedder: cached Ollama when a model is named,
/// otherwise the hashing fallback at [`DEFAULT_HASHING_DIMS`]. `ndims`
/// only sizes model embeddings.
///
/// # Errors
/// Returns an error if the Ollama client or the cache cannot be built.
pub fn embedder_from_config(config: &EmbeddingConfig) -> MemoryResult<Arc<dyn Embedder>> {
    if config.model.is_some() {
        let ollama = OllamaEmbedder::new(config)?;
        info!(model = ?config.model, ndims = config.ndims, "using Ollama embeddings");
        Ok(Arc::new(CachedEmbedder::new(ollama, config.cache_capacity)?))
    } else {
        if config.ndims != DEFAULT_HASHING_DIMS {
            warn!(
                configured = config.ndims,
                ndims = DEFAULT_HASHING_DIMS,
                "embedding dims apply to model embeddings only"
            );
        }
        info!(ndims = DEFAULT_HASHING_DIMS, "no embedding model configured, using hashing fallback");
        Ok(Arc::new(HashingEmbedder::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_fallback_keeps_its_own_dims() {
        let config = EmbeddingConfig {
            ndims: 768,
            ..EmbeddingConfig::default()
        };
        let embedder = embedder_from_config(&config).unwrap();
        assert_eq!(embedder.ndims(), DEFAULT_HASHING_DIMS);
        assert_eq!(embedder_from_config(&EmbeddingConfig::default()).unwrap().ndims(), 256);
    }
}
