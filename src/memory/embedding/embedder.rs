//! Embedding model abstraction, the Rig + Ollama implementation and an LRU
//! cache wrapper.

use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;

use lru::LruCache;
use reqwest::Client as ReqwestClient;
use rig::client::{EmbeddingsClient, Nothing};
use rig::embeddings::EmbeddingModel;
use rig::providers::ollama;
use tokio::sync::Mutex;
use tracing::debug;

use crate::memory::core::config::EmbeddingConfig;
use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text → fixed-length vector.
pub trait Embedder: Send + Sync {
    /// Embed a single text string.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_text<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, MemoryResult<Vec<f64>>>;
    /// Return embedding dimensionality.
    fn ndims(&self) -> usize;
}

type OllamaEmbeddingModel = ollama::EmbeddingModel<ReqwestClient>;

/// Ollama embedder using Rig provider.
#[derive(Clone)]
pub struct OllamaEmbedder {
    model: OllamaEmbeddingModel,
    ndims: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder from config.
    ///
    /// # Errors
    /// Returns an error if no model is configured, the base URL is invalid,
    /// or the client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> MemoryResult<Self> {
        let model_name = config.model.clone().ok_or_else(|| {
            MemoryError::InvalidConfig("embedding.model is required for Ollama".to_string())
        })?;
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(MemoryError::from)?;
        let model = client.embedding_model_with_ndims(model_name, config.ndims);
        Ok(Self {
            model,
            ndims: config.ndims,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed_text<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, MemoryResult<Vec<f64>>> {
        Box::pin(async move {
            let embedding = self.model.embed_text(text).await?;
            if embedding.vec.len() != self.ndims {
                return Err(MemoryError::Embedding(format!(
                    "expected {} dimensions, model returned {}",
                    self.ndims,
                    embedding.vec.len()
                )));
            }
            Ok(embedding.vec)
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}

/// Keeps the vectors of recently embedded texts.
///
/// A turn embeds the same document for the summary insert that it already
/// embedded as a query, so repeated texts skip the model round trip.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Mutex<LruCache<String, Vec<f64>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// Wrap `inner` with a cache of `capacity` entries.
    ///
    /// # Errors
    /// Returns an error if `capacity` is zero.
    pub fn new(inner: E, capacity: usize) -> MemoryResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            MemoryError::InvalidConfig("embedding.cache_capacity must be > 0".to_string())
        })?;
        Ok(Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn embed_text<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, MemoryResult<Vec<f64>>> {
        Box::pin(async move {
            if let Some(hit) = self.cache.lock().await.get(text) {
                debug!("embedding cache hit");
                return Ok(hit.clone());
            }
            let vector = self.inner.embed_text(text).await?;
            self.cache.lock().await.put(text.to_string(), vector.clone());
            Ok(vector)
        })
    }

    fn ndims(&self) -> usize {
        self.inner.ndims()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn embed_text<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, MemoryResult<Vec<f64>>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                #[allow(clippy::cast_precision_loss)]
                Ok(vec![text.len() as f64, 1.0])
            })
        }

        fn ndims(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_cache_skips_repeated_texts() {
        let cached = CachedEmbedder::new(
            CountingEmbedder {
                calls: AtomicUsize::new(0),
            },
            4,
        )
        .unwrap();
        let first = cached.embed_text("hello").await.unwrap();
        let second = cached.embed_text("hello").await.unwrap();
        cached.embed_text("other").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.ndims(), 2);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let inner = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        assert!(CachedEmbedder::new(inner, 0).is_err());
    }

    #[test]
    fn test_ollama_requires_model() {
        assert!(OllamaEmbedder::new(&EmbeddingConfig::default()).is_err());
        let config = EmbeddingConfig {
            model: Some("nomic-embed-text".to_string()),
            ndims: 768,
            ..EmbeddingConfig::default()
        };
        assert!(OllamaEmbedder::new(&config).is_ok());
    }
}
