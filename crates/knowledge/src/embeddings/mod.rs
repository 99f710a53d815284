//! Embedding generation.
//!
//! [`Embedder`] wraps a provider with the rules every caller relies on:
//! bounded input length, a timeout per provider call, and a fixed output
//! dimension.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use edith_core::config::{EmbeddingSettings, ResilienceSettings};
use edith_core::{with_timeout, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// A vector paired with whether its input had to be shortened.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub truncated: bool,
}

/// Provider-agnostic embedder with truncation, timeout and dimension checks.
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
    max_input_chars: usize,
    timeout: Duration,
}

impl Embedder {
    /// Fails with a configuration error when the provider's dimension does
    /// not match the configured one.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        dimensions: usize,
        max_input_chars: usize,
        timeout: Duration,
    ) -> AppResult<Self> {
        if provider.dimensions() != dimensions {
            return Err(AppError::Config(format!(
                "Embedding provider '{}' produces {} dimensions, configured {}",
                provider.provider_name(),
                provider.dimensions(),
                dimensions
            )));
        }

        Ok(Self {
            provider,
            dimensions,
            max_input_chars,
            timeout,
        })
    }

    pub fn from_settings(
        provider: Arc<dyn EmbeddingProvider>,
        embedding: &EmbeddingSettings,
        resilience: &ResilienceSettings,
    ) -> AppResult<Self> {
        Self::new(
            provider,
            embedding.dimensions,
            embedding.max_input_chars,
            resilience.embed_timeout(),
        )
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed one text.
    pub async fn embed(&self, text: &str) -> AppResult<Embedding> {
        let (input, truncated) = self.prepare(text);

        let vector = with_timeout("embedding", self.timeout, self.provider.embed(&input)).await?;
        self.check_dimension(&vector)?;

        Ok(Embedding { vector, truncated })
    }

    /// Embed several texts in one provider call; output order matches input.
    pub async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (inputs, flags): (Vec<String>, Vec<bool>) =
            texts.iter().map(|t| self.prepare(t)).unzip();

        let vectors = with_timeout(
            "embedding batch",
            self.timeout,
            self.provider.embed_batch(&inputs),
        )
        .await?;

        if vectors.len() != inputs.len() {
            return Err(AppError::Embedding(format!(
                "Provider returned {} embeddings for {} texts",
                vectors.len(),
                inputs.len()
            )));
        }

        vectors
            .into_iter()
            .zip(flags)
            .map(|(vector, truncated)| {
                self.check_dimension(&vector)?;
                Ok(Embedding { vector, truncated })
            })
            .collect()
    }

    fn prepare(&self, text: &str) -> (String, bool) {
        let char_count = text.chars().count();
        if char_count <= self.max_input_chars {
            return (text.to_string(), false);
        }

        tracing::warn!(
            chars = char_count,
            max_input_chars = self.max_input_chars,
            "Embedding input truncated"
        );
        (text.chars().take(self.max_input_chars).collect(), true)
    }

    fn check_dimension(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.dimensions {
            return Err(AppError::Config(format!(
                "Embedding model '{}' returned {} dimensions, expected {}",
                self.provider.model_name(),
                vector.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;

    /// Claims one dimension but returns another.
    #[derive(Debug)]
    struct LyingProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for LyingProvider {
        fn provider_name(&self) -> &str {
            "lying"
        }
        fn model_name(&self) -> &str {
            "lying-v1"
        }
        fn dimensions(&self) -> usize {
            8
        }
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.5; 4]).collect())
        }
    }

    #[derive(Debug)]
    struct StalledProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for StalledProvider {
        fn provider_name(&self) -> &str {
            "stalled"
        }
        fn model_name(&self) -> &str {
            "stalled-v1"
        }
        fn dimensions(&self) -> usize {
            4
        }
        async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    fn trigram_embedder(max_input_chars: usize) -> Embedder {
        Embedder::new(
            Arc::new(TrigramProvider::new(64)),
            64,
            max_input_chars,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_configured_dimension_must_match_provider() {
        let result = Embedder::new(
            Arc::new(TrigramProvider::new(64)),
            128,
            100,
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let embedder = trigram_embedder(1000);
        let a = embedder.embed("backpropagation computes gradients").await.unwrap();
        let b = embedder.embed("backpropagation computes gradients").await.unwrap();

        assert_eq!(a, b);
        assert!(!a.truncated);
    }

    #[tokio::test]
    async fn test_long_input_is_truncated_and_flagged() {
        let embedder = trigram_embedder(10);
        let long = embedder.embed("abcdefghij klmnop").await.unwrap();
        let prefix = embedder.embed("abcdefghij").await.unwrap();

        assert!(long.truncated);
        assert_eq!(long.vector, prefix.vector);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_flags() {
        let embedder = trigram_embedder(12);
        let texts = vec![
            "short".to_string(),
            "a much longer text than allowed".to_string(),
        ];

        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("short").await.unwrap());
        assert!(!batch[0].truncated);
        assert!(batch[1].truncated);
    }

    #[tokio::test]
    async fn test_wrong_vector_length_is_config_error() {
        let embedder =
            Embedder::new(Arc::new(LyingProvider), 8, 100, Duration::from_secs(1)).unwrap();

        let result = embedder.embed("hello").await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_stalled_provider_times_out() {
        let embedder =
            Embedder::new(Arc::new(StalledProvider), 4, 100, Duration::from_secs(1)).unwrap();

        let result = embedder.embed("hello").await;
        assert!(matches!(result, Err(AppError::Timeout { .. })));
    }
}
