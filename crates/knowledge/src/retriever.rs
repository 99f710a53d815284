//! Query-time retrieval: embed once, search the index, apply the threshold.

use crate::embeddings::Embedder;
use crate::vector_index::{MetadataFilter, RetrievalResult, VectorIndex};
use edith_core::{retry, with_timeout, AppResult, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

/// Fixed query used to pull representative fragments for summaries.
pub const BROAD_QUERY: &str = "main topics themes key points summary";

/// Fragments that cleared the similarity threshold, best first.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub results: Vec<RetrievalResult>,
    /// The query was longer than the embedder accepts
    pub query_truncated: bool,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn top_score(&self) -> Option<f32> {
        self.results.first().map(|r| r.score)
    }
}

/// Embeds queries and searches the vector index.
#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    index_timeout: Duration,
    policy: RetryPolicy,
}

impl Retriever {
    pub fn new(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        index_timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            index,
            index_timeout,
            policy,
        }
    }

    /// Top `top_k` fragments scoring at least `threshold`.
    ///
    /// An empty result is a valid low-confidence outcome, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Retrieval> {
        let embedding = retry(&self.policy, "query embedding", || self.embedder.embed(query)).await?;

        let candidates = self.search(&embedding.vector, top_k, filter).await?;
        let before = candidates.len();

        let results: Vec<RetrievalResult> = candidates
            .into_iter()
            .filter(|r| r.score >= threshold)
            .collect();

        tracing::debug!(
            candidates = before,
            kept = results.len(),
            threshold,
            top_score = ?results.first().map(|r| r.score),
            "Retrieved fragments"
        );

        Ok(Retrieval {
            results,
            query_truncated: embedding.truncated,
        })
    }

    /// Representative fragments for summaries: fixed query, no threshold.
    pub async fn retrieve_broad(&self, top_k: usize) -> AppResult<Retrieval> {
        let embedding =
            retry(&self.policy, "summary embedding", || self.embedder.embed(BROAD_QUERY)).await?;
        let results = self.search(&embedding.vector, top_k, None).await?;

        tracing::debug!(kept = results.len(), "Retrieved fragments for summary");

        Ok(Retrieval {
            results,
            query_truncated: false,
        })
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievalResult>> {
        retry(&self.policy, "index query", || {
            with_timeout(
                "index query",
                self.index_timeout,
                self.index.query(vector, top_k, filter),
            )
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingProvider;
    use crate::memory_index::MemoryIndex;
    use crate::types::FragmentMetadata;
    use crate::vector_index::IndexEntry;
    use edith_core::AppError;

    /// Maps known words onto fixed axes so scores are predictable.
    #[derive(Debug)]
    struct AxisProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for AxisProvider {
        fn provider_name(&self) -> &str {
            "axis"
        }
        fn model_name(&self) -> &str {
            "axis-v1"
        }
        fn dimensions(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("gradient").count() as f32,
                        t.matches("bread").count() as f32,
                        t.matches("summary").count() as f32,
                    ]
                })
                .collect())
        }
    }

    fn entry(id: &str, text: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            fragment_id: id.to_string(),
            vector,
            metadata: FragmentMetadata {
                document_id: id.split('#').next().unwrap_or(id).to_string(),
                source_filename: "notes.md".to_string(),
                sequence_index: 0,
                char_start: 0,
                char_end: text.len(),
                text: text.to_string(),
                extra: serde_json::json!({}),
            },
        }
    }

    async fn retriever() -> Retriever {
        let index = Arc::new(MemoryIndex::new(3, None));
        index
            .upsert(vec![
                entry("ml#0", "gradient descent", vec![1.0, 0.0, 0.0]),
                entry("ml#1", "gradient and bread", vec![1.0, 1.0, 0.0]),
                entry("food#0", "bread", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let embedder =
            Embedder::new(Arc::new(AxisProvider), 3, 100, Duration::from_secs(5)).unwrap();
        Retriever::new(embedder, index, Duration::from_secs(5), RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_threshold_filters_results() {
        let retriever = retriever().await;
        let retrieval = retriever
            .retrieve("what is gradient descent", 5, 0.5, None)
            .await
            .unwrap();

        let ids: Vec<&str> = retrieval
            .results
            .iter()
            .map(|r| r.fragment_id.as_str())
            .collect();
        assert_eq!(ids, vec!["ml#0", "ml#1"]);
        assert!(retrieval.results.iter().all(|r| r.score >= 0.5));
        assert!((retrieval.top_score().unwrap() - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unrelated_query_is_empty_not_error() {
        let retriever = retriever().await;
        let retrieval = retriever
            .retrieve("weather tomorrow", 5, 0.7, None)
            .await
            .unwrap();

        assert!(retrieval.is_empty());
        assert_eq!(retrieval.top_score(), None);
    }

    #[tokio::test]
    async fn test_filter_is_passed_to_index() {
        let retriever = retriever().await;
        let filter = MetadataFilter::document("food");
        let retrieval = retriever
            .retrieve("bread", 5, 0.0, Some(&filter))
            .await
            .unwrap();

        assert_eq!(retrieval.results.len(), 1);
        assert_eq!(retrieval.results[0].fragment_id, "food#0");
    }

    #[tokio::test]
    async fn test_broad_retrieval_ignores_threshold() {
        let retriever = retriever().await;
        // The broad query maps onto the third axis, orthogonal to every entry
        let retrieval = retriever.retrieve_broad(10).await.unwrap();
        assert_eq!(retrieval.results.len(), 3);
        assert!(retrieval.results.iter().all(|r| r.score == 0.0));
    }

    #[tokio::test]
    async fn test_truncated_query_is_flagged() {
        let index = Arc::new(MemoryIndex::new(3, None));
        let embedder =
            Embedder::new(Arc::new(AxisProvider), 3, 5, Duration::from_secs(5)).unwrap();
        let retriever =
            Retriever::new(embedder, index, Duration::from_secs(5), RetryPolicy::none());

        let retrieval = retriever
            .retrieve("a very long question", 5, 0.0, None)
            .await
            .unwrap();
        assert!(retrieval.query_truncated);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_surfaces_as_config_error() {
        let index = Arc::new(MemoryIndex::new(4, None));
        let embedder =
            Embedder::new(Arc::new(AxisProvider), 3, 100, Duration::from_secs(5)).unwrap();
        let retriever =
            Retriever::new(embedder, index, Duration::from_secs(5), RetryPolicy::none());

        let result = retriever.retrieve("gradient", 5, 0.0, None).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
