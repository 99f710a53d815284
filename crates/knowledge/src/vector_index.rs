//! Vector index abstraction.
//!
//! A keyed store `fragment_id -> (vector, metadata)` with cosine-similarity
//! search. Backends share the ranking and validation helpers defined here so
//! they agree on ordering, filtering and error kinds.

use crate::memory_index::MemoryIndex;
use crate::sqlite_index::SqliteIndex;
use crate::types::FragmentMetadata;
use edith_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// One stored fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub fragment_id: String,
    pub vector: Vec<f32>,
    pub metadata: FragmentMetadata,
}

/// A fragment matched by a query. Score is cosine similarity in [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub fragment_id: String,
    pub score: f32,
    pub metadata: FragmentMetadata,
}

/// Restricts queries and deletes. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_filename: Option<String>,
}

impl MetadataFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            source_filename: None,
        }
    }

    pub fn source_filename(source_filename: impl Into<String>) -> Self {
        Self {
            document_id: None,
            source_filename: Some(source_filename.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.document_id.is_none() && self.source_filename.is_none()
    }

    pub fn matches(&self, metadata: &FragmentMetadata) -> bool {
        self.document_id
            .as_ref()
            .map_or(true, |id| *id == metadata.document_id)
            && self
                .source_filename
                .as_ref()
                .map_or(true, |name| *name == metadata.source_filename)
    }
}

/// Outcome of a batch upsert. Failed entries were not written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertReport {
    pub written: usize,
    /// `(fragment_id, reason)`
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub count: usize,
    pub dimension: usize,
    /// `count / capacity`; 0 when the index is unbounded
    pub fill_ratio: f32,
}

impl IndexStats {
    pub fn new(count: usize, dimension: usize, capacity: Option<usize>) -> Self {
        let fill_ratio = match capacity {
            Some(capacity) if capacity > 0 => count as f32 / capacity as f32,
            _ => 0.0,
        };
        Self {
            count,
            dimension,
            fill_ratio,
        }
    }
}

/// Trait for vector index backends.
///
/// Implementations must:
/// - reject query vectors of the wrong dimension with a configuration error
/// - return results by descending score, ties in fragment-id order
/// - replace an entry entirely when its fragment id is upserted again
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    fn backend_name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Insert or replace entries. Invalid entries fail individually.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> AppResult<UpsertReport>;

    /// Top-k entries most similar to `vector`, optionally filtered.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievalResult>>;

    /// Remove every entry matching `filter`; returns how many were removed.
    async fn delete(&self, filter: &MetadataFilter) -> AppResult<usize>;

    async fn stats(&self) -> AppResult<IndexStats>;
}

/// Open the index backend selected in the configuration.
pub fn create_index(config: &AppConfig, model: &str) -> AppResult<Arc<dyn VectorIndex>> {
    let dimension = config.embedding.dimensions;
    let capacity = config.index.capacity;

    tracing::debug!(
        backend = %config.index.backend,
        namespace = %config.index.namespace,
        dimension,
        "Opening vector index"
    );

    match config.index.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryIndex::new(dimension, capacity))),
        "sqlite" => Ok(Arc::new(SqliteIndex::open(
            &config.index_path(),
            dimension,
            model,
            capacity,
        )?)),
        other => Err(AppError::Config(format!(
            "Unknown index backend: '{}'. Supported backends: sqlite, memory",
            other
        ))),
    }
}

/// Cosine similarity; 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

pub(crate) fn check_query_dimension(vector: &[f32], dimension: usize) -> AppResult<()> {
    if vector.len() != dimension {
        return Err(AppError::Config(format!(
            "Query vector has dimension {}, index expects {}",
            vector.len(),
            dimension
        )));
    }
    Ok(())
}

pub(crate) fn entry_dimension_error(entry: &IndexEntry, dimension: usize) -> Option<String> {
    (entry.vector.len() != dimension).then(|| {
        format!(
            "dimension mismatch: expected {}, got {}",
            dimension,
            entry.vector.len()
        )
    })
}

/// Sort scored candidates (already in fragment-id order) and keep the top k.
pub(crate) fn rank(mut results: Vec<RetrievalResult>, top_k: usize) -> Vec<RetrievalResult> {
    // Stable sort keeps fragment-id order among equal scores
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(document_id: &str, source_filename: &str) -> FragmentMetadata {
        FragmentMetadata {
            document_id: document_id.to_string(),
            source_filename: source_filename.to_string(),
            sequence_index: 0,
            char_start: 0,
            char_end: 4,
            text: "text".to_string(),
            extra: serde_json::json!({}),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_filter_matching() {
        let meta = metadata("doc-a", "ml.md");

        assert!(MetadataFilter::all().matches(&meta));
        assert!(MetadataFilter::document("doc-a").matches(&meta));
        assert!(!MetadataFilter::document("doc-b").matches(&meta));
        assert!(MetadataFilter::source_filename("ml.md").matches(&meta));
        assert!(!MetadataFilter {
            document_id: Some("doc-a".to_string()),
            source_filename: Some("other.md".to_string()),
        }
        .matches(&meta));
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let result = |id: &str, score: f32| RetrievalResult {
            fragment_id: id.to_string(),
            score,
            metadata: metadata("doc", "a.md"),
        };

        let ranked = rank(
            vec![
                result("a#0", 0.5),
                result("a#1", 0.9),
                result("a#2", 0.5),
                result("a#3", 0.1),
            ],
            3,
        );

        let ids: Vec<&str> = ranked.iter().map(|r| r.fragment_id.as_str()).collect();
        assert_eq!(ids, vec!["a#1", "a#0", "a#2"]);
    }

    #[test]
    fn test_stats_fill_ratio() {
        assert_eq!(IndexStats::new(5, 4, None).fill_ratio, 0.0);
        assert!((IndexStats::new(5, 4, Some(20)).fill_ratio - 0.25).abs() < 1e-6);
    }
}
