//! Process-local vector index.

use crate::types::FragmentMetadata;
use crate::vector_index::{
    check_query_dimension, cosine_similarity, entry_dimension_error, rank, IndexEntry,
    IndexStats, MetadataFilter, RetrievalResult, UpsertReport, VectorIndex,
};
use edith_core::AppResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

struct StoredEntry {
    vector: Vec<f32>,
    metadata: FragmentMetadata,
}

/// In-memory index behind a read/write lock.
///
/// Queries share the read side and run concurrently; upsert and delete take
/// the write side. Entries are kept in fragment-id order.
pub struct MemoryIndex {
    entries: RwLock<BTreeMap<String, StoredEntry>>,
    dimension: usize,
    capacity: Option<usize>,
}

impl MemoryIndex {
    pub fn new(dimension: usize, capacity: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            dimension,
            capacity,
        }
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> AppResult<UpsertReport> {
        let mut report = UpsertReport::default();
        let mut store = self.entries.write();

        for entry in entries {
            if let Some(reason) = entry_dimension_error(&entry, self.dimension) {
                report.failed.push((entry.fragment_id, reason));
                continue;
            }

            let is_new = !store.contains_key(&entry.fragment_id);
            if let Some(capacity) = self.capacity {
                if is_new && store.len() >= capacity {
                    report
                        .failed
                        .push((entry.fragment_id, format!("index capacity {} reached", capacity)));
                    continue;
                }
            }

            store.insert(
                entry.fragment_id,
                StoredEntry {
                    vector: entry.vector,
                    metadata: entry.metadata,
                },
            );
            report.written += 1;
        }

        Ok(report)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievalResult>> {
        check_query_dimension(vector, self.dimension)?;

        let candidates: Vec<RetrievalResult> = {
            let store = self.entries.read();
            store
                .iter()
                .filter(|(_, entry)| filter.map_or(true, |f| f.matches(&entry.metadata)))
                .map(|(id, entry)| RetrievalResult {
                    fragment_id: id.clone(),
                    score: cosine_similarity(vector, &entry.vector),
                    metadata: entry.metadata.clone(),
                })
                .collect()
        };

        Ok(rank(candidates, top_k))
    }

    async fn delete(&self, filter: &MetadataFilter) -> AppResult<usize> {
        let mut store = self.entries.write();
        let before = store.len();
        store.retain(|_, entry| !filter.matches(&entry.metadata));
        Ok(before - store.len())
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        Ok(IndexStats::new(
            self.entries.read().len(),
            self.dimension,
            self.capacity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edith_core::AppError;

    fn entry(document_id: &str, seq: usize, text: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            fragment_id: format!("{}#{}", document_id, seq),
            vector,
            metadata: FragmentMetadata {
                document_id: document_id.to_string(),
                source_filename: format!("{}.md", document_id),
                sequence_index: seq,
                char_start: 0,
                char_end: text.chars().count(),
                text: text.to_string(),
                extra: serde_json::json!({}),
            },
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_score() {
        let index = MemoryIndex::new(2, None);
        index
            .upsert(vec![
                entry("a", 0, "far", vec![0.0, 1.0]),
                entry("a", 1, "near", vec![1.0, 0.1]),
                entry("b", 0, "middle", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = index.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metadata.text, "near");
        assert_eq!(results[1].metadata.text, "middle");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_wrong_query_dimension_is_config_error() {
        let index = MemoryIndex::new(3, None);
        let result = index.query(&[1.0, 0.0], 5, None).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_reupsert_replaces_entry() {
        let index = MemoryIndex::new(2, None);
        index
            .upsert(vec![entry("a", 0, "old text", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(vec![entry("a", 0, "new text", vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(index.stats().await.unwrap().count, 1);
        let results = index.query(&[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(results[0].metadata.text, "new text");
    }

    #[tokio::test]
    async fn test_invalid_entries_fail_individually() {
        let index = MemoryIndex::new(2, Some(2));
        let report = index
            .upsert(vec![
                entry("a", 0, "ok", vec![1.0, 0.0]),
                entry("a", 1, "bad dimension", vec![1.0, 0.0, 0.0]),
                entry("a", 2, "ok too", vec![0.0, 1.0]),
                entry("a", 3, "over capacity", vec![0.5, 0.5]),
            ])
            .await
            .unwrap();

        assert_eq!(report.written, 2);
        let failed: Vec<&str> = report.failed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(failed, vec!["a#1", "a#3"]);

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.count, 2);
        assert!((stats.fill_ratio - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_delete_by_filter() {
        let index = MemoryIndex::new(2, None);
        index
            .upsert(vec![
                entry("a", 0, "a0", vec![1.0, 0.0]),
                entry("a", 1, "a1", vec![1.0, 0.0]),
                entry("b", 0, "b0", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(index.delete(&MetadataFilter::document("a")).await.unwrap(), 2);
        assert_eq!(index.stats().await.unwrap().count, 1);
        assert_eq!(index.delete(&MetadataFilter::all()).await.unwrap(), 1);
        assert_eq!(index.stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_query_with_filter() {
        let index = MemoryIndex::new(2, None);
        index
            .upsert(vec![
                entry("a", 0, "a0", vec![1.0, 0.0]),
                entry("b", 0, "b0", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let filter = MetadataFilter::document("b");
        let results = index.query(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.document_id, "b");
    }
}
