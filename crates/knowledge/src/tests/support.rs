//! Fakes shared by the scenario tests.

use crate::embeddings::EmbeddingProvider;
use crate::memory_index::MemoryIndex;
use crate::parser::TextParser;
use crate::rag::{CancelFlag, EngineComponents, IngestOptions, RagEngine};
use crate::types::SourceDocument;
use crate::vector_index::{
    IndexEntry, IndexStats, MetadataFilter, RetrievalResult, UpsertReport, VectorIndex,
};
use edith_core::{AppConfig, AppError, AppResult};
use edith_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Words mapped onto the embedding axes.
pub const AXES: [&str; 4] = ["gradient", "bread", "rust", "garden"];

/// Embeds by counting axis words.
///
/// Texts containing `POISON` fail; `SHORTVEC` yields a vector of the wrong
/// length. Can optionally raise a cancel flag after its first call, or go
/// unavailable after a number of calls.
#[derive(Debug, Default)]
pub struct KeywordProvider {
    pub calls: AtomicUsize,
    cancel_after_first: Option<CancelFlag>,
    fail_after: Option<usize>,
}

impl KeywordProvider {
    pub fn cancelling(flag: CancelFlag) -> Self {
        Self {
            cancel_after_first: Some(flag),
            ..Self::default()
        }
    }

    /// Answers the first `calls` requests, then reports the server gone.
    pub fn failing_after(calls: usize) -> Self {
        Self {
            fail_after: Some(calls),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for KeywordProvider {
    fn provider_name(&self) -> &str {
        "keyword"
    }

    fn model_name(&self) -> &str {
        "keyword-v1"
    }

    fn dimensions(&self) -> usize {
        AXES.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(flag) = &self.cancel_after_first {
            flag.cancel();
        }
        if self.fail_after.is_some_and(|limit| call >= limit) {
            return Err(AppError::Unavailable("embedding server went away".to_string()));
        }

        texts
            .iter()
            .map(|text| {
                if text.contains("POISON") {
                    return Err(AppError::Embedding("provider rejected input".to_string()));
                }
                if text.contains("SHORTVEC") {
                    return Ok(vec![1.0; AXES.len() - 1]);
                }
                let lower = text.to_lowercase();
                Ok(AXES
                    .iter()
                    .map(|axis| lower.matches(axis).count() as f32)
                    .collect())
            })
            .collect()
    }
}

/// Replays queued results and records every request.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<AppResult<String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<AppResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> LlmRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().push(request.clone());
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("scripted answer".to_string()));

        reply.map(|content| LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

/// Never answers within any reasonable timeout.
pub struct StalledClient;

#[async_trait::async_trait]
impl LlmClient for StalledClient {
    fn provider_name(&self) -> &str {
        "stalled"
    }

    async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(AppError::Other("unreachable".to_string()))
    }
}

/// Memory index whose upserts start failing after a number of calls.
pub struct FailingIndex {
    inner: MemoryIndex,
    upserts: AtomicUsize,
    fail_after: usize,
}

impl FailingIndex {
    pub fn new(fail_after: usize) -> Self {
        Self {
            inner: MemoryIndex::new(AXES.len(), None),
            upserts: AtomicUsize::new(0),
            fail_after,
        }
    }
}

#[async_trait::async_trait]
impl VectorIndex for FailingIndex {
    fn backend_name(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> AppResult<UpsertReport> {
        if self.upserts.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
            return Err(AppError::Unavailable("index store went away".to_string()));
        }
        self.inner.upsert(entries).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievalResult>> {
        self.inner.query(vector, top_k, filter).await
    }

    async fn delete(&self, filter: &MetadataFilter) -> AppResult<usize> {
        self.inner.delete(filter).await
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        self.inner.stats().await
    }
}

pub fn test_config(workspace: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.workspace = workspace.to_path_buf();
    config.llm.provider = "echo".to_string();
    config.llm.model = "test-model".to_string();
    config.embedding.dimensions = AXES.len();
    config.embedding.batch_size = 2;
    config.chunking.chunk_size = 200;
    config.chunking.overlap = 20;
    config.chunking.boundary_window = 20;
    config.retrieval.similarity_threshold = 0.5;
    config.index.backend = "memory".to_string();
    config.resilience.initial_backoff_ms = 1;
    config
}

pub struct Harness {
    pub engine: RagEngine,
    pub client: Arc<ScriptedClient>,
    pub provider: Arc<KeywordProvider>,
    pub index: Arc<MemoryIndex>,
}

pub fn harness(config: AppConfig, client: ScriptedClient) -> Harness {
    harness_with_provider(config, client, KeywordProvider::default())
}

pub fn harness_with_provider(
    config: AppConfig,
    client: ScriptedClient,
    provider: KeywordProvider,
) -> Harness {
    let client = Arc::new(client);
    let provider = Arc::new(provider);
    let index = Arc::new(MemoryIndex::new(AXES.len(), None));

    let engine = RagEngine::new(
        config,
        EngineComponents {
            embedding_provider: provider.clone(),
            index: index.clone(),
            llm: client.clone(),
            parser: Arc::new(TextParser::new()),
        },
    )
    .unwrap();

    Harness {
        engine,
        client,
        provider,
        index,
    }
}

pub const ML_NOTE: &str =
    "Gradient descent updates weights against the gradient of the loss, step by step.";
pub const BAKING_NOTE: &str = "Sourdough bread needs a lively starter and a long, cold proof.";

pub async fn ingest_notes(engine: &RagEngine, notes: &[(&str, &str)]) {
    let documents = notes
        .iter()
        .map(|(path, text)| SourceDocument::from_text(*path, *text))
        .collect();
    let report = engine
        .ingest(documents, IngestOptions::default())
        .await
        .unwrap();
    assert!(report.failed.is_empty(), "failures: {:?}", report.failed);
}
