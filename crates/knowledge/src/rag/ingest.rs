//! Ingestion: document → parser → chunker → embedder → vector index.
//!
//! Documents are processed one at a time and fail independently. Within a
//! document, every `batch_size` group is embedded before the previous
//! version is replaced, so an embedding failure keeps the stored fragments.
//! The cancellation flag is checked before each group; a cancelled run
//! writes only the whole batches it already embedded. An index failure
//! part-way through rolls the document back.

use crate::embeddings::Embedding;
use crate::rag::engine::RagEngine;
use crate::rag::types::{IngestFailure, IngestOptions, IngestReport, IngestedDocument};
use crate::types::{Document, DocumentContent, Fragment, FragmentMetadata, SourceDocument};
use crate::vector_index::{IndexEntry, MetadataFilter, UpsertReport};
use edith_core::{retry, with_timeout, AppError, AppResult};
use std::path::PathBuf;
use walkdir::WalkDir;

/// Extensions picked up when walking a directory without an explicit filter.
///
/// Binary formats are included so they show up as per-document failures
/// instead of being silently skipped.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "html", "htm", "pdf", "docx", "pptx", "png", "jpg", "jpeg",
];

/// Expand files and directories into ingestable documents.
///
/// Directories are walked recursively, skipping hidden entries such as
/// `.edith` and `.git`. Explicit file paths are always kept, even when they
/// do not exist, so the failure is reported against that path.
pub fn discover_documents(paths: &[PathBuf], extensions: &[String]) -> Vec<SourceDocument> {
    let wanted: Vec<String> = if extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect()
    };

    let mut documents = Vec::new();
    for path in paths {
        if !path.is_dir() {
            documents.push(SourceDocument::from_path(path));
            continue;
        }

        let walker = WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let matches = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| wanted.contains(&e.to_ascii_lowercase()));
            if matches {
                documents.push(SourceDocument::from_path(entry.path()));
            }
        }
    }

    tracing::debug!(documents = documents.len(), "Discovered documents");
    documents
}

/// Embedded entries of one batch, waiting to be written.
struct PreparedBatch {
    entries: Vec<IndexEntry>,
    skipped: usize,
}

/// Result of ingesting one document.
struct DocumentOutcome {
    ingested: IngestedDocument,
    cancelled: bool,
}

impl RagEngine {
    /// Ingest documents, replacing any fragments previously stored for them.
    ///
    /// Failures are recorded per document in the report. Only a
    /// configuration error aborts the run, since it would fail every
    /// remaining document the same way.
    pub async fn ingest(
        &self,
        documents: Vec<SourceDocument>,
        options: IngestOptions,
    ) -> AppResult<IngestReport> {
        let mut report = IngestReport::default();
        let total = documents.len();

        tracing::info!(documents = total, "Starting ingestion");

        for (position, document) in documents.into_iter().enumerate() {
            if options.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let source = document.source_path.display().to_string();
            options
                .progress
                .parse(position as u64 + 1, total as u64, &source);

            match self.ingest_document(document, &options).await {
                Ok(outcome) => {
                    report.total_fragments += outcome.ingested.fragments;
                    if !(outcome.cancelled && outcome.ingested.fragments == 0) {
                        report.succeeded.push(outcome.ingested);
                    }
                    if outcome.cancelled {
                        report.cancelled = true;
                        break;
                    }
                }
                Err(err @ AppError::Config(_)) => {
                    tracing::error!(source = %source, error = %err, "Ingestion aborted");
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        source = %source,
                        kind = %err.kind(),
                        error = %err,
                        "Document failed"
                    );
                    report.failed.push(IngestFailure::new(source, &err));
                }
            }
        }

        options.progress.done(report.succeeded.len(), total);
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            fragments = report.total_fragments,
            cancelled = report.cancelled,
            "Ingestion finished"
        );

        Ok(report)
    }

    async fn ingest_document(
        &self,
        source: SourceDocument,
        options: &IngestOptions,
    ) -> AppResult<DocumentOutcome> {
        let bytes = match source.content {
            DocumentContent::Bytes(bytes) => bytes,
            DocumentContent::File => tokio::fs::read(&source.source_path).await?,
        };

        let parsed = self.parser.parse(&bytes, source.format)?;
        let document = Document::new(&source.source_path, source.format, parsed.text);
        let source_name = document.source_path.clone();

        let fragments = self.chunker.chunk(&document.id, &document.raw_text);
        options.progress.chunk(&source_name, fragments.len());

        let mut ingested = IngestedDocument {
            document_id: document.id.clone(),
            source: source_name.clone(),
            fragments: 0,
            truncated: 0,
            failed_fragments: 0,
        };

        let batch_size = self.config.embedding.batch_size.max(1);
        let total = fragments.len();
        let mut prepared: Vec<PreparedBatch> = Vec::new();
        let mut cancelled = false;
        let mut done = 0;

        // Embed everything first so a failure leaves the stored version untouched
        for batch in fragments.chunks(batch_size) {
            if options.is_cancelled() {
                tracing::info!(source = %source_name, embedded = done, "Ingestion cancelled");
                cancelled = true;
                break;
            }

            let embeddings = self.embed_fragments(batch).await?;
            let entries: Vec<IndexEntry> = batch
                .iter()
                .zip(embeddings)
                .filter_map(|(fragment, embedding)| {
                    let embedding = embedding?;
                    Some(index_entry(&document, fragment, embedding))
                })
                .collect();

            let skipped = batch.len() - entries.len();
            done += batch.len();
            options.progress.embed(&source_name, done, total);
            prepared.push(PreparedBatch { entries, skipped });
        }

        if prepared.is_empty() && total > 0 {
            return Ok(DocumentOutcome {
                ingested,
                cancelled: true,
            });
        }

        let replaced = self.delete(&MetadataFilter::document(&document.id)).await?;
        if replaced > 0 {
            tracing::debug!(document_id = %document.id, replaced, "Replacing previous fragments");
        }

        for batch in prepared {
            let upserted = match self.upsert_entries(&batch.entries).await {
                Ok(upserted) => upserted,
                Err(err) => {
                    self.roll_back(&document.id).await;
                    return Err(err);
                }
            };

            for (fragment_id, reason) in &upserted.failed {
                tracing::warn!(fragment_id = %fragment_id, reason = %reason, "Fragment not indexed");
            }

            ingested.truncated += batch
                .entries
                .iter()
                .filter(|e| e.metadata.extra["truncated"].as_bool() == Some(true))
                .count();
            ingested.fragments += upserted.written;
            ingested.failed_fragments += batch.skipped + upserted.failed.len();

            options
                .progress
                .index(&source_name, ingested.fragments, self.index.backend_name());
        }

        if !cancelled && total > 0 && ingested.fragments == 0 {
            return Err(AppError::Index(format!(
                "None of the {} fragments of {} could be indexed",
                total, source_name
            )));
        }

        tracing::debug!(
            document_id = %document.id,
            fragments = ingested.fragments,
            truncated = ingested.truncated,
            cancelled,
            "Document ingested"
        );

        Ok(DocumentOutcome {
            ingested,
            cancelled,
        })
    }

    async fn upsert_entries(&self, entries: &[IndexEntry]) -> AppResult<UpsertReport> {
        let timeout = self.config.resilience.index_timeout();
        retry(&self.policy, "index upsert", || {
            with_timeout("index upsert", timeout, self.index.upsert(entries.to_vec()))
        })
        .await
    }

    /// Drop whatever part of a document made it into the index, so a
    /// failed document is reported and stored the same way.
    async fn roll_back(&self, document_id: &str) {
        match self.delete(&MetadataFilter::document(document_id)).await {
            Ok(removed) => {
                tracing::warn!(document_id = %document_id, removed, "Rolled back partial ingestion")
            }
            Err(err) => {
                tracing::warn!(document_id = %document_id, error = %err, "Rollback failed, index may hold a partial document")
            }
        }
    }

    /// Embed a batch in one call; if that fails, embed item by item so one
    /// bad fragment does not sink its neighbours. `None` marks a fragment
    /// that could not be embedded.
    async fn embed_fragments(&self, batch: &[Fragment]) -> AppResult<Vec<Option<Embedding>>> {
        let texts: Vec<String> = batch.iter().map(|f| f.text.clone()).collect();

        let err = match retry(&self.policy, "embedding batch", || {
            self.embedder.embed_batch(&texts)
        })
        .await
        {
            Ok(embeddings) => return Ok(embeddings.into_iter().map(Some).collect()),
            // Per-fragment calls would hit the same dead or slow server
            Err(
                err @ (AppError::Config(_)
                | AppError::Timeout { .. }
                | AppError::Unavailable(_)),
            ) => return Err(err),
            Err(err) => err,
        };

        tracing::warn!(error = %err, fragments = batch.len(), "Batch embedding failed, retrying per fragment");

        let mut embeddings = Vec::with_capacity(texts.len());
        for (fragment, text) in batch.iter().zip(&texts) {
            match retry(&self.policy, "embedding", || self.embedder.embed(text)).await {
                Ok(embedding) => embeddings.push(Some(embedding)),
                Err(err @ AppError::Config(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!(fragment_id = %fragment.fragment_id, error = %err, "Fragment not embedded");
                    embeddings.push(None);
                }
            }
        }

        if embeddings.iter().all(Option::is_none) {
            return Err(err);
        }
        Ok(embeddings)
    }
}

fn index_entry(document: &Document, fragment: &Fragment, embedding: Embedding) -> IndexEntry {
    IndexEntry {
        fragment_id: fragment.fragment_id.clone(),
        vector: embedding.vector,
        metadata: FragmentMetadata {
            document_id: document.id.clone(),
            source_filename: document.source_filename(),
            sequence_index: fragment.sequence_index,
            char_start: fragment.char_start,
            char_end: fragment.char_end,
            text: fragment.text.clone(),
            extra: serde_json::json!({
                "format": document.format.as_str(),
                "source_path": document.source_path,
                "ingested_at": document.ingested_at.to_rfc3339(),
                "truncated": embedding.truncated,
            }),
        },
    }
}
