//! Ingest command handler.
//!
//! Walks the given paths, feeds every matching file to the engine and prints
//! the per-document report. Ctrl-C stops the run after the current batch.

use super::output;
use clap::Args;
use edith_core::{config::AppConfig, AppResult};
use edith_knowledge::{
    discover_documents, CancelFlag, IngestOptions, IngestReport, ProgressEvent, ProgressReporter,
    RagEngine,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Add files or folders to the index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only pick up these extensions when walking directories (repeatable)
    #[arg(long = "include", value_name = "EXT")]
    pub include: Vec<String>,

    /// Hide progress lines
    #[arg(short, long)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");
        tracing::debug!("Ingest options: {:?}", self);

        let documents = discover_documents(&self.paths, &self.include);
        if documents.is_empty() {
            println!("No matching documents found");
            return Ok(());
        }

        let engine = RagEngine::from_config(config)?;

        let cancel = CancelFlag::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Cancelling after the current batch...");
                    cancel.cancel();
                }
            })
        };

        let mut options = IngestOptions::default().with_cancel(cancel);
        if !self.quiet && !self.json {
            options = options.with_progress(ProgressReporter::new(Arc::new(
                |event: ProgressEvent| eprintln!("{}", event.format_simple()),
            )));
        }

        let result = engine.ingest(documents, options).await;
        watcher.abort();
        let report = result?;

        if self.json {
            output::print_json(&report)
        } else {
            print_report(&report);
            Ok(())
        }
    }
}

fn print_report(report: &IngestReport) {
    println!(
        "Ingested {} document(s), {} fragment(s)",
        report.succeeded.len(),
        report.total_fragments
    );

    for doc in &report.succeeded {
        let mut notes = Vec::new();
        if doc.truncated > 0 {
            notes.push(format!("{} truncated", doc.truncated));
        }
        if doc.failed_fragments > 0 {
            notes.push(format!("{} failed", doc.failed_fragments));
        }
        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", "))
        };
        println!(
            "  ok    {} [{}] {} fragment(s){}",
            doc.source, doc.document_id, doc.fragments, suffix
        );
    }

    for failure in &report.failed {
        println!(
            "  fail  {} [{}] {}",
            failure.source,
            failure.kind.as_str(),
            failure.message
        );
    }

    if report.cancelled {
        println!("Cancelled; remaining documents were skipped");
    }
}
