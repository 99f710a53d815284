//! Delete and clear command handlers.

use super::output;
use clap::Args;
use edith_core::{config::AppConfig, AppError, AppResult};
use edith_knowledge::RagEngine;

/// Remove one document from the index
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Document id, as printed by `ingest`
    pub document_id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing delete command for {}", self.document_id);

        let engine = RagEngine::from_config(config)?;
        let removed = engine.delete_document(&self.document_id).await?;

        if self.json {
            output::print_json(&serde_json::json!({
                "documentId": self.document_id,
                "removed": removed,
            }))
        } else {
            if removed == 0 {
                println!("No fragments found for document {}", self.document_id);
            } else {
                println!("Removed {} fragment(s)", removed);
            }
            Ok(())
        }
    }
}

/// Remove every document from the index
#[derive(Args, Debug)]
pub struct ClearCommand {
    /// Confirm removal of the whole index
    #[arg(short, long)]
    pub yes: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ClearCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing clear command");

        if !self.yes {
            return Err(AppError::Config(
                "Refusing to clear the index without --yes".to_string(),
            ));
        }

        let engine = RagEngine::from_config(config)?;
        let removed = engine.clear().await?;

        if self.json {
            output::print_json(&serde_json::json!({ "removed": removed }))
        } else {
            println!("Removed {} fragment(s)", removed);
            Ok(())
        }
    }
}
