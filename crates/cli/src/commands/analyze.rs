//! Analyze command handler.
//!
//! Reads one text note from disk and asks for its category, key topics and
//! action items. The note is not added to the index.

use super::output;
use clap::Args;
use edith_core::{config::AppConfig, AppError, AppResult};
use edith_knowledge::RagEngine;
use std::path::PathBuf;

/// Analyze one note
#[derive(Args, Debug)]
pub struct AnalyzeCommand {
    /// Note to analyze
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AnalyzeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing analyze command for {:?}", self.file);

        let note = tokio::fs::read_to_string(&self.file).await.map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", self.file.display(), e),
            ))
        })?;

        let engine = RagEngine::from_config(config)?;
        let analysis = engine.analyze(&note).await?;

        if self.json {
            output::print_json(&serde_json::json!({
                "file": self.file,
                "analysis": analysis,
            }))
        } else {
            println!("{}", analysis);
            Ok(())
        }
    }
}
