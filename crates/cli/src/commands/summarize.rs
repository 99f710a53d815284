//! Summarize command handler.

use super::output;
use clap::Args;
use edith_core::{config::AppConfig, AppResult};
use edith_knowledge::{RagEngine, SummaryStyle};

/// Summarize everything in the index
#[derive(Args, Debug)]
pub struct SummarizeCommand {
    /// Summary layout (comprehensive, bullet, brief)
    #[arg(long, default_value = "comprehensive")]
    pub style: SummaryStyle,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SummarizeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(style = %self.style, "Executing summarize command");

        let engine = RagEngine::from_config(config)?;
        let summary = engine.summarize(self.style).await?;

        if self.json {
            output::print_json(&serde_json::json!({
                "style": self.style,
                "summary": summary,
            }))
        } else {
            println!("{}", summary);
            Ok(())
        }
    }
}
