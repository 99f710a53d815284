//! Stats command handler.

use super::output;
use clap::Args;
use edith_core::{config::AppConfig, AppResult};
use edith_knowledge::RagEngine;

/// Show index and backend statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let engine = RagEngine::from_config(config)?;
        let stats = engine.stats().await?;

        if self.json {
            return output::print_json(&stats);
        }

        println!("Index:      {} ({})", stats.namespace, stats.index_backend);
        println!("Fragments:  {}", stats.fragments);
        println!("Dimension:  {}", stats.dimension);
        println!("Fill ratio: {:.1}%", stats.fill_ratio * 100.0);
        println!(
            "Embedding:  {} / {}",
            stats.embedding_provider, stats.embedding_model
        );
        println!("Generation: {} / {}", stats.llm_provider, stats.llm_model);

        Ok(())
    }
}
