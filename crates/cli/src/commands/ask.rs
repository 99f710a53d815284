//! Ask command handler.
//!
//! One question, no history. The answer goes to stdout, followed by the
//! numbered sources it was grounded in.

use super::output;
use clap::Args;
use edith_core::{config::AppConfig, AppResult};
use edith_knowledge::{MetadataFilter, RagEngine};

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Restrict retrieval to one document id
    #[arg(long, value_name = "ID")]
    pub document: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask options: {:?}", self);

        let engine = RagEngine::from_config(config)?;
        let filter = self.document.as_ref().map(MetadataFilter::document);

        let payload = engine
            .query_filtered(&self.question, &[], filter.as_ref())
            .await?;

        if self.json {
            return output::print_json(&payload);
        }

        println!("{}", payload.answer);
        output::print_sources(&payload.sources);

        tracing::debug!(
            mode = %payload.mode,
            confidence = payload.confidence,
            grounded = payload.grounded,
            "Answer delivered"
        );

        Ok(())
    }
}
