//! Classify command handler.
//!
//! Runs only the routing classifier; no backend is contacted.

use super::output;
use clap::Args;
use edith_core::AppResult;
use edith_knowledge::explain;

/// Show how a message would be routed
#[derive(Args, Debug)]
pub struct ClassifyCommand {
    /// Message to classify
    pub text: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ClassifyCommand {
    pub fn execute(&self) -> AppResult<()> {
        let classification = explain(&self.text);

        if self.json {
            return output::print_json(&classification);
        }

        println!("Mode:       {}", classification.mode);
        println!(
            "Scores:     knowledge {} / casual {}",
            classification.knowledge_score, classification.casual_score
        );
        println!("Confidence: {:.2}", classification.confidence);
        println!("Reason:     {}", classification.reason);

        Ok(())
    }
}
