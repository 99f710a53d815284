//! Command handlers for the EDITH CLI.
//!
//! Each command builds its own engine from the final configuration.

pub mod analyze;
pub mod ask;
pub mod chat;
pub mod classify;
pub mod delete;
pub mod ingest;
pub mod output;
pub mod stats;
pub mod summarize;

pub use analyze::AnalyzeCommand;
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use classify::ClassifyCommand;
pub use delete::{ClearCommand, DeleteCommand};
pub use ingest::IngestCommand;
pub use stats::StatsCommand;
pub use summarize::SummarizeCommand;
