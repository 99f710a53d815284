//! Retrieval-augmented answering over the indexed notes.

pub mod engine;
pub mod ingest;
pub mod types;

pub use engine::{EngineComponents, RagEngine, NO_NOTES_MESSAGE};
pub use ingest::{discover_documents, DEFAULT_EXTENSIONS};
pub use types::{
    AnswerPayload, CancelFlag, EngineStats, IngestFailure, IngestOptions, IngestReport,
    IngestedDocument, QueryState, Role, SummaryStyle, Turn,
};
