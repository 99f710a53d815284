//! Knowledge pipeline for EDITH.
//!
//! Ingestion turns documents into embedded, indexed fragments; answering
//! classifies a message, retrieves matching fragments, assembles a bounded
//! cited context and hands it to a generation backend.

pub mod assembler;
pub mod chunker;
pub mod classifier;
pub mod embeddings;
pub mod memory_index;
pub mod parser;
pub mod progress;
pub mod rag;
pub mod retriever;
pub mod sqlite_index;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use assembler::{assemble, AssembledContext, SourceRef};
pub use chunker::Chunker;
pub use classifier::{classify, explain, Classification, QueryMode};
pub use embeddings::{create_provider, Embedder, Embedding, EmbeddingProvider};
pub use memory_index::MemoryIndex;
pub use parser::{DocumentParser, ParsedDocument, TextParser};
pub use progress::{IngestPhase, ProgressEvent, ProgressReporter};
pub use rag::{
    discover_documents, AnswerPayload, CancelFlag, EngineComponents, EngineStats, IngestFailure,
    IngestOptions, IngestReport, IngestedDocument, QueryState, RagEngine, Role, SummaryStyle,
    Turn, NO_NOTES_MESSAGE,
};
pub use retriever::{Retrieval, Retriever};
pub use sqlite_index::SqliteIndex;
pub use types::{Document, DocumentFormat, Fragment, FragmentMetadata, SourceDocument};
pub use vector_index::{
    create_index, IndexEntry, IndexStats, MetadataFilter, RetrievalResult, UpsertReport,
    VectorIndex,
};
