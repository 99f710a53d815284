//! Types exchanged with callers of the RAG engine.

use crate::assembler::SourceRef;
use crate::classifier::QueryMode;
use crate::progress::ProgressReporter;
use edith_core::{AppError, ErrorKind};
use edith_prompt::{ids, HistoryTurn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior exchange, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

impl From<&Turn> for HistoryTurn {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        HistoryTurn {
            role: role.to_string(),
            text: turn.text.clone(),
        }
    }
}

/// Steps a query moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Received,
    Classified,
    Retrieving,
    Retrieved,
    /// Retrieval skipped for casual messages
    Skipped,
    ContextBuilt,
    Generating,
    Answered,
    Failed,
}

/// Answer plus its grounding.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerPayload {
    pub answer: String,
    pub mode: QueryMode,
    /// Top retrieval score clamped to [0, 1]; 0 when nothing was retrieved.
    /// This measures retrieval, not the correctness of the answer.
    pub confidence: f32,
    pub sources: Vec<SourceRef>,
    pub num_sources: usize,
    /// Whether the answer was generated from retrieved notes
    pub grounded: bool,
    pub query_truncated: bool,
    #[serde(skip)]
    pub trace: Vec<QueryState>,
}

/// Summary layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Comprehensive,
    Bullet,
    Brief,
}

impl SummaryStyle {
    pub fn prompt_id(&self) -> &'static str {
        match self {
            Self::Comprehensive => ids::SUMMARY_COMPREHENSIVE,
            Self::Bullet => ids::SUMMARY_BULLET,
            Self::Brief => ids::SUMMARY_BRIEF,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comprehensive => "comprehensive",
            Self::Bullet => "bullet",
            Self::Brief => "brief",
        }
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStyle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "comprehensive" => Ok(Self::Comprehensive),
            "bullet" | "bullets" => Ok(Self::Bullet),
            "brief" => Ok(Self::Brief),
            other => Err(AppError::Config(format!(
                "Unknown summary style: '{}'. Supported: comprehensive, bullet, brief",
                other
            ))),
        }
    }
}

/// Shared flag checked between ingestion batches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ingestion knobs supplied per call.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub cancel: Option<CancelFlag>,
    pub progress: ProgressReporter,
}

impl IngestOptions {
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

/// A document whose fragments were written.
#[derive(Debug, Clone, Serialize)]
pub struct IngestedDocument {
    pub document_id: String,
    pub source: String,
    pub fragments: usize,
    /// Fragments whose embedding input was truncated
    pub truncated: usize,
    /// Fragments the index refused
    pub failed_fragments: usize,
}

/// A document that could not be ingested.
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub source: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl IngestFailure {
    pub fn new(source: impl Into<String>, err: &AppError) -> Self {
        Self {
            source: source.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub succeeded: Vec<IngestedDocument>,
    pub failed: Vec<IngestFailure>,
    pub total_fragments: usize,
    pub cancelled: bool,
}

/// Index and backend overview.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub fragments: usize,
    pub dimension: usize,
    pub fill_ratio: f32,
    pub index_backend: String,
    pub namespace: String,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub llm_provider: String,
    pub llm_model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_style_parsing() {
        assert_eq!("bullet".parse::<SummaryStyle>().unwrap(), SummaryStyle::Bullet);
        assert_eq!("BRIEF".parse::<SummaryStyle>().unwrap(), SummaryStyle::Brief);
        assert!(matches!(
            "poem".parse::<SummaryStyle>(),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_turn_to_history() {
        let history: HistoryTurn = (&Turn::assistant("Hi there")).into();
        assert_eq!(history.role, "Assistant");
        assert_eq!(history.text, "Hi there");
    }

    #[test]
    fn test_payload_omits_trace() {
        let payload = AnswerPayload {
            answer: "42".to_string(),
            mode: QueryMode::Knowledge,
            confidence: 0.8,
            sources: Vec::new(),
            num_sources: 0,
            grounded: true,
            query_truncated: false,
            trace: vec![QueryState::Received, QueryState::Answered],
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["mode"], "knowledge");
        assert!(json.get("trace").is_none());
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let options = IngestOptions::default().with_cancel(flag.clone());
        assert!(!options.is_cancelled());
        flag.cancel();
        assert!(options.is_cancelled());
    }
}
