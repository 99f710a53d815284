//! Error types for EDITH.
//!
//! This module defines a unified error enum that covers every failure category
//! in the assistant: configuration, external backends (transient or
//! unavailable), timeouts, per-document parse failures, embedding, index,
//! prompt and serialization errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unified error type for EDITH.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic. Errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors (bad sizes, dimension mismatch, missing credentials)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Retryable failure of an external service (network blip, 5xx, 429)
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// External service unreachable or rejecting the request
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A bounded wait expired
    #[error("Timed out after {secs}s waiting for {operation}")]
    Timeout { operation: String, secs: u64 },

    /// Document could not be turned into text
    #[error("Parse error: {0}")]
    Parse(String),

    /// Embedding generation errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index errors
    #[error("Index error: {0}")]
    Index(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Io,
    Transient,
    Unavailable,
    Timeout,
    Parse,
    Embedding,
    Index,
    Prompt,
    Serialization,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Io => "io",
            Self::Transient => "transient",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Parse => "parse",
            Self::Embedding => "embedding",
            Self::Index => "index",
            Self::Prompt => "prompt",
            Self::Serialization => "serialization",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Embedding(_) => ErrorKind::Embedding,
            Self::Index(_) => ErrorKind::Index,
            Self::Prompt(_) => ErrorKind::Prompt,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// Only transient backend failures and timeouts qualify. Configuration
    /// errors and unavailable backends fail the request immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }

    /// Structured form handed to front ends for rendering.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// A failure with a kind and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
