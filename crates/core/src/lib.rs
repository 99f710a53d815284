//! EDITH Core Library
//!
//! This crate provides the foundational utilities shared by every EDITH crate:
//! - Error handling (`AppError`, `AppResult`, `ErrorKind`)
//! - Logging infrastructure
//! - Configuration management
//! - Timeouts and retries for external calls

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorKind, ErrorReport};
pub use retry::{retry, with_timeout, RetryPolicy};
