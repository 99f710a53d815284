//! Classification of HTTP failures into retryable and fatal errors.
//!
//! Shared by every HTTP-backed provider, including the embedding providers
//! in the knowledge crate.

use edith_core::AppError;
use reqwest::StatusCode;

/// Map a failure to send a request (or read its body) to an `AppError`.
///
/// Timeouts and dropped connections are transient; a refused connection
/// means the backend is not running and retrying will not help.
pub fn classify_send_error(service: &str, err: &reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Transient(format!("{} request timed out: {}", service, err))
    } else if err.is_connect() {
        AppError::Unavailable(format!("{} is not reachable: {}", service, err))
    } else if err.is_builder() || err.is_decode() {
        AppError::Unavailable(format!("{} request failed: {}", service, err))
    } else {
        AppError::Transient(format!("{} request failed: {}", service, err))
    }
}

/// Map a non-success HTTP status to an `AppError`.
///
/// 429 and 5xx are transient; any other status (unknown model, bad request,
/// auth failure) is reported as unavailable.
pub fn classify_status(service: &str, status: StatusCode, body: &str) -> AppError {
    let message = format!("{} API error ({}): {}", service, status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AppError::Transient(message)
    } else {
        AppError::Unavailable(message)
    }
}

/// Malformed success responses are a backend contract violation.
pub fn malformed_response(service: &str, detail: impl std::fmt::Display) -> AppError {
    AppError::Unavailable(format!("Failed to parse {} response: {}", service, detail))
}
