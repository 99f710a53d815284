//! Rendering shared by the command handlers.
//!
//! Data goes to stdout; errors and progress go to stderr.

use edith_core::{AppError, AppResult};
use edith_knowledge::SourceRef;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print a failure as `kind: message`, or as an `ErrorReport` object.
pub fn print_error(err: &AppError, json: bool) {
    let report = err.report();
    if json {
        match serde_json::to_string_pretty(&serde_json::json!({ "error": report })) {
            Ok(text) => println!("{}", text),
            Err(_) => eprintln!("{}: {}", report.kind.as_str(), report.message),
        }
    } else {
        eprintln!("error[{}]: {}", report.kind.as_str(), report.message);
    }
}

pub fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for source in sources {
        println!(
            "  [{}] {} ({}, score {:.2})",
            source.citation, source.source_filename, source.location, source.score
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edith_core::ErrorKind;

    #[test]
    fn test_error_report_shape() {
        let err = AppError::Unavailable("connection refused".to_string());
        let value = serde_json::json!({ "error": err.report() });
        assert_eq!(value["error"]["kind"], "unavailable");
        assert!(value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
