//! Document parsing and text extraction.
//!
//! Only text formats are extracted in-process. Binary formats (PDF, Office,
//! images) are recognised so they can be reported, but fail per document.

use crate::types::DocumentFormat;
use edith_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Text extracted from a document plus parser-specific metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Turns raw document bytes into text.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8], format: DocumentFormat) -> AppResult<ParsedDocument>;
}

/// Built-in parser for plain text, Markdown and HTML.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

impl TextParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for TextParser {
    fn parse(&self, bytes: &[u8], format: DocumentFormat) -> AppResult<ParsedDocument> {
        if !format.is_text() {
            return Err(AppError::Parse(format!(
                "{} documents are not supported by the text parser",
                format.as_str()
            )));
        }

        let raw = std::str::from_utf8(bytes)
            .map_err(|e| AppError::Parse(format!("Document is not valid UTF-8: {}", e)))?;

        if raw.contains('\0') {
            return Err(AppError::Parse(
                "Document looks like binary data".to_string(),
            ));
        }

        let text = match format {
            DocumentFormat::Markdown => clean_markdown(raw),
            DocumentFormat::Html => clean_html(raw),
            _ => raw.trim().to_string(),
        };

        Ok(ParsedDocument {
            metadata: serde_json::json!({
                "format": format.as_str(),
                "bytes": bytes.len(),
                "chars": text.chars().count(),
            }),
            text,
        })
    }
}

/// Strip Markdown headers, rules and code fences; keep paragraph breaks.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut blank_pending = false;

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~")
        {
            continue;
        }

        if trimmed.is_empty() {
            blank_pending = !result.is_empty();
            continue;
        }

        if blank_pending {
            result.push('\n');
            blank_pending = false;
        }
        result.push_str(trimmed);
        result.push('\n');
    }

    result.trim().to_string()
}

/// Strip HTML tags, scripts and styles; collapse whitespace.
fn clean_html(text: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let mut result = String::with_capacity(text.len());
    let mut skip_until: Option<&str> = None;
    let mut in_tag = false;

    for (i, ch) in text.char_indices() {
        if let Some(closing) = skip_until {
            if lower[i..].starts_with(closing) {
                skip_until = None;
                in_tag = true;
            }
            continue;
        }

        if in_tag {
            if ch == '>' {
                in_tag = false;
                result.push(' ');
            }
            continue;
        }

        if ch == '<' {
            in_tag = true;
            if lower[i..].starts_with("<script") {
                skip_until = Some("</script");
            } else if lower[i..].starts_with("<style") {
                skip_until = Some("</style");
            }
        } else {
            result.push(ch);
        }
    }

    decode_entities(&result.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
