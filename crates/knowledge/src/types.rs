//! Document and fragment types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Source document formats EDITH recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Html,
    Pdf,
    Docx,
    Pptx,
    Image,
}

impl DocumentFormat {
    /// Detect the format from a file extension.
    ///
    /// Unrecognised extensions are treated as plain text; the parser rejects
    /// them later if the bytes turn out not to be text.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            Some("pptx") => Self::Pptx,
            Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("bmp")
            | Some("tiff") | Some("webp") => Self::Image,
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Image => "image",
        }
    }

    /// Whether the built-in text parser can extract this format.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text | Self::Markdown | Self::Html)
    }
}

/// Where the bytes of a source document come from.
#[derive(Debug, Clone)]
pub enum DocumentContent {
    /// Read from `source_path` when the document is ingested.
    File,
    /// Already in memory.
    Bytes(Vec<u8>),
}

/// A document handed to ingestion.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source_path: PathBuf,
    pub format: DocumentFormat,
    pub content: DocumentContent,
}

impl SourceDocument {
    /// A file on disk, read lazily during ingestion.
    ///
    /// The path is canonicalised so every spelling of the same file maps to
    /// one document id. Paths that cannot be resolved, such as missing
    /// files, are normalised lexically instead.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source_path = std::fs::canonicalize(&path).unwrap_or_else(|_| normalize_path(&path));
        let format = DocumentFormat::from_path(&source_path);
        Self {
            source_path,
            format,
            content: DocumentContent::File,
        }
    }

    /// In-memory text attributed to `path`.
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let source_path = normalize_path(&path.into());
        let format = DocumentFormat::from_path(&source_path);
        Self {
            source_path,
            format,
            content: DocumentContent::Bytes(text.into().into_bytes()),
        }
    }

    /// File name used in citations.
    pub fn source_filename(&self) -> String {
        source_filename(&self.source_path)
    }

    pub fn document_id(&self) -> String {
        document_id(&self.source_path.to_string_lossy())
    }
}

/// A parsed document. Immutable once created; re-ingestion replaces it by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub raw_text: String,
    pub format: DocumentFormat,
    pub source_path: String,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    pub fn new(source_path: &Path, format: DocumentFormat, raw_text: String) -> Self {
        let source_path = source_path.to_string_lossy().to_string();
        Self {
            id: document_id(&source_path),
            raw_text,
            format,
            source_path,
            ingested_at: Utc::now(),
        }
    }

    pub fn source_filename(&self) -> String {
        source_filename(Path::new(&self.source_path))
    }
}

/// Stable document id: first 16 hex characters of the SHA-256 of the path.
pub fn document_id(source_path: &str) -> String {
    let digest = Sha256::digest(source_path.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Drop `.` segments and fold `name/..` pairs without touching the disk.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

fn source_filename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// A contiguous, character-addressed piece of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub fragment_id: String,
    pub document_id: String,
    pub sequence_index: usize,
    pub text: String,
    /// Inclusive start, in characters
    pub char_start: usize,
    /// Exclusive end, in characters
    pub char_end: usize,
}

impl Fragment {
    pub fn id_for(document_id: &str, sequence_index: usize) -> String {
        format!("{}#{}", document_id, sequence_index)
    }
}

/// Everything stored next to a vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    pub document_id: String,
    pub source_filename: String,
    pub sequence_index: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
    /// Format, source path, ingestion time, truncation flag
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl FragmentMetadata {
    /// Char range rendered for humans, e.g. `chars 0-20`.
    pub fn location(&self) -> String {
        format!("chars {}-{}", self.char_start, self.char_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_stable_and_short() {
        let a = document_id("/notes/ml.md");
        let b = document_id("/notes/ml.md");
        let c = document_id("/notes/cooking.md");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a.MD")),
            DocumentFormat::Markdown
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("page.htm")),
            DocumentFormat::Html
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("scan.jpeg")),
            DocumentFormat::Image
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("notes")),
            DocumentFormat::Text
        );
        assert!(!DocumentFormat::Pdf.is_text());
    }

    #[test]
    fn test_path_spellings_share_a_document_id() {
        let plain = SourceDocument::from_text("notes/a.md", "x");
        let dotted = SourceDocument::from_text("./notes/./a.md", "x");
        let parent = SourceDocument::from_text("notes/sub/../a.md", "x");

        assert_eq!(plain.document_id(), dotted.document_id());
        assert_eq!(plain.document_id(), parent.document_id());
        assert_eq!(dotted.source_path, PathBuf::from("notes/a.md"));
    }

    #[test]
    fn test_normalize_path_keeps_leading_parents() {
        assert_eq!(normalize_path(Path::new("../a/./b.md")), PathBuf::from("../a/b.md"));
        assert_eq!(normalize_path(Path::new("/../a.md")), PathBuf::from("/a.md"));
        assert_eq!(normalize_path(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_source_document_from_text() {
        let doc = SourceDocument::from_text("/tmp/notes/ml.md", "# ML");
        assert_eq!(doc.format, DocumentFormat::Markdown);
        assert_eq!(doc.source_filename(), "ml.md");
        assert_eq!(doc.document_id(), document_id("/tmp/notes/ml.md"));
    }

    #[test]
    fn test_fragment_id_format() {
        assert_eq!(Fragment::id_for("abc", 3), "abc#3");
    }
}
