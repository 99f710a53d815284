//! Context assembly: merge, number and budget retrieved fragments.

use crate::vector_index::RetrievalResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Separator between rendered blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Maximum snippet length for source references.
const MAX_SNIPPET_LENGTH: usize = 150;

/// A citation the answer may refer to as `[n]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub citation: usize,
    pub document_id: String,
    pub source_filename: String,
    /// Human-readable location, e.g. `chars 120-940`
    pub location: String,
    pub score: f32,
    pub snippet: String,
}

/// Bounded context text plus the sources that made it in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    pub sources: Vec<SourceRef>,
    /// Blocks dropped to stay within the budget
    pub dropped: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Contiguous text from one document, possibly spanning several fragments.
#[derive(Debug, Clone)]
struct Block {
    document_id: String,
    source_filename: String,
    start: usize,
    end: usize,
    text: String,
    score: f32,
}

impl Block {
    fn from_result(result: &RetrievalResult) -> Self {
        let meta = &result.metadata;
        Self {
            document_id: meta.document_id.clone(),
            source_filename: meta.source_filename.clone(),
            start: meta.char_start,
            end: meta.char_end,
            text: meta.text.clone(),
            score: result.score,
        }
    }

    fn overlaps(&self, other: &Block) -> bool {
        self.document_id == other.document_id && self.start < other.end && other.start < self.end
    }

    /// Extend to the union of both ranges, stitching the text.
    fn absorb(&mut self, other: Block) {
        let score = self.score.max(other.score);
        let mine = std::mem::take(&mut self.text);

        let (first, second) = if self.start <= other.start {
            ((self.start, self.end, mine), (other.start, other.end, other.text))
        } else {
            ((other.start, other.end, other.text), (self.start, self.end, mine))
        };
        let (start, first_end, mut text) = first;
        let (second_start, second_end, second_text) = second;

        if second_end > first_end {
            text.extend(second_text.chars().skip(first_end - second_start));
        }

        self.start = start;
        self.end = first_end.max(second_end);
        self.text = text;
        self.score = score;
    }

    fn render(&self, citation: usize) -> String {
        format!("[{}] Source: {}\n{}", citation, self.source_filename, self.text)
    }
}

/// Merge until no two blocks of the same document overlap. Blocks keep the
/// position of the earlier (higher-scoring) member.
fn merge_overlapping(mut blocks: Vec<Block>) -> Vec<Block> {
    'scan: loop {
        for i in 0..blocks.len() {
            for j in (i + 1)..blocks.len() {
                if blocks[i].overlaps(&blocks[j]) {
                    let other = blocks.remove(j);
                    blocks[i].absorb(other);
                    continue 'scan;
                }
            }
        }
        return blocks;
    }
}

/// Build a bounded, cited context from retrieved fragments.
///
/// Fragments are ranked by score, overlapping fragments of one document are
/// merged, and blocks are appended while the total stays within `max_chars`.
/// The first block that would overflow is dropped together with every block
/// after it; blocks are never cut.
pub fn assemble(results: &[RetrievalResult], max_chars: usize) -> AssembledContext {
    let mut ranked: Vec<&RetrievalResult> = results.iter().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let blocks = merge_overlapping(ranked.into_iter().map(Block::from_result).collect());
    let total_blocks = blocks.len();

    let separator_len = BLOCK_SEPARATOR.chars().count();
    let mut rendered: Vec<String> = Vec::new();
    let mut sources = Vec::new();
    let mut used = 0;

    for block in blocks {
        let citation = rendered.len() + 1;
        let text = block.render(citation);
        let cost = text.chars().count() + if rendered.is_empty() { 0 } else { separator_len };

        if used + cost > max_chars {
            break;
        }

        used += cost;
        sources.push(SourceRef {
            citation,
            location: format!("chars {}-{}", block.start, block.end),
            snippet: truncate_snippet(&block.text, MAX_SNIPPET_LENGTH),
            document_id: block.document_id,
            source_filename: block.source_filename,
            score: block.score,
        });
        rendered.push(text);
    }

    let dropped = total_blocks - rendered.len();
    if dropped > 0 {
        tracing::debug!(kept = rendered.len(), dropped, max_chars, "Context budget reached");
    }

    AssembledContext {
        text: rendered.join(BLOCK_SEPARATOR),
        sources,
        dropped,
    }
}

/// Shorten to at most `max_len` characters at a word boundary.
fn truncate_snippet(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_len).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) => format!("{}...", truncated[..last_space].trim_end()),
        None => format!("{}...", truncated),
    }
}
