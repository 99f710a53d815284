//! Text chunking with configurable size, overlap and boundary snapping.
//!
//! Offsets are character offsets, not byte offsets, so multi-byte text is
//! never split inside a code point.

use crate::types::Fragment;
use edith_core::config::ChunkingSettings;
use edith_core::{AppError, AppResult};

/// Splits document text into overlapping fragments.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    boundary_window: usize,
}

impl Chunker {
    /// Rejects `chunk_size == 0` and `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            overlap,
            boundary_window: chunk_size,
        })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> AppResult<Self> {
        Ok(Self::new(settings.chunk_size, settings.overlap)?
            .with_boundary_window(settings.boundary_window))
    }

    /// Upper bound on how far an end may move back to reach a boundary.
    /// The effective window is also capped by the overlap.
    pub fn with_boundary_window(mut self, boundary_window: usize) -> Self {
        self.boundary_window = boundary_window;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk `text` into fragments of `document_id`.
    ///
    /// Whitespace-only text yields no fragments. Fragments are ordered by
    /// `sequence_index` and their ranges cover the whole text.
    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Fragment> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let step = self.chunk_size - self.overlap;

        let mut fragments = Vec::new();
        let mut start = 0;

        loop {
            let hi = (start + self.chunk_size).min(len);
            let end = if hi == len {
                len
            } else {
                self.snap_end(&chars, start, hi)
            };

            let sequence_index = fragments.len();
            fragments.push(Fragment {
                fragment_id: Fragment::id_for(document_id, sequence_index),
                document_id: document_id.to_string(),
                sequence_index,
                text: chars[start..end].iter().collect(),
                char_start: start,
                char_end: end,
            });

            if hi == len {
                break;
            }
            start += step;
        }

        tracing::debug!(
            document_id,
            fragments = fragments.len(),
            chunk_size = self.chunk_size,
            overlap = self.overlap,
            "Chunked document"
        );

        fragments
    }

    /// Move `hi` back to the best boundary in `[hi - window, hi]`.
    ///
    /// The window never reaches below the next window's start, so snapping
    /// cannot open a gap between fragments.
    fn snap_end(&self, chars: &[char], start: usize, hi: usize) -> usize {
        let window = self.boundary_window.min(self.overlap);
        let lo = hi.saturating_sub(window).max(start + 1);

        let paragraph = |e: usize| e >= 2 && chars[e - 2] == '\n' && chars[e - 1] == '\n';
        let sentence = |e: usize| {
            matches!(chars[e - 1], '.' | '!' | '?') && chars.get(e).is_some_and(|c| c.is_whitespace())
        };
        let word = |e: usize| {
            !chars[e - 1].is_whitespace() && chars.get(e).is_some_and(|c| c.is_whitespace())
        };

        latest_in(lo, hi, paragraph)
            .or_else(|| latest_in(lo, hi, sentence))
            .or_else(|| latest_in(lo, hi, word))
            .unwrap_or(hi)
    }
}

fn latest_in(lo: usize, hi: usize, is_boundary: impl Fn(usize) -> bool) -> Option<usize> {
    (lo..=hi).rev().find(|&e| is_boundary(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(fragments: &[Fragment]) -> Vec<(usize, usize)> {
        fragments.iter().map(|f| (f.char_start, f.char_end)).collect()
    }

    #[test]
    fn test_rejects_invalid_sizes() {
        assert!(matches!(Chunker::new(0, 0), Err(AppError::Config(_))));
        assert!(matches!(Chunker::new(100, 100), Err(AppError::Config(_))));
        assert!(Chunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        let chunker = Chunker::new(100, 10).unwrap();
        assert!(chunker.chunk("doc", "").is_empty());
        assert!(chunker.chunk("doc", "  \n\t ").is_empty());
    }

    #[test]
    fn test_short_text_is_one_fragment() {
        let chunker = Chunker::new(100, 10).unwrap();
        let fragments = chunker.chunk("doc", "Short note.");

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "Short note.");
        assert_eq!(fragments[0].fragment_id, "doc#0");
        assert_eq!((fragments[0].char_start, fragments[0].char_end), (0, 11));
    }

    #[test]
    fn test_snaps_to_word_boundaries() {
        let chunker = Chunker::new(20, 5).unwrap();
        let fragments = chunker.chunk("doc", "The cat sat. The dog ran. The bird flew.");

        assert_eq!(spans(&fragments), vec![(0, 20), (15, 34), (30, 40)]);
        assert_eq!(fragments[0].text, "The cat sat. The dog");
        assert_eq!(fragments[1].text, "e dog ran. The bird");
        assert_eq!(fragments[2].text, "bird flew.");
    }

    #[test]
    fn test_prefers_paragraph_over_sentence() {
        let chunker = Chunker::new(20, 8).unwrap();
        let text = "First one here.\n\nTwo. Next para text goes on";
        let fragments = chunker.chunk("doc", text);

        // the sentence end at 15 is also in range but paragraphs rank first
        assert_eq!(fragments[0].char_end, 17);
        assert_eq!(fragments[0].text, "First one here.\n\n");
    }

    #[test]
    fn test_prefers_sentence_over_word() {
        let chunker = Chunker::new(20, 8).unwrap();
        let fragments = chunker.chunk("doc", "Alpha beta gamma. Delta epsilon zeta eta");

        assert_eq!(fragments[0].text, "Alpha beta gamma.");
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let chunker = Chunker::new(10, 3).unwrap();
        let text = "a".repeat(25);
        let fragments = chunker.chunk("doc", &text);

        assert_eq!(spans(&fragments), vec![(0, 10), (7, 17), (14, 24), (21, 25)]);
    }

    #[test]
    fn test_fragments_cover_text_with_overlap() {
        let chunker = Chunker::new(50, 10).unwrap();
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(12);
        let fragments = chunker.chunk("doc", &text);
        let len = text.chars().count();

        assert_eq!(fragments.first().unwrap().char_start, 0);
        assert_eq!(fragments.last().unwrap().char_end, len);
        for pair in fragments.windows(2) {
            assert!(pair[0].char_end > pair[0].char_start);
            // contiguous coverage
            assert!(pair[0].char_end >= pair[1].char_start);
            // overlap never exceeds the configured amount
            assert!(pair[0].char_end - pair[1].char_start <= 10);
            assert_eq!(pair[1].sequence_index, pair[0].sequence_index + 1);
        }
    }

    #[test]
    fn test_multibyte_text_uses_char_offsets() {
        let chunker = Chunker::new(8, 2).unwrap();
        let text = "日本語のテキストを分割する";
        let fragments = chunker.chunk("doc", text);

        let rebuilt: Vec<char> = text.chars().collect();
        for f in &fragments {
            let expected: String = rebuilt[f.char_start..f.char_end].iter().collect();
            assert_eq!(f.text, expected);
        }
        assert_eq!(fragments.last().unwrap().char_end, rebuilt.len());
    }
}
