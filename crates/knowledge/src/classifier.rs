//! Query classification: does a message need the notes at all?
//!
//! A keyword and phrase heuristic, cheap enough to run on every message and
//! unable to fail. Anything it cannot decide is treated as hybrid, so the
//! notes are consulted rather than ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a message is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Answer from the notes
    Knowledge,
    /// Small talk; retrieval is skipped
    Casual,
    /// Conversational, but the notes may help
    Hybrid,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Casual => "casual",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub mode: QueryMode,
    pub knowledge_score: u32,
    pub casual_score: u32,
    /// Share of the total score held by the winning side, in [0, 1]
    pub confidence: f32,
    pub reason: String,
}

/// Score at which a side counts as strong.
const STRONG: u32 = 2;

const CASUAL_PHRASES: &[&str] = &[
    "what's up",
    "whats up",
    "how are you",
    "how's it going",
    "who are you",
    "your name",
];

const LEADING_PHRASES: &[&str] = &[
    "what is",
    "what are",
    "what was",
    "what were",
    "what does",
    "what do",
    "how does",
    "how do",
    "how to",
    "how can",
    "why",
    "when",
    "where",
    "who is",
    "who was",
    "which",
    "explain",
    "define",
    "describe",
    "tell me about",
    "summarize",
    "list",
    "compare",
    "show me",
    "find",
    "search",
    "look up",
];

const KNOWLEDGE_WORDS: &[&str] = &[
    "what",
    "how",
    "why",
    "when",
    "where",
    "which",
    "explain",
    "define",
    "describe",
    "summarize",
    "list",
    "compare",
    "difference",
    "example",
    "meaning",
    "purpose",
    "concept",
    "notes",
    "document",
    "documents",
    "find",
    "search",
];

const KNOWLEDGE_PHRASES: &[&str] = &["tell me about", "information about", "show me", "look up"];

const CASUAL_WORDS: &[&str] = &[
    "hello", "hi", "hey", "yo", "sup", "thanks", "thx", "bye", "goodbye", "okay", "ok", "cool",
    "nice", "great", "awesome", "lol",
];

const CASUAL_MULTIWORD: &[&str] = &[
    "thank you",
    "good morning",
    "good evening",
    "good night",
];

/// Classify a message. Never fails; empty or garbled input is hybrid.
pub fn classify(query: &str) -> QueryMode {
    explain(query).mode
}

/// Classify a message and report both scores and the reason.
pub fn explain(query: &str) -> Classification {
    let lower = query.to_lowercase();
    let has_question_mark = lower.contains('?');

    let mut casual = 0u32;
    let mut knowledge = 0u32;

    // Casual phrases are removed so "what's up" does not read as "what"
    let mut remaining = format!(" {} ", normalize(&lower));
    for phrase in CASUAL_PHRASES {
        let needle = format!(" {} ", normalize(phrase));
        while let Some(pos) = remaining.find(&needle) {
            casual += 3;
            remaining.replace_range(pos..pos + needle.len(), " ");
        }
    }

    let all_tokens = tokens(&normalize(&lower));
    let tokens = tokens(&remaining);
    let joined = tokens.join(" ");

    if LEADING_PHRASES
        .iter()
        .any(|p| starts_with_phrase(&tokens, p))
    {
        knowledge += 3;
    }

    let knowledge_hits = tokens
        .iter()
        .filter(|t| KNOWLEDGE_WORDS.contains(&t.as_str()))
        .count()
        + KNOWLEDGE_PHRASES
            .iter()
            .filter(|p| contains_phrase(&joined, p))
            .count();
    knowledge += knowledge_hits as u32;

    if has_question_mark && knowledge_hits > 0 {
        knowledge += 1;
    }
    if all_tokens.len() > 5 {
        knowledge += 1;
    }

    let all_joined = all_tokens.join(" ");
    let casual_hits = all_tokens
        .iter()
        .filter(|t| CASUAL_WORDS.contains(&t.as_str()))
        .count()
        + CASUAL_MULTIWORD
            .iter()
            .filter(|p| contains_phrase(&all_joined, p))
            .count();
    casual += 2 * casual_hits as u32;

    if all_tokens.first().is_some_and(|t| CASUAL_WORDS.contains(&t.as_str()))
        || CASUAL_MULTIWORD
            .iter()
            .any(|p| starts_with_phrase(&all_tokens, p))
    {
        casual += 2;
    }
    if !all_tokens.is_empty() && all_tokens.len() <= 3 && !has_question_mark {
        casual += 1;
    }

    let (mode, reason) = match (knowledge >= STRONG, casual >= STRONG) {
        (true, true) => (QueryMode::Hybrid, "both knowledge and casual signals"),
        (true, false) => (QueryMode::Knowledge, "question or lookup phrasing"),
        (false, true) => (QueryMode::Casual, "greeting or small talk"),
        (false, false) => (QueryMode::Hybrid, "no strong signal"),
    };

    let total = knowledge + casual;
    let confidence = if total == 0 {
        0.0
    } else {
        match mode {
            QueryMode::Knowledge => knowledge as f32 / total as f32,
            QueryMode::Casual => casual as f32 / total as f32,
            QueryMode::Hybrid => knowledge.min(casual) as f32 / knowledge.max(casual) as f32,
        }
    };

    tracing::debug!(
        mode = mode.as_str(),
        knowledge_score = knowledge,
        casual_score = casual,
        "Classified query"
    );

    Classification {
        mode,
        knowledge_score: knowledge,
        casual_score: casual,
        confidence,
        reason: reason.to_string(),
    }
}

/// Keep letters, digits and apostrophes; everything else separates words.
fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '’' => '\'',
            c if c.is_alphanumeric() || c == '\'' => c,
            _ => ' ',
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

fn starts_with_phrase(tokens: &[String], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    tokens.len() >= words.len() && tokens.iter().zip(&words).all(|(t, w)| t == w)
}

fn contains_phrase(joined: &str, phrase: &str) -> bool {
    format!(" {} ", joined).contains(&format!(" {} ", phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_is_casual() {
        let c = explain("hey what's up");
        assert_eq!(c.mode, QueryMode::Casual);
        assert_eq!(c.knowledge_score, 0);
        assert!(c.casual_score >= STRONG);
    }

    #[test]
    fn test_question_is_knowledge() {
        let c = explain("what is gradient descent");
        assert_eq!(c.mode, QueryMode::Knowledge);
        assert_eq!(c.knowledge_score, 4);
        assert_eq!(c.casual_score, 0);
        assert!((c.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mixed_message_is_hybrid() {
        let c = explain("ok thanks, and also what about backprop?");
        assert_eq!(c.mode, QueryMode::Hybrid);
        assert!(c.knowledge_score >= STRONG);
        assert!(c.casual_score >= STRONG);
    }

    #[test]
    fn test_empty_and_garbled_input_is_hybrid() {
        for input in ["", "   ", "%%%% ###", "qzxv blorp"] {
            assert_eq!(classify(input), QueryMode::Hybrid, "input: {:?}", input);
        }
    }

    #[test]
    fn test_casual_phrases_do_not_count_as_questions() {
        assert_eq!(classify("how are you"), QueryMode::Casual);
        assert_eq!(classify("who are you?"), QueryMode::Casual);
    }

    #[test]
    fn test_lookup_commands_are_knowledge() {
        assert_eq!(
            classify("summarize my notes on transformers"),
            QueryMode::Knowledge
        );
        assert_eq!(classify("tell me about sourdough"), QueryMode::Knowledge);
    }

    #[test]
    fn test_thank_you_is_casual() {
        assert_eq!(classify("thank you so much"), QueryMode::Casual);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&QueryMode::Knowledge).unwrap(),
            "\"knowledge\""
        );
    }
}
