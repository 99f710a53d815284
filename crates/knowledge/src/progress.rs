//! Progress reporting for ingestion.
//!
//! Ingestion of a large folder can take minutes; callers get one event per
//! document and per embedded batch so a CLI can draw a status line.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Ingestion phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestPhase {
    Parse,
    Chunk,
    Embed,
    Index,
    Done,
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parse => "parse",
            Self::Chunk => "chunk",
            Self::Embed => "embed",
            Self::Index => "index",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// One progress update.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: IngestPhase,
    /// Source the event refers to, if any
    pub source: Option<String>,
    pub current: u64,
    pub total: Option<u64>,
    pub message: String,
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    pub fn new(
        phase: IngestPhase,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            source: None,
            current,
            total,
            message: message.into(),
            elapsed_secs: 0.0,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Completion in percent, when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|t| {
            if t > 0 {
                (self.current as f64 / t as f64) * 100.0
            } else {
                100.0
            }
        })
    }

    /// Single status line, e.g. `[embed] 3/10 (30%) notes.md - batch of 32`.
    pub fn format_simple(&self) -> String {
        let count = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        let pct = self
            .percentage()
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();
        let source = self
            .source
            .as_deref()
            .map(|s| format!(" {}", s))
            .unwrap_or_default();

        format!("[{}] {}{}{} - {}", self.phase, count, pct, source, self.message)
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Forwards events to an optional callback and to tracing.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    started: Instant,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            started: Instant::now(),
        }
    }

    pub fn noop() -> Self {
        Self {
            callback: None,
            started: Instant::now(),
        }
    }

    pub fn emit(&self, mut event: ProgressEvent) {
        event.elapsed_secs = self.started.elapsed().as_secs_f64();

        tracing::debug!(
            phase = %event.phase,
            source = ?event.source,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            "Ingest progress"
        );

        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    pub fn parse(&self, current: u64, total: u64, source: &str) {
        self.emit(
            ProgressEvent::new(IngestPhase::Parse, current, Some(total), "reading")
                .with_source(source),
        );
    }

    pub fn chunk(&self, source: &str, fragments: usize) {
        self.emit(
            ProgressEvent::new(
                IngestPhase::Chunk,
                fragments as u64,
                None,
                format!("{} fragments", fragments),
            )
            .with_source(source),
        );
    }

    pub fn embed(&self, source: &str, done: usize, total: usize) {
        self.emit(
            ProgressEvent::new(
                IngestPhase::Embed,
                done as u64,
                Some(total as u64),
                "embedding fragments",
            )
            .with_source(source),
        );
    }

    pub fn index(&self, source: &str, written: usize, backend: &str) {
        self.emit(
            ProgressEvent::new(
                IngestPhase::Index,
                written as u64,
                None,
                format!("written to {} index", backend),
            )
            .with_source(source),
        );
    }

    pub fn done(&self, succeeded: usize, total: usize) {
        self.emit(ProgressEvent::new(
            IngestPhase::Done,
            succeeded as u64,
            Some(total as u64),
            "ingestion finished",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_event_format() {
        let event = ProgressEvent::new(IngestPhase::Embed, 5, Some(10), "embedding fragments")
            .with_source("notes.md");
        let line = event.format_simple();
        assert_eq!(line, "[embed] 5/10 (50%) notes.md - embedding fragments");
    }

    #[test]
    fn test_reporter_forwards_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
            sink.lock().unwrap().push(event);
        }));

        reporter.parse(1, 3, "a.md");
        reporter.chunk("a.md", 4);

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].phase, IngestPhase::Parse);
        assert_eq!(captured[0].source.as_deref(), Some("a.md"));
        assert_eq!(captured[1].current, 4);
    }

    #[test]
    fn test_noop_reporter() {
        ProgressReporter::noop().done(0, 0);
    }
}
