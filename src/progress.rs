//! Progress output for long ingests.
//!
//! Large PDF batches can sit in the embedding phase for minutes, so the
//! pipeline emits per-source phase updates while it works. Everything goes
//! to stderr (plain text or JSON lines); stdout stays reserved for the
//! ingest report.

use std::io::Write;

use serde::Serialize;

/// One observable step of ingesting a single source.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent {
    /// Text extraction started; chunk count not known yet.
    Extracting { source: String },
    /// `n` of `total` chunks embedded so far.
    Embedding { source: String, n: u64, total: u64 },
    /// Chunks entering the index, about to be persisted.
    Indexing { source: String, chunks: u64 },
}

/// Sink for [`IngestProgressEvent`]s, fed by the pipeline after each
/// phase transition and embedding batch.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Plain-text lines like `ingest report.pdf  embedding  128 / 1,204 chunks`.
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let mut err = std::io::stderr().lock();
        let _ = match &event {
            IngestProgressEvent::Extracting { source } => {
                writeln!(err, "ingest {}  extracting...", source)
            }
            IngestProgressEvent::Embedding { source, n, total } => writeln!(
                err,
                "ingest {}  embedding  {} / {} chunks",
                source,
                format_number(*n),
                format_number(*total)
            ),
            IngestProgressEvent::Indexing { source, chunks } => writeln!(
                err,
                "ingest {}  indexing  {} chunks",
                source,
                format_number(*chunks)
            ),
        };
        let _ = err.flush();
    }
}

#[derive(Serialize)]
struct ProgressLine<'a> {
    event: &'static str,
    source: &'a str,
    phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<u64>,
}

impl<'a> ProgressLine<'a> {
    fn new(source: &'a str, phase: &'static str) -> Self {
        Self {
            event: "progress",
            source,
            phase,
            n: None,
            total: None,
            chunks: None,
        }
    }
}

/// One JSON object per line, for wrapping scripts.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Extracting { source } => ProgressLine::new(source, "extracting"),
            IngestProgressEvent::Embedding { source, n, total } => ProgressLine {
                n: Some(*n),
                total: Some(*total),
                ..ProgressLine::new(source, "embedding")
            },
            IngestProgressEvent::Indexing { source, chunks } => ProgressLine {
                chunks: Some(*chunks),
                ..ProgressLine::new(source, "indexing")
            },
        };
        if let Ok(json) = serde_json::to_string(&line) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", json);
            let _ = err.flush();
        }
    }
}

/// Swallows every event.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

/// Insert thousands separators: `1204` becomes `1,204`.
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// How `--progress` renders: suppressed, plain text, or JSON lines.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Plain text when stderr is a terminal, nothing when piped.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            Self::Human
        } else {
            Self::Off
        }
    }

    /// Boxed reporter implementing this mode.
    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            Self::Off => Box::new(NoProgress),
            Self::Human => Box::new(StderrProgress),
            Self::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators() {
        assert_eq!(format_number(7), "7");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1204), "1,204");
        assert_eq!(format_number(52_340), "52,340");
        assert_eq!(format_number(8_005_000_123), "8,005,000,123");
    }

    #[test]
    fn json_line_drops_absent_counts() {
        let extracting = serde_json::to_string(&ProgressLine::new("a.pdf", "extracting")).unwrap();
        assert!(extracting.starts_with("{\"event\":\"progress\""));
        assert!(!extracting.contains("\"n\""));
        assert!(!extracting.contains("chunks"));

        let embedding = serde_json::to_string(&ProgressLine {
            n: Some(3),
            total: Some(10),
            ..ProgressLine::new("a.pdf", "embedding")
        })
        .unwrap();
        assert!(embedding.contains("\"n\":3"));
        assert!(embedding.contains("\"total\":10"));
    }
}
