//! Bounded textual summaries of cached content.
//!
//! For `remember`-style writes the interesting artifact is the generator's
//! logic, not its output, so the summarizer prefers the generator's source
//! text over the computed result. Everything here is best-effort: a summary
//! that cannot be produced degrades to an opaque form, it never errors.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::events::WriteEvent;

/// Appended to a summary that was cut to the configured maximum length.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Source location of a deferred computation: a file plus an inclusive
/// 1-based line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Path of the source file.
    pub file: String,
    /// First line of the generator, 1-based.
    pub start_line: u32,
    /// Last line of the generator, inclusive.
    pub end_line: u32,
}

impl SourceSpan {
    /// Create a span over `start_line..=end_line` of `file`.
    pub fn new(file: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            file: file.into(),
            start_line,
            end_line,
        }
    }
}

/// 128-bit content fingerprint, hex encoded.
///
/// Stable across processes; used for change detection, not integrity.
#[must_use]
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..16])
}

/// A bounded summary plus the fingerprint of exactly the stored text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// The (possibly truncated) summary text.
    pub text: String,
    /// Fingerprint of `text`.
    pub fingerprint: String,
}

/// Produces bounded summaries of write payloads.
#[derive(Debug, Clone, Copy)]
pub struct ContentSummarizer {
    max_len: usize,
}

impl ContentSummarizer {
    /// Summarizer with the given maximum summary byte length.
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Summarize a write event.
    ///
    /// Priority: generator source text, then the computed result, then the
    /// plain value. Returns `None` when the event carries none of the three.
    #[must_use]
    pub fn summarize(&self, event: &WriteEvent) -> Option<Summary> {
        let text = if let Some(generator) = &event.generator {
            Some(self.generator_text(generator.source.as_ref()))
        } else if let Some(result) = &event.result {
            Some(render_value(result))
        } else {
            event.value.as_ref().map(render_value)
        };

        text.map(|text| self.bounded(text))
    }

    /// Apply the length bound and fingerprint the stored text.
    fn bounded(&self, text: String) -> Summary {
        let text = if text.len() > self.max_len {
            let mut cut = self.max_len;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}{TRUNCATION_MARKER}", &text[..cut])
        } else {
            text
        };

        let fingerprint = fingerprint(&text);
        Summary { text, fingerprint }
    }

    /// Recover a generator's body from its source span, falling back to an
    /// opaque rendering when the source is unavailable.
    fn generator_text(&self, source: Option<&SourceSpan>) -> String {
        let Some(span) = source else {
            return "<generator>".to_string();
        };

        match read_span(span) {
            Some(text) => extract_body(&text),
            None => format!(
                "<generator {}:{}-{}>",
                span.file, span.start_line, span.end_line
            ),
        }
    }
}

fn read_span(span: &SourceSpan) -> Option<String> {
    if span.start_line == 0 || span.end_line < span.start_line {
        return None;
    }

    let content = std::fs::read_to_string(&span.file).ok()?;
    let start = span.start_line as usize - 1;
    let count = (span.end_line - span.start_line) as usize + 1;
    let lines: Vec<&str> = content.lines().skip(start).take(count).collect();
    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

/// Isolate the body between the outermost delimiters of a closure or block.
fn extract_body(text: &str) -> String {
    let trimmed = text.trim();

    if let (Some(open), Some(close)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if open < close {
            return trimmed[open + 1..close].trim().to_string();
        }
    }

    trimmed.to_string()
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
