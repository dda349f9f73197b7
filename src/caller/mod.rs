//! Caller attribution for audit records.
//!
//! Audit records should point at *application* code, not at the cache or
//! audit plumbing itself. [`CallerResolver`] walks a captured frame stack
//! from innermost to outermost and returns the first frame that does not
//! belong to the library.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tags::TagSet;

/// Errors from building a caller resolver.
#[derive(thiserror::Error, Debug)]
pub enum ResolverError {
    /// Invalid skip-path regex.
    #[error("Invalid skip pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// One captured stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Source file path.
    pub file: String,
    /// Line number within the file.
    pub line: u32,
    /// Enclosing type name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_type: Option<String>,
}

impl Frame {
    /// Create a frame with no enclosing type.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            enclosing_type: None,
        }
    }

    /// Attach an enclosing type name.
    #[must_use]
    pub fn in_type(mut self, name: impl Into<String>) -> Self {
        self.enclosing_type = Some(name.into());
        self
    }
}

/// Best-effort request metadata carried on an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Request URI, if the call happened inside a request.
    pub uri: Option<String>,
    /// User agent header, if any.
    pub agent: Option<String>,
}

/// Execution context captured at a cache call site.
///
/// The frame stack is ordered innermost-first. The optional `tag_hint`
/// carries table tags the caller derived from an active query, replacing
/// any stack-walking inference.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Captured frames, innermost first.
    pub frames: Vec<Frame>,
    /// Request metadata, if available.
    pub request: Option<RequestContext>,
    /// Extra tags the caller wants merged into the audit record.
    pub tag_hint: Option<TagSet>,
}

impl CallContext {
    /// Capture a single-frame context at the caller's location.
    #[must_use]
    #[track_caller]
    pub fn capture() -> Self {
        let location = std::panic::Location::caller();
        Self {
            frames: vec![Frame::new(location.file(), location.line())],
            request: None,
            tag_hint: None,
        }
    }

    /// Context from an explicit frame stack (innermost first).
    #[must_use]
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            request: None,
            tag_hint: None,
        }
    }

    /// Attach request metadata.
    #[must_use]
    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = Some(request);
        self
    }

    /// Attach tags to merge into the audit record.
    #[must_use]
    pub fn with_tag_hint(mut self, tags: TagSet) -> Self {
        self.tag_hint = Some(tags);
        self
    }
}

/// Finds the first application frame in a captured stack.
#[derive(Debug, Default)]
pub struct CallerResolver {
    skip_paths: Vec<Regex>,
    skip_types: Vec<String>,
}

impl CallerResolver {
    /// Resolver with the library's own modules on the skip list.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::InvalidPattern` if an extra pattern is
    /// not a valid regex.
    pub fn new(
        extra_skip_paths: &[String],
        extra_skip_types: &[String],
    ) -> Result<Self, ResolverError> {
        let mut skip_paths = Vec::new();
        for pattern in Self::builtin_skip_patterns() {
            skip_paths.push(Regex::new(pattern)?);
        }
        for pattern in extra_skip_paths {
            skip_paths.push(Regex::new(pattern)?);
        }

        let mut skip_types: Vec<String> = Self::builtin_skip_types()
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        skip_types.extend(extra_skip_types.iter().cloned());

        Ok(Self {
            skip_paths,
            skip_types,
        })
    }

    /// Path patterns that always count as library-internal.
    fn builtin_skip_patterns() -> &'static [&'static str] {
        &[
            r"cache[_-]ledger/src/",
            r"/src/facade/",
            r"/src/events/",
            r"/src/recorder/",
        ]
    }

    /// Type names that always count as library-internal.
    fn builtin_skip_types() -> &'static [&'static str] {
        &["CacheFacade", "EventBus", "AuditRecorder"]
    }

    /// Return the first frame outside the library, or the innermost frame
    /// if every frame matches the skip lists. `None` only for an empty
    /// stack.
    #[must_use]
    pub fn resolve<'a>(&self, frames: &'a [Frame]) -> Option<&'a Frame> {
        frames
            .iter()
            .find(|frame| !self.is_internal(frame))
            .or_else(|| frames.first())
    }

    fn is_internal(&self, frame: &Frame) -> bool {
        if self.skip_paths.iter().any(|p| p.is_match(&frame.file)) {
            return true;
        }
        frame
            .enclosing_type
            .as_deref()
            .is_some_and(|ty| self.skip_types.iter().any(|skip| skip == ty))
    }
}
