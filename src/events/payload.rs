//! Typed event payloads for cache mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::caller::CallContext;
use crate::summary::SourceSpan;
use crate::tags::TagSet;

/// Kind of cache mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A value was written.
    Write,
    /// A key was deleted.
    Delete,
    /// The store (or a tag scope) was cleared.
    Clear,
}

impl Operation {
    /// String form used for database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Clear => "clear",
        }
    }

    /// Parse the database string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "write" => Some(Self::Write),
            "delete" => Some(Self::Delete),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }
}

/// Reference to the deferred computation that produced a cached value.
///
/// Carries the generator's source span rather than the computed result so
/// the summarizer can recover the logic, not just its output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorRef {
    /// Where the generator's source text lives, if known.
    pub source: Option<SourceSpan>,
}

/// Payload for a write event.
///
/// Which of `generator` / `result` / `value` are present determines the
/// summarization strategy; there is no runtime type inspection.
#[derive(Debug, Clone)]
pub struct WriteEvent {
    /// The cache key written.
    pub key: String,
    /// Tags bound to the entry.
    pub tags: TagSet,
    /// Expiry in seconds; 0 means no expiry.
    pub expire_seconds: u64,
    /// When the write happened.
    pub timestamp: DateTime<Utc>,
    /// Captured caller context.
    pub caller: CallContext,
    /// The deferred computation, for `remember`-style writes.
    pub generator: Option<GeneratorRef>,
    /// The generator's computed result, if one ran.
    pub result: Option<serde_json::Value>,
    /// The plain value, for direct `set` writes.
    pub value: Option<serde_json::Value>,
}

/// Payload for a delete event.
#[derive(Debug, Clone)]
pub struct DeleteEvent {
    /// The cache key deleted.
    pub key: String,
    /// Tags bound to the facade instance.
    pub tags: TagSet,
    /// When the delete happened.
    pub timestamp: DateTime<Utc>,
    /// Captured caller context.
    pub caller: CallContext,
}

/// Payload for a clear event.
#[derive(Debug, Clone)]
pub struct ClearEvent {
    /// Tags the clear was scoped to; empty for a full clear.
    pub tags: TagSet,
    /// When the clear happened.
    pub timestamp: DateTime<Utc>,
    /// Captured caller context.
    pub caller: CallContext,
}

/// A cache mutation event.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A value was written.
    Write(WriteEvent),
    /// A key was deleted.
    Delete(DeleteEvent),
    /// A clear ran.
    Clear(ClearEvent),
}

impl CacheEvent {
    /// The operation kind of this event.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Write(_) => Operation::Write,
            Self::Delete(_) => Operation::Delete,
            Self::Clear(_) => Operation::Clear,
        }
    }

    /// The cache key, if the event concerns a single key.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Write(e) => Some(&e.key),
            Self::Delete(e) => Some(&e.key),
            Self::Clear(_) => None,
        }
    }

    /// The caller context attached to the event.
    #[must_use]
    pub fn caller(&self) -> &CallContext {
        match self {
            Self::Write(e) => &e.caller,
            Self::Delete(e) => &e.caller,
            Self::Clear(e) => &e.caller,
        }
    }

    /// The tags carried by the event.
    #[must_use]
    pub fn tags(&self) -> &TagSet {
        match self {
            Self::Write(e) => &e.tags,
            Self::Delete(e) => &e.tags,
            Self::Clear(e) => &e.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_as_str() {
        assert_eq!(Operation::Write.as_str(), "write");
        assert_eq!(Operation::Delete.as_str(), "delete");
        assert_eq!(Operation::Clear.as_str(), "clear");
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!(Operation::parse("write"), Some(Operation::Write));
        assert_eq!(Operation::parse("delete"), Some(Operation::Delete));
        assert_eq!(Operation::parse("clear"), Some(Operation::Clear));
        assert_eq!(Operation::parse("read"), None);
    }

    #[test]
    fn test_operation_serialize() {
        let json = serde_json::to_string(&Operation::Write).unwrap();
        assert_eq!(json, "\"write\"");
        let parsed: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Operation::Write);
    }

    #[test]
    fn test_event_accessors() {
        let event = CacheEvent::Delete(DeleteEvent {
            key: "users:1".to_string(),
            tags: ["user"].into_iter().collect(),
            timestamp: Utc::now(),
            caller: CallContext::default(),
        });

        assert_eq!(event.operation(), Operation::Delete);
        assert_eq!(event.key(), Some("users:1"));
        assert!(event.tags().contains("user"));
    }

    #[test]
    fn test_clear_has_no_key() {
        let event = CacheEvent::Clear(ClearEvent {
            tags: TagSet::new(),
            timestamp: Utc::now(),
            caller: CallContext::default(),
        });
        assert!(event.key().is_none());
    }
}
