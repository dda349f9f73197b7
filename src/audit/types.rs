//! Audit record types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Operation;
use crate::tags::TagSet;

/// One persisted row describing a qualifying cache mutation.
///
/// Immutable after creation apart from `updated_at` bookkeeping; removed
/// only by retention pruning or explicit operator action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Store-assigned monotonic id.
    pub id: i64,
    /// The cache key the mutation concerned.
    pub cache_key: String,
    /// What kind of mutation happened.
    pub operation: Operation,
    /// Source file of the attributed caller.
    pub file_path: Option<String>,
    /// Line number of the attributed caller.
    pub line_number: Option<u32>,
    /// Bounded textual summary of the written content.
    pub content_summary: Option<String>,
    /// Fingerprint of exactly the stored summary text.
    pub content_fingerprint: Option<String>,
    /// Tags attached to the mutation.
    pub tags: TagSet,
    /// Expiry in seconds; 0 means no expiry.
    pub expire_seconds: u64,
    /// Request URI, best effort.
    pub request_uri: Option<String>,
    /// User agent, best effort.
    pub user_agent: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Bookkeeping timestamp; unset until touched.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A record about to be persisted; the store assigns id and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditRecord {
    pub cache_key: String,
    pub operation: Operation,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub content_summary: Option<String>,
    pub content_fingerprint: Option<String>,
    pub tags: TagSet,
    pub expire_seconds: u64,
    pub request_uri: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditRecord {
    /// Start building a record for `cache_key` and `operation`.
    #[must_use]
    pub fn builder(cache_key: impl Into<String>, operation: Operation) -> NewAuditRecordBuilder {
        NewAuditRecordBuilder::new(cache_key, operation)
    }
}

/// Builder for [`NewAuditRecord`].
#[derive(Debug, Clone)]
pub struct NewAuditRecordBuilder {
    record: NewAuditRecord,
}

impl NewAuditRecordBuilder {
    /// Builder with required fields set.
    pub fn new(cache_key: impl Into<String>, operation: Operation) -> Self {
        Self {
            record: NewAuditRecord {
                cache_key: cache_key.into(),
                operation,
                file_path: None,
                line_number: None,
                content_summary: None,
                content_fingerprint: None,
                tags: TagSet::new(),
                expire_seconds: 0,
                request_uri: None,
                user_agent: None,
            },
        }
    }

    /// Set the attributed caller location.
    #[must_use]
    pub fn caller(mut self, file: impl Into<String>, line: u32) -> Self {
        self.record.file_path = Some(file.into());
        self.record.line_number = Some(line);
        self
    }

    /// Set the content summary and its fingerprint.
    #[must_use]
    pub fn content(mut self, summary: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        self.record.content_summary = Some(summary.into());
        self.record.content_fingerprint = Some(fingerprint.into());
        self
    }

    /// Set the tag set.
    #[must_use]
    pub fn tags(mut self, tags: TagSet) -> Self {
        self.record.tags = tags;
        self
    }

    /// Set the expiry in seconds.
    #[must_use]
    pub fn expire_seconds(mut self, seconds: u64) -> Self {
        self.record.expire_seconds = seconds;
        self
    }

    /// Set best-effort request metadata.
    #[must_use]
    pub fn request(mut self, uri: Option<String>, agent: Option<String>) -> Self {
        self.record.request_uri = uri;
        self.record.user_agent = agent;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> NewAuditRecord {
        self.record
    }
}

/// Filters for searching the audit trail.
///
/// Every field is optional; a malformed or missing filter simply does not
/// constrain the search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Substring match on the cache key.
    pub key_contains: Option<String>,
    /// Exact operation match.
    pub operation: Option<Operation>,
    /// Substring match on the caller file path.
    pub file_contains: Option<String>,
    /// Lower creation-time bound, inclusive.
    pub from: Option<DateTime<Utc>>,
    /// Upper creation-time bound, inclusive.
    pub to: Option<DateTime<Utc>>,
    /// Records whose tag set contains this tag.
    pub tag: Option<String>,
    /// 1-based page number.
    pub page: u64,
    /// Records per page.
    pub per_page: u64,
}

impl SearchFilter {
    /// Filter with pagination defaults (page 1, 20 per page).
    #[must_use]
    pub fn new() -> Self {
        Self {
            page: 1,
            per_page: 20,
            ..Default::default()
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Records on this page, newest first.
    pub records: Vec<T>,
    /// Total matching records across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u64,
    /// Page size used.
    pub per_page: u64,
}

/// Aggregate counts over the audit trail.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    /// Total records.
    pub total: u64,
    /// Records created today (UTC).
    pub today: u64,
    /// Record counts per operation kind.
    pub operations: BTreeMap<String, u64>,
}
