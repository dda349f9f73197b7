//! The audit recorder: turns qualifying cache events into audit records.
//!
//! Subscribed to the [`EventBus`](crate::events::EventBus); every failure in
//! the recording pipeline is caught and logged, never propagated — the cache
//! operation that triggered the event has already completed.

mod throttle;

pub use throttle::ThrottleState;

use async_trait::async_trait;

use crate::audit::{AuditError, AuditStore, NewAuditRecord};
use crate::caller::{CallerResolver, ResolverError};
use crate::config::{ConfigError, ExclusionRules, LedgerConfig};
use crate::events::{CacheEvent, CacheEventHandler, WriteEvent};
use crate::summary::ContentSummarizer;
use crate::tags::TagSet;

/// Errors from assembling a recorder.
#[derive(thiserror::Error, Debug)]
pub enum RecorderError {
    /// Exclusion patterns failed to compile.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Caller skip patterns failed to compile.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

/// Subscribes to cache events and persists audit records.
pub struct AuditRecorder {
    enabled: bool,
    monitoring: bool,
    log_content: bool,
    throttle_seconds: u64,
    throttle: ThrottleState,
    exclusions: ExclusionRules,
    resolver: CallerResolver,
    summarizer: ContentSummarizer,
    store: AuditStore,
}

impl AuditRecorder {
    /// Build a recorder from configuration around an open audit store.
    pub fn from_config(config: &LedgerConfig, store: AuditStore) -> Result<Self, RecorderError> {
        Ok(Self {
            enabled: config.enabled,
            monitoring: config.performance.enable_monitoring,
            log_content: config.log_content,
            throttle_seconds: config.performance.throttle_seconds,
            throttle: ThrottleState::new(config.performance.throttle_cap),
            exclusions: ExclusionRules::from_config(config)?,
            resolver: CallerResolver::new(&[], &[])?,
            summarizer: ContentSummarizer::new(config.max_summary_length),
            store,
        })
    }

    /// Run the recording pipeline for one event.
    ///
    /// Returns the id of the created record, or `None` when a filter
    /// dropped the event.
    async fn record(&self, event: &CacheEvent) -> Result<Option<i64>, AuditError> {
        if !self.enabled || !self.monitoring {
            return Ok(None);
        }

        let key = event.key().unwrap_or("");

        if self.throttle.should_throttle(key, self.throttle_seconds) {
            tracing::trace!(key, "audit record throttled");
            return Ok(None);
        }

        if self.exclusions.excludes_key(key) {
            return Ok(None);
        }

        let context = event.caller();
        let caller = self.resolver.resolve(&context.frames);

        if let Some(frame) = caller {
            if self.exclusions.excludes_file(&frame.file) {
                return Ok(None);
            }
        }

        let summary = match event {
            CacheEvent::Write(write) if self.log_content => self.summarizer.summarize(write),
            _ => None,
        };

        let mut tags: TagSet = event.tags().clone();
        if let Some(hint) = &context.tag_hint {
            tags.extend_from(hint);
        }

        let expire_seconds = match event {
            CacheEvent::Write(WriteEvent { expire_seconds, .. }) => *expire_seconds,
            _ => 0,
        };

        let mut builder = NewAuditRecord::builder(key, event.operation())
            .tags(tags)
            .expire_seconds(expire_seconds);

        if let Some(frame) = caller {
            builder = builder.caller(frame.file.clone(), frame.line);
        }
        if let Some(summary) = summary {
            builder = builder.content(summary.text, summary.fingerprint);
        }
        if let Some(request) = &context.request {
            builder = builder.request(request.uri.clone(), request.agent.clone());
        }

        let id = self.store.create(&builder.build()).await?;
        Ok(Some(id))
    }
}

#[async_trait]
impl CacheEventHandler for AuditRecorder {
    async fn on_event(&self, event: &CacheEvent) {
        match self.record(event).await {
            Ok(Some(id)) => {
                tracing::debug!(id, operation = event.operation().as_str(), "audit record written");
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "audit record dropped");
            }
        }
    }
}
