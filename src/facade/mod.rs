//! The cache facade: mutations that publish events.
//!
//! Every mutating call goes to the underlying store first; only after the
//! store succeeds does the facade publish an event describing the mutation.
//! A store failure surfaces to the caller and publishes nothing, and
//! whatever subscribers do with an event can never fail the cache call.

mod generator;

pub use generator::Generator;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::caller::CallContext;
use crate::events::{CacheEvent, ClearEvent, DeleteEvent, EventBus, WriteEvent};
use crate::store::{StoreError, TagStore};
use crate::tags::{QueryDescription, TagComposer, TagInput, TableReferenceExtractor, TagSet};

/// Tag-aware cache wrapper that publishes mutation events.
///
/// Cheap to clone; scoped variants share the store and bus but bind their
/// own tag set.
#[derive(Debug, Clone)]
pub struct CacheFacade {
    store: Arc<dyn TagStore>,
    bus: Arc<EventBus>,
    tags: TagSet,
}

impl CacheFacade {
    /// Facade over `store`, publishing to `bus`, with no bound tags.
    #[must_use]
    pub fn new(store: Arc<dyn TagStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            tags: TagSet::new(),
        }
    }

    /// Scoped facade with `tags` merged into the bound tag set.
    #[must_use]
    pub fn with_tags(&self, tags: impl Into<TagInput>) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
            tags: TagComposer::compose(&self.tags, tags),
        }
    }

    /// Scoped facade whose bound tags include the tables `query` touches.
    #[must_use]
    pub fn for_query(
        &self,
        extractor: &TableReferenceExtractor,
        query: &QueryDescription,
    ) -> Self {
        let mut tags = self.tags.clone();
        tags.extend_from(&extractor.extract(query));
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
            tags,
        }
    }

    /// The tag set bound to this facade instance.
    #[must_use]
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Read a value. Publishes no event.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.store.get(key).await
    }

    /// Existence check. Publishes no event.
    pub async fn has(&self, key: &str) -> Result<bool, StoreError> {
        self.store.has(key).await
    }

    /// Write a value and publish a write event.
    pub async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        ctx: CallContext,
    ) -> Result<(), StoreError> {
        self.store.set(key, value.clone(), ttl, &self.tags).await?;

        self.bus
            .publish(&CacheEvent::Write(WriteEvent {
                key: key.to_string(),
                tags: self.tags.clone(),
                expire_seconds: expire_seconds(ttl),
                timestamp: Utc::now(),
                caller: ctx,
                generator: None,
                result: None,
                value: Some(value),
            }))
            .await;

        Ok(())
    }

    /// Return the cached value for `key`, computing and storing it with
    /// `generator` on a miss.
    ///
    /// A write event is published only when the generator actually ran;
    /// reads of an already-cached key are not audited as writes. The event
    /// carries the generator's source reference alongside its result.
    pub async fn remember(
        &self,
        key: &str,
        generator: Generator,
        ttl: Option<Duration>,
        ctx: CallContext,
    ) -> Result<Value, StoreError> {
        if let Some(existing) = self.store.get(key).await? {
            return Ok(existing);
        }

        let (value, reference) = generator.run();
        self.store.set(key, value.clone(), ttl, &self.tags).await?;

        self.bus
            .publish(&CacheEvent::Write(WriteEvent {
                key: key.to_string(),
                tags: self.tags.clone(),
                expire_seconds: expire_seconds(ttl),
                timestamp: Utc::now(),
                caller: ctx,
                generator: Some(reference),
                result: Some(value.clone()),
                value: None,
            }))
            .await;

        Ok(value)
    }

    /// Delete a key, publishing a delete event when a live entry was
    /// actually removed.
    pub async fn delete(&self, key: &str, ctx: CallContext) -> Result<bool, StoreError> {
        let removed = self.store.delete(key).await?;

        if removed {
            self.bus
                .publish(&CacheEvent::Delete(DeleteEvent {
                    key: key.to_string(),
                    tags: self.tags.clone(),
                    timestamp: Utc::now(),
                    caller: ctx,
                }))
                .await;
        }

        Ok(removed)
    }

    /// Clear the whole store and publish a clear event.
    pub async fn clear(&self, ctx: CallContext) -> Result<(), StoreError> {
        self.store.clear().await?;

        self.bus
            .publish(&CacheEvent::Clear(ClearEvent {
                tags: self.tags.clone(),
                timestamp: Utc::now(),
                caller: ctx,
            }))
            .await;

        Ok(())
    }

    /// Clear every entry sharing one of the bound tags.
    ///
    /// Returns `false` without touching the store when no tags are bound.
    pub async fn flush(&self, ctx: CallContext) -> Result<bool, StoreError> {
        if self.tags.is_empty() {
            return Ok(false);
        }

        self.store.clear_by_tags(&self.tags).await?;

        self.bus
            .publish(&CacheEvent::Clear(ClearEvent {
                tags: self.tags.clone(),
                timestamp: Utc::now(),
                caller: ctx,
            }))
            .await;

        Ok(true)
    }
}

fn expire_seconds(ttl: Option<Duration>) -> u64 {
    ttl.map_or(0, |d| d.as_secs())
}
