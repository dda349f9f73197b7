//! The external tag-capable key/value store seam.
//!
//! The facade treats the store as a collaborator: any backend that can
//! associate a write with a set of tags and later clear all entries sharing
//! a tag can sit behind [`TagStore`]. [`MemoryStore`] is the bundled
//! reference implementation, used by tests and small embeddings.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::tags::TagSet;

/// Errors from the underlying cache store.
///
/// These surface to the facade caller; a failed mutation publishes no event.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("Store operation '{operation}' failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    /// The backend is unreachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A key/value store that supports tag-scoped invalidation.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Fetch a value; `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a value with optional TTL, associating it with `tags`.
    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        tags: &TagSet,
    ) -> Result<(), StoreError>;

    /// Delete a key. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove every entry.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Whether a live (unexpired) entry exists.
    async fn has(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove every entry sharing any one of `tags`.
    async fn clear_by_tags(&self, tags: &TagSet) -> Result<(), StoreError>;
}

impl std::fmt::Debug for dyn TagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TagStore")
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    tags: TagSet,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// In-memory tag-capable store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.read();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        tags: &TagSet,
    ) -> Result<(), StoreError> {
        let entry = Entry {
            value,
            tags: tags.clone(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self.write().remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.write().clear();
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        let entries = self.read();
        Ok(entries.get(key).is_some_and(Entry::is_live))
    }

    async fn clear_by_tags(&self, tags: &TagSet) -> Result<(), StoreError> {
        let mut entries = self.write();
        entries.retain(|_, entry| !entry.tags.iter().any(|tag| tags.contains(tag)));
        Ok(())
    }
}

/// Test double that fails every operation.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingStore;

#[cfg(test)]
#[async_trait]
impl TagStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }

    async fn set(
        &self,
        _key: &str,
        _value: Value,
        _ttl: Option<Duration>,
        _tags: &TagSet,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend {
            operation: "set",
            message: "down".to_string(),
        })
    }

    async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Backend {
            operation: "delete",
            message: "down".to_string(),
        })
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Backend {
            operation: "clear",
            message: "down".to_string(),
        })
    }

    async fn has(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }

    async fn clear_by_tags(&self, _tags: &TagSet) -> Result<(), StoreError> {
        Err(StoreError::Backend {
            operation: "clear_by_tags",
            message: "down".to_string(),
        })
    }
}
