//! Read-side cache management over the audit trail and the live store.

mod response;

pub use response::{AdminApi, CacheListPage, Envelope};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::audit::{AuditError, AuditRecord, AuditStore, NewAuditRecord, Statistics};
use crate::events::Operation;
use crate::store::{StoreError, TagStore};
use crate::tags::TagSet;

/// Errors from management operations.
#[derive(thiserror::Error, Debug)]
pub enum ManagerError {
    /// The live store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The audit store failed.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Combined live-store and audit view of one key.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    /// The cache key.
    pub key: String,
    /// Whether a live entry currently exists.
    pub exists: bool,
    /// The live value, when present.
    pub value: Option<Value>,
    /// Serialized size of the live value, in bytes.
    pub size: usize,
    /// Audit history for the key, newest first.
    pub logs: Vec<AuditRecord>,
    /// Tags from the most recent record.
    pub tags: TagSet,
    /// Most recent operation, if any history exists.
    pub last_operation: Option<Operation>,
    /// When the most recent operation happened.
    pub last_operation_at: Option<DateTime<Utc>>,
}

/// Audit statistics enriched with live-store counts.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatistics {
    /// Counts from the audit trail.
    #[serde(flatten)]
    pub audit: Statistics,
    /// Distinct keys observed in write records.
    pub known_keys: u64,
    /// How many known keys still exist in the live store.
    pub existing_keys: u64,
    /// Distinct tags across all records.
    pub tag_count: u64,
}

/// Result of a tag-scoped bulk delete.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TagDeleteOutcome {
    /// Keys removed from the live store.
    pub deleted: Vec<String>,
    /// Keys skipped because no live entry existed (or the store refused).
    pub skipped: Vec<String>,
}

/// Read-side query facade combining the audit trail with the live store.
pub struct CacheManager {
    store: Arc<dyn TagStore>,
    audit: AuditStore,
    scan_limit: u64,
}

impl CacheManager {
    /// Manager over `store` and `audit`, scanning at most `scan_limit`
    /// known keys.
    #[must_use]
    pub fn new(store: Arc<dyn TagStore>, audit: AuditStore, scan_limit: u64) -> Self {
        Self {
            store,
            audit,
            scan_limit,
        }
    }

    /// The audit store behind this manager.
    #[must_use]
    pub fn audit(&self) -> &AuditStore {
        &self.audit
    }

    /// Distinct keys observed in write records, most recently written
    /// first, bounded to the scan limit.
    pub async fn list_known_keys(&self) -> Result<Vec<String>, ManagerError> {
        Ok(self.audit.distinct_write_keys(self.scan_limit).await?)
    }

    /// Live existence/value plus audit history for one key.
    ///
    /// Unknown keys yield `exists: false` with empty history, not an error.
    pub async fn get_cache_info(&self, key: &str) -> Result<CacheInfo, ManagerError> {
        let exists = self.store.has(key).await?;
        let value = if exists {
            self.store.get(key).await?
        } else {
            None
        };
        let size = value
            .as_ref()
            .and_then(|v| serde_json::to_string(v).ok())
            .map_or(0, |s| s.len());

        let logs = self.audit.find_by_key(key).await?;
        let latest = logs.first();

        Ok(CacheInfo {
            key: key.to_string(),
            exists,
            value,
            size,
            tags: latest.map(|r| r.tags.clone()).unwrap_or_default(),
            last_operation: latest.map(|r| r.operation),
            last_operation_at: latest.map(|r| r.created_at),
            logs,
        })
    }

    /// Union of tags across all records.
    pub async fn list_all_tags(&self) -> Result<Vec<String>, ManagerError> {
        Ok(self.audit.all_tags().await?)
    }

    /// Audit statistics plus live-store key counts.
    pub async fn statistics(&self) -> Result<ManagerStatistics, ManagerError> {
        let audit = self.audit.statistics().await?;
        let known = self.list_known_keys().await?;

        let mut existing = 0u64;
        for key in &known {
            if self.store.has(key).await.unwrap_or(false) {
                existing += 1;
            }
        }

        let tag_count = self.audit.all_tags().await?.len() as u64;

        Ok(ManagerStatistics {
            audit,
            known_keys: known.len() as u64,
            existing_keys: existing,
            tag_count,
        })
    }

    /// Delete each key independently; one key's failure never aborts the
    /// others. Returns a per-key success map.
    pub async fn batch_delete(&self, keys: &[String]) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();

        for key in keys {
            let deleted = match self.store.delete(key).await {
                Ok(removed) => removed,
                Err(err) => {
                    tracing::warn!(key, error = %err, "batch delete failed for key");
                    false
                }
            };
            results.insert(key.clone(), deleted);
        }

        results
    }

    /// Delete every live key whose audit history carries `tag`, recording
    /// one delete record per removed key.
    ///
    /// Keys with no live entry are skipped, not treated as failures.
    pub async fn delete_by_tag(&self, tag: &str) -> Result<TagDeleteOutcome, ManagerError> {
        let records = self.audit.find_by_tag(tag).await?;

        let mut keys: Vec<String> = Vec::new();
        for record in records {
            if !keys.contains(&record.cache_key) {
                keys.push(record.cache_key);
            }
        }

        let mut outcome = TagDeleteOutcome::default();
        for key in keys {
            let live = self.store.has(&key).await.unwrap_or(false);
            if !live {
                outcome.skipped.push(key);
                continue;
            }

            match self.store.delete(&key).await {
                Ok(true) => {
                    let record = NewAuditRecord::builder(&key, Operation::Delete)
                        .tags([tag].into_iter().collect())
                        .build();
                    if let Err(err) = self.audit.create(&record).await {
                        tracing::warn!(key, error = %err, "failed to record tag delete");
                    }
                    outcome.deleted.push(key);
                }
                Ok(false) => outcome.skipped.push(key),
                Err(err) => {
                    tracing::warn!(key, error = %err, "tag delete failed for key");
                    outcome.skipped.push(key);
                }
            }
        }

        Ok(outcome)
    }

    /// Clear the live store. The audit trail is left untouched.
    pub async fn clear_store(&self) -> Result<(), ManagerError> {
        Ok(self.store.clear().await?)
    }

    pub(crate) async fn store_has(&self, key: &str) -> bool {
        self.store.has(key).await.unwrap_or(false)
    }

    pub(crate) async fn store_delete(&self, key: &str) -> Result<bool, ManagerError> {
        Ok(self.store.delete(key).await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    async fn manager() -> CacheManager {
        let audit = AuditStore::open_in_memory().await.unwrap();
        CacheManager::new(Arc::new(MemoryStore::new()), audit, 1000)
    }

    async fn seed_write(manager: &CacheManager, key: &str, tags: &[&str]) {
        manager
            .store
            .set(key, json!("v"), None, &tags.iter().copied().collect())
            .await
            .unwrap();
        let record = NewAuditRecord::builder(key, Operation::Write)
            .tags(tags.iter().copied().collect())
            .build();
        manager.audit.create(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_known_keys() {
        let manager = manager().await;
        seed_write(&manager, "a", &[]).await;
        seed_write(&manager, "b", &[]).await;

        let keys = manager.list_known_keys().await.unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn test_get_cache_info_known_key() {
        let manager = manager().await;
        seed_write(&manager, "k", &["user"]).await;

        let info = manager.get_cache_info("k").await.unwrap();
        assert!(info.exists);
        assert_eq!(info.value, Some(json!("v")));
        assert!(info.size > 0);
        assert_eq!(info.logs.len(), 1);
        assert!(info.tags.contains("user"));
        assert_eq!(info.last_operation, Some(Operation::Write));
    }

    #[tokio::test]
    async fn test_get_cache_info_unknown_key() {
        let manager = manager().await;

        let info = manager.get_cache_info("missing").await.unwrap();
        assert!(!info.exists);
        assert!(info.value.is_none());
        assert!(info.logs.is_empty());
        assert!(info.last_operation.is_none());
    }

    #[tokio::test]
    async fn test_statistics_counts_live_keys() {
        let manager = manager().await;
        seed_write(&manager, "live", &["user"]).await;

        // A key with history but no live entry.
        let record = NewAuditRecord::builder("gone", Operation::Write).build();
        manager.audit.create(&record).await.unwrap();

        let stats = manager.statistics().await.unwrap();
        assert_eq!(stats.known_keys, 2);
        assert_eq!(stats.existing_keys, 1);
        assert_eq!(stats.tag_count, 1);
        assert_eq!(stats.audit.total, 2);
    }

    #[tokio::test]
    async fn test_batch_delete_isolates_failures() {
        let manager = manager().await;
        seed_write(&manager, "a", &[]).await;

        let results = manager
            .batch_delete(&["a".to_string(), "missing".to_string()])
            .await;
        assert_eq!(results.get("a"), Some(&true));
        assert_eq!(results.get("missing"), Some(&false));
    }

    #[tokio::test]
    async fn test_delete_by_tag() {
        let manager = manager().await;
        seed_write(&manager, "u1", &["user"]).await;
        seed_write(&manager, "u2", &["user"]).await;
        seed_write(&manager, "o1", &["order"]).await;

        // u2 expires from the live store before the bulk delete.
        manager.store.delete("u2").await.unwrap();

        let outcome = manager.delete_by_tag("user").await.unwrap();
        assert_eq!(outcome.deleted, vec!["u1"]);
        assert_eq!(outcome.skipped, vec!["u2"]);

        // One delete record for the removed key, none for the skipped one.
        let u1_logs = manager.audit.find_by_key("u1").await.unwrap();
        assert_eq!(u1_logs[0].operation, Operation::Delete);
        assert!(u1_logs[0].tags.contains("user"));

        let u2_logs = manager.audit.find_by_key("u2").await.unwrap();
        assert!(u2_logs.iter().all(|r| r.operation == Operation::Write));

        // Other tags untouched.
        assert!(manager.store.has("o1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_all_tags() {
        let manager = manager().await;
        seed_write(&manager, "a", &["user", "order"]).await;

        let mut tags = manager.list_all_tags().await.unwrap();
        tags.sort();
        assert_eq!(tags, vec!["order", "user"]);
    }
}
