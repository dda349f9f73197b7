//! Uniform result envelopes for the admin surface.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::{CacheInfo, CacheManager, ManagerStatistics, TagDeleteOutcome};
use crate::audit::{AuditRecord, Page, SearchFilter};
use crate::config::AdminConfig;
use crate::summary::TRUNCATION_MARKER;

/// The `{code, message, data}` envelope consumed by admin glue.
///
/// Code 0 is success; any nonzero code carries a human-readable message.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    /// 0 on success, nonzero on failure.
    pub code: i32,
    /// Human-readable outcome.
    pub message: String,
    /// Payload, when the operation produced one.
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Success with a payload.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    /// Success with a payload and a custom message.
    #[must_use]
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failure with a message and no payload.
    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            message: message.into(),
            data: None,
        }
    }

    /// Whether the envelope reports success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// One page of the admin cache list.
#[derive(Debug, Clone, Serialize)]
pub struct CacheListPage {
    /// Entries on this page.
    pub entries: Vec<CacheInfo>,
    /// Total known keys after filtering.
    pub total: u64,
    /// 1-based page number.
    pub page: u64,
    /// Page size used.
    pub limit: u64,
}

/// The read-and-write operations exposed to admin glue, all returning
/// [`Envelope`]s. Malformed inputs become absent filters, not errors.
pub struct AdminApi {
    manager: CacheManager,
    config: AdminConfig,
}

impl AdminApi {
    /// Admin surface over `manager`.
    #[must_use]
    pub fn new(manager: CacheManager, config: AdminConfig) -> Self {
        Self { manager, config }
    }

    /// Paginated list of known keys with their combined info.
    pub async fn list(
        &self,
        page: u64,
        limit: Option<u64>,
        key_filter: Option<&str>,
    ) -> Envelope<CacheListPage> {
        let keys = match self.manager.list_known_keys().await {
            Ok(keys) => keys,
            Err(err) => return Envelope::err(err.to_string()),
        };

        let keys: Vec<String> = match key_filter.filter(|f| !f.is_empty()) {
            Some(filter) => keys.into_iter().filter(|k| k.contains(filter)).collect(),
            None => keys,
        };

        let page = page.max(1);
        let limit = limit.unwrap_or(self.config.page_size).max(1);
        let total = keys.len() as u64;
        let offset = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);

        let mut entries = Vec::new();
        for key in keys.into_iter().skip(offset).take(take) {
            match self.manager.get_cache_info(&key).await {
                Ok(mut info) => {
                    info.value = info.value.map(|v| self.displayable(v));
                    entries.push(info);
                }
                Err(err) => {
                    tracing::warn!(key, error = %err, "failed to load cache info");
                }
            }
        }

        Envelope::ok(CacheListPage {
            entries,
            total,
            page,
            limit,
        })
    }

    /// Combined info for one key. Unknown keys report `exists: false`.
    pub async fn detail(&self, key: &str) -> Envelope<CacheInfo> {
        if key.is_empty() {
            return Envelope::err("cache key must not be empty");
        }

        match self.manager.get_cache_info(key).await {
            Ok(mut info) => {
                info.value = info.value.map(|v| self.displayable(v));
                Envelope::ok(info)
            }
            Err(err) => Envelope::err(err.to_string()),
        }
    }

    /// Delete one key from the live store.
    pub async fn delete(&self, key: &str) -> Envelope<()> {
        if key.is_empty() {
            return Envelope::err("cache key must not be empty");
        }

        match self.manager.store_delete(key).await {
            Ok(true) => Envelope::ok(()),
            Ok(false) => Envelope::err("delete failed"),
            Err(err) => Envelope::err(err.to_string()),
        }
    }

    /// Delete several keys; reports per-key success.
    pub async fn batch_delete(&self, keys: &[String]) -> Envelope<BTreeMap<String, bool>> {
        if keys.is_empty() {
            return Envelope::err("no keys selected");
        }

        let results = self.manager.batch_delete(keys).await;
        let succeeded = results.values().filter(|ok| **ok).count();
        Envelope::ok_with_message(
            results,
            format!("deleted {succeeded}/{} keys", keys.len()),
        )
    }

    /// Delete every live key carrying `tag`.
    pub async fn delete_by_tag(&self, tag: &str) -> Envelope<TagDeleteOutcome> {
        if tag.is_empty() {
            return Envelope::err("tag must not be empty");
        }

        match self.manager.delete_by_tag(tag).await {
            Ok(outcome) => {
                let message = format!(
                    "deleted {} keys, skipped {}",
                    outcome.deleted.len(),
                    outcome.skipped.len()
                );
                Envelope::ok_with_message(outcome, message)
            }
            Err(err) => Envelope::err(err.to_string()),
        }
    }

    /// Clear the live store.
    pub async fn clear(&self) -> Envelope<()> {
        match self.manager.clear_store().await {
            Ok(()) => Envelope::ok(()),
            Err(err) => Envelope::err(err.to_string()),
        }
    }

    /// Union of tags across the audit trail.
    pub async fn tags(&self) -> Envelope<Vec<String>> {
        match self.manager.list_all_tags().await {
            Ok(tags) => Envelope::ok(tags),
            Err(err) => Envelope::err(err.to_string()),
        }
    }

    /// Search the audit trail.
    pub async fn logs(&self, mut filter: SearchFilter) -> Envelope<Page<AuditRecord>> {
        if filter.per_page == 0 {
            filter.per_page = self.config.page_size;
        }

        match self.manager.audit().search(&filter).await {
            Ok(page) => Envelope::ok(page),
            Err(err) => Envelope::err(err.to_string()),
        }
    }

    /// Combined statistics.
    pub async fn statistics(&self) -> Envelope<ManagerStatistics> {
        match self.manager.statistics().await {
            Ok(stats) => Envelope::ok(stats),
            Err(err) => Envelope::err(err.to_string()),
        }
    }

    /// Whether a live entry exists (used by glue to badge entries).
    pub async fn exists(&self, key: &str) -> bool {
        self.manager.store_has(key).await
    }

    /// Apply value-display policy: hide or truncate long string values.
    fn displayable(&self, value: Value) -> Value {
        if !self.config.show_cache_value {
            return Value::String("[hidden]".to_string());
        }

        match value {
            Value::String(s) if s.len() > self.config.max_value_display_length => {
                let mut cut = self.config.max_value_display_length;
                while !s.is_char_boundary(cut) {
                    cut -= 1;
                }
                Value::String(format!("{}{TRUNCATION_MARKER}", &s[..cut]))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::audit::{AuditStore, NewAuditRecord};
    use crate::events::Operation;
    use crate::store::{MemoryStore, TagStore};
    use crate::tags::TagSet;

    async fn admin_with(config: AdminConfig) -> (AdminApi, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditStore::open_in_memory().await.unwrap();
        let manager = CacheManager::new(store.clone(), audit, config.scan_limit);
        (AdminApi::new(manager, config), store)
    }

    async fn seed(api: &AdminApi, store: &MemoryStore, key: &str, value: Value) {
        store.set(key, value, None, &TagSet::new()).await.unwrap();
        let record = NewAuditRecord::builder(key, Operation::Write).build();
        api.manager.audit().create(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_paginates_and_filters() {
        let (api, store) = admin_with(AdminConfig::default()).await;
        for i in 0..5 {
            seed(&api, &store, &format!("users:{i}"), json!(i)).await;
        }
        seed(&api, &store, "orders:0", json!(0)).await;

        let page = api.list(1, Some(2), Some("users")).await;
        assert!(page.is_ok());
        let data = page.data.unwrap();
        assert_eq!(data.total, 5);
        assert_eq!(data.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_detail_unknown_key_reports_absent() {
        let (api, _store) = admin_with(AdminConfig::default()).await;

        let envelope = api.detail("missing").await;
        assert!(envelope.is_ok());
        assert!(!envelope.data.unwrap().exists);
    }

    #[tokio::test]
    async fn test_detail_empty_key_is_error() {
        let (api, _store) = admin_with(AdminConfig::default()).await;
        let envelope = api.detail("").await;
        assert_eq!(envelope.code, 1);
    }

    #[tokio::test]
    async fn test_value_hidden_when_configured() {
        let mut config = AdminConfig::default();
        config.show_cache_value = false;
        let (api, store) = admin_with(config).await;
        seed(&api, &store, "k", json!("secret")).await;

        let envelope = api.detail("k").await;
        assert_eq!(envelope.data.unwrap().value, Some(json!("[hidden]")));
    }

    #[tokio::test]
    async fn test_long_value_truncated_for_display() {
        let mut config = AdminConfig::default();
        config.max_value_display_length = 8;
        let (api, store) = admin_with(config).await;
        seed(&api, &store, "k", json!("a".repeat(40))).await;

        let value = api.detail("k").await.data.unwrap().value.unwrap();
        let Value::String(s) = value else {
            panic!("expected string value");
        };
        assert!(s.ends_with(TRUNCATION_MARKER));
        assert_eq!(s.len(), 8 + TRUNCATION_MARKER.len());
    }

    #[tokio::test]
    async fn test_delete_and_batch_delete() {
        let (api, store) = admin_with(AdminConfig::default()).await;
        seed(&api, &store, "a", json!(1)).await;
        seed(&api, &store, "b", json!(2)).await;

        assert!(api.delete("a").await.is_ok());
        assert_eq!(api.delete("a").await.code, 1);

        let envelope = api
            .batch_delete(&["b".to_string(), "missing".to_string()])
            .await;
        assert!(envelope.is_ok());
        assert!(envelope.message.contains("1/2"));
    }

    #[tokio::test]
    async fn test_batch_delete_empty_selection() {
        let (api, _store) = admin_with(AdminConfig::default()).await;
        assert_eq!(api.batch_delete(&[]).await.code, 1);
    }

    #[tokio::test]
    async fn test_delete_by_tag_requires_tag() {
        let (api, _store) = admin_with(AdminConfig::default()).await;
        assert_eq!(api.delete_by_tag("").await.code, 1);
    }

    #[tokio::test]
    async fn test_logs_defaults_page_size() {
        let (api, store) = admin_with(AdminConfig::default()).await;
        seed(&api, &store, "k", json!(1)).await;

        let envelope = api.logs(SearchFilter::default()).await;
        assert!(envelope.is_ok());
        assert_eq!(envelope.data.unwrap().per_page, 20);
    }

    #[tokio::test]
    async fn test_statistics_envelope() {
        let (api, store) = admin_with(AdminConfig::default()).await;
        seed(&api, &store, "k", json!(1)).await;

        let envelope = api.statistics().await;
        assert!(envelope.is_ok());
        assert_eq!(envelope.data.unwrap().audit.total, 1);
    }
}
