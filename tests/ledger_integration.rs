//! End-to-end tests for the cache facade, event bus, and audit recorder.

use std::sync::Arc;

use serde_json::json;

use cache_ledger::audit::AuditStore;
use cache_ledger::caller::CallContext;
use cache_ledger::config::LedgerConfig;
use cache_ledger::events::{EventBus, Operation};
use cache_ledger::facade::{CacheFacade, Generator};
use cache_ledger::manager::CacheManager;
use cache_ledger::recorder::AuditRecorder;
use cache_ledger::store::MemoryStore;
use cache_ledger::tags::{QueryDescription, TableReferenceExtractor};

/// Wire up a facade whose events flow into an in-memory audit store.
async fn wired(config: LedgerConfig) -> (CacheFacade, AuditStore, Arc<MemoryStore>) {
    let audit = AuditStore::open_in_memory()
        .await
        .expect("Failed to open audit store");
    let recorder =
        AuditRecorder::from_config(&config, audit.clone()).expect("Failed to build recorder");

    let bus = Arc::new(EventBus::new());
    bus.subscribe(Arc::new(recorder));

    let store = Arc::new(MemoryStore::new());
    let facade = CacheFacade::new(store.clone(), bus);
    (facade, audit, store)
}

/// A write through a query-scoped facade is audited with the table tag
/// and the capturing call site.
#[tokio::test]
async fn test_write_through_query_scope_is_audited() {
    let (facade, audit, _store) = wired(LedgerConfig::default()).await;

    let extractor = TableReferenceExtractor::with_prefix("app_");
    let query = QueryDescription::for_table("app_user");
    let scoped = facade.for_query(&extractor, &query);

    scoped
        .set("active_users", json!([1, 2, 3]), None, CallContext::capture())
        .await
        .expect("Failed to write");

    let records = audit
        .find_by_key("active_users")
        .await
        .expect("Failed to query audit trail");
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.operation, Operation::Write);
    assert!(record.tags.contains("user"));
    assert!(record
        .file_path
        .as_deref()
        .is_some_and(|f| f.ends_with("ledger_integration.rs")));
    assert!(record.line_number.is_some());
    assert!(record.content_summary.is_some());
    assert!(record.content_fingerprint.is_some());
}

/// Keys matching the default exclusion patterns never reach the trail.
#[tokio::test]
async fn test_session_keys_are_excluded() {
    let (facade, audit, _store) = wired(LedgerConfig::default()).await;

    facade
        .set("session_abc123", json!("payload"), None, CallContext::capture())
        .await
        .expect("Failed to write");
    facade
        .set("csrf_token_xyz", json!("payload"), None, CallContext::capture())
        .await
        .expect("Failed to write");
    facade
        .set("profile_1", json!("payload"), None, CallContext::capture())
        .await
        .expect("Failed to write");

    let stats = audit.statistics().await.expect("Failed to load statistics");
    assert_eq!(stats.total, 1);
    assert!(audit
        .find_by_key("session_abc123")
        .await
        .unwrap()
        .is_empty());
}

/// `remember` runs the generator once; the repeat read produces no
/// second audit record.
#[tokio::test]
async fn test_remember_twice_audits_once() {
    let (facade, audit, _store) = wired(LedgerConfig::default()).await;

    let first = facade
        .remember(
            "report:today",
            Generator::new(|| json!({"rows": 42})),
            None,
            CallContext::capture(),
        )
        .await
        .expect("Failed to remember");
    assert_eq!(first, json!({"rows": 42}));

    let second = facade
        .remember(
            "report:today",
            Generator::new(|| panic!("generator must not run on a hit")),
            None,
            CallContext::capture(),
        )
        .await
        .expect("Failed to remember");
    assert_eq!(second, first);

    let records = audit
        .find_by_key("report:today")
        .await
        .expect("Failed to query audit trail");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, Operation::Write);
}

/// With a throttle window configured, rapid repeats of the same key
/// collapse to a single record while other keys pass through.
#[tokio::test]
async fn test_throttle_window_collapses_repeats() {
    let mut config = LedgerConfig::default();
    config.performance.throttle_seconds = 60;
    let (facade, audit, _store) = wired(config).await;

    for _ in 0..3 {
        facade
            .set("hot_key", json!(1), None, CallContext::capture())
            .await
            .expect("Failed to write");
    }
    facade
        .set("other_key", json!(2), None, CallContext::capture())
        .await
        .expect("Failed to write");

    assert_eq!(audit.find_by_key("hot_key").await.unwrap().len(), 1);
    assert_eq!(audit.find_by_key("other_key").await.unwrap().len(), 1);
}

/// Deleting by tag removes live entries and records the deletions.
#[tokio::test]
async fn test_delete_by_tag_scenario() {
    let (facade, audit, store) = wired(LedgerConfig::default()).await;

    let extractor = TableReferenceExtractor::new();
    let scoped = facade.for_query(&extractor, &QueryDescription::for_table("user"));
    scoped
        .set("user:1", json!({"name": "a"}), None, CallContext::capture())
        .await
        .expect("Failed to write");
    scoped
        .set("user:2", json!({"name": "b"}), None, CallContext::capture())
        .await
        .expect("Failed to write");

    // One of the tagged entries has since left the live store.
    use cache_ledger::store::TagStore;
    store.delete("user:2").await.expect("Failed to delete");

    let manager = CacheManager::new(store.clone(), audit.clone(), 1000);
    let outcome = manager
        .delete_by_tag("user")
        .await
        .expect("Failed to delete by tag");

    assert_eq!(outcome.deleted, vec!["user:1".to_string()]);
    assert_eq!(outcome.skipped, vec!["user:2".to_string()]);
    assert!(!store.has("user:1").await.unwrap());

    let deletes: Vec<_> = audit
        .find_by_key("user:1")
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.operation == Operation::Delete)
        .collect();
    assert_eq!(deletes.len(), 1);
    assert!(deletes[0].tags.contains("user"));
}

/// Disabling the ledger silences the trail without breaking caching.
#[tokio::test]
async fn test_disabled_ledger_records_nothing() {
    let mut config = LedgerConfig::default();
    config.enabled = false;
    let (facade, audit, _store) = wired(config).await;

    facade
        .set("k", json!(1), None, CallContext::capture())
        .await
        .expect("Failed to write");
    assert_eq!(facade.get("k").await.unwrap(), Some(json!(1)));

    let stats = audit.statistics().await.expect("Failed to load statistics");
    assert_eq!(stats.total, 0);
}

/// Delete and clear operations land in the trail with their own kinds.
#[tokio::test]
async fn test_delete_and_clear_are_audited() {
    let (facade, audit, _store) = wired(LedgerConfig::default()).await;

    facade
        .set("k", json!(1), None, CallContext::capture())
        .await
        .expect("Failed to write");
    facade
        .delete("k", CallContext::capture())
        .await
        .expect("Failed to delete");
    // Deleting an absent key publishes nothing.
    facade
        .delete("k", CallContext::capture())
        .await
        .expect("Failed to delete");
    facade
        .clear(CallContext::capture())
        .await
        .expect("Failed to clear");

    let stats = audit.statistics().await.expect("Failed to load statistics");
    assert_eq!(stats.operations.get("write"), Some(&1));
    assert_eq!(stats.operations.get("delete"), Some(&1));
    assert_eq!(stats.operations.get("clear"), Some(&1));
}
