//! Durable audit trail backed by `SQLite`, with async operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, Row};
use tokio::sync::Mutex;

use super::error::AuditError;
use super::schema::SCHEMA;
use super::types::{AuditRecord, NewAuditRecord, Page, SearchFilter, Statistics};
use crate::events::Operation;
use crate::tags::TagSet;

/// Returns the default path for the audit database.
///
/// This is `~/.local/share/cache-ledger/cache_log.db` on Unix systems.
#[must_use]
pub fn default_audit_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cache-ledger")
        .join("cache_log.db")
}

const COLUMNS: &str = "id, cache_key, operation, file_path, line_number, content_summary, \
                       content_fingerprint, tags, expire_seconds, request_uri, user_agent, \
                       created_at, updated_at";

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AuditRecord> {
    let operation: String = row.get(2)?;
    let line_number: Option<i64> = row.get(4)?;
    let tags: String = row.get(7)?;
    let expire_seconds: i64 = row.get(8)?;
    let created_at: String = row.get(11)?;
    let updated_at: Option<String> = row.get(12)?;

    Ok(AuditRecord {
        id: row.get(0)?,
        cache_key: row.get(1)?,
        operation: Operation::parse(&operation).unwrap_or(Operation::Write),
        file_path: row.get(3)?,
        line_number: line_number.and_then(|n| u32::try_from(n).ok()),
        content_summary: row.get(5)?,
        content_fingerprint: row.get(6)?,
        tags: serde_json::from_str::<TagSet>(&tags).unwrap_or_default(),
        expire_seconds: u64::try_from(expire_seconds).unwrap_or(0),
        request_uri: row.get(9)?,
        user_agent: row.get(10)?,
        created_at: parse_timestamp(&created_at),
        updated_at: updated_at.as_deref().map(parse_timestamp),
    })
}

/// Pattern matching a JSON-encoded tag array containing `tag`.
fn tag_like_pattern(tag: &str) -> String {
    format!("%\"{tag}\"%")
}

/// The durable table of audit records.
///
/// Uses `SQLite` with async operations via `spawn_blocking`, sharing the
/// connection behind a mutex so concurrent workers serialize their access.
#[derive(Debug, Clone)]
pub struct AuditStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl AuditStore {
    /// Open an audit store at the specified path.
    ///
    /// Creates parent directories if they don't exist and initializes the
    /// schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    AuditError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, AuditError> {
            let conn =
                Connection::open(&path_clone).map_err(|source| AuditError::DatabaseOpen {
                    path: path_clone,
                    source,
                })?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory audit store for testing.
    pub async fn open_in_memory() -> Result<Self, AuditError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, AuditError> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persist a record; returns the assigned id.
    pub async fn create(&self, record: &NewAuditRecord) -> Result<i64, AuditError> {
        let record = record.clone();
        let created_at = now_string();

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<i64, AuditError> {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO cache_log (cache_key, operation, file_path, line_number, \
                 content_summary, content_fingerprint, tags, expire_seconds, request_uri, \
                 user_agent, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.cache_key,
                    record.operation.as_str(),
                    record.file_path,
                    record.line_number,
                    record.content_summary,
                    record.content_fingerprint,
                    record.tags.to_json(),
                    i64::try_from(record.expire_seconds).unwrap_or(i64::MAX),
                    record.request_uri,
                    record.user_agent,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// All records for a key, newest first.
    pub async fn find_by_key(&self, key: &str) -> Result<Vec<AuditRecord>, AuditError> {
        let key = key.to_string();
        self.query_records(
            format!(
                "SELECT {COLUMNS} FROM cache_log WHERE cache_key = ?1 \
                 ORDER BY created_at DESC, id DESC"
            ),
            vec![SqlValue::Text(key)],
        )
        .await
    }

    /// All records whose tag set contains `tag`, newest first.
    pub async fn find_by_tag(&self, tag: &str) -> Result<Vec<AuditRecord>, AuditError> {
        let pattern = tag_like_pattern(tag);
        self.query_records(
            format!(
                "SELECT {COLUMNS} FROM cache_log WHERE tags LIKE ?1 \
                 ORDER BY created_at DESC, id DESC"
            ),
            vec![SqlValue::Text(pattern)],
        )
        .await
    }

    /// The most recent records, newest first.
    pub async fn recent(&self, limit: u64) -> Result<Vec<AuditRecord>, AuditError> {
        self.query_records(
            format!(
                "SELECT {COLUMNS} FROM cache_log \
                 ORDER BY created_at DESC, id DESC LIMIT ?1"
            ),
            vec![SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX))],
        )
        .await
    }

    /// The newest record for a key, if any.
    pub async fn latest_for_key(&self, key: &str) -> Result<Option<AuditRecord>, AuditError> {
        let mut records = self.find_by_key(key).await?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.remove(0))
        })
    }

    /// Search with filters and pagination.
    pub async fn search(&self, filter: &SearchFilter) -> Result<Page<AuditRecord>, AuditError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(key) = filter.key_contains.as_ref().filter(|s| !s.is_empty()) {
            clauses.push("cache_key LIKE ?");
            values.push(SqlValue::Text(format!("%{key}%")));
        }
        if let Some(operation) = filter.operation {
            clauses.push("operation = ?");
            values.push(SqlValue::Text(operation.as_str().to_string()));
        }
        if let Some(file) = filter.file_contains.as_ref().filter(|s| !s.is_empty()) {
            clauses.push("file_path LIKE ?");
            values.push(SqlValue::Text(format!("%{file}%")));
        }
        if let Some(from) = filter.from {
            clauses.push("created_at >= ?");
            values.push(SqlValue::Text(timestamp_string(from)));
        }
        if let Some(to) = filter.to {
            clauses.push("created_at <= ?");
            values.push(SqlValue::Text(timestamp_string(to)));
        }
        if let Some(tag) = filter.tag.as_ref().filter(|s| !s.is_empty()) {
            clauses.push("tags LIKE ?");
            values.push(SqlValue::Text(tag_like_pattern(tag)));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let page = filter.page.max(1);
        let per_page = if filter.per_page == 0 {
            20
        } else {
            filter.per_page
        };
        let offset = (page - 1).saturating_mul(per_page);

        let count_sql = format!("SELECT COUNT(*) FROM cache_log{where_sql}");
        let page_sql = format!(
            "SELECT {COLUMNS} FROM cache_log{where_sql} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Page<AuditRecord>, AuditError> {
            let conn = conn.blocking_lock();

            let total: i64 = conn.query_row(
                &count_sql,
                rusqlite::params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let mut page_values = values;
            page_values.push(SqlValue::Integer(
                i64::try_from(per_page).unwrap_or(i64::MAX),
            ));
            page_values.push(SqlValue::Integer(
                i64::try_from(offset).unwrap_or(i64::MAX),
            ));

            let mut stmt = conn.prepare(&page_sql)?;
            let records = stmt
                .query_map(rusqlite::params_from_iter(page_values.iter()), |row| {
                    record_from_row(row)
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Page {
                records,
                total: total.unsigned_abs(),
                page,
                per_page,
            })
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Aggregate counts: total, today (UTC), per operation.
    pub async fn statistics(&self) -> Result<Statistics, AuditError> {
        let today_start = timestamp_string(
            Utc::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .unwrap_or_default()
                .and_utc(),
        );

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Statistics, AuditError> {
            let conn = conn.blocking_lock();

            let total: i64 = conn.query_row("SELECT COUNT(*) FROM cache_log", [], |row| {
                row.get(0)
            })?;
            let today: i64 = conn.query_row(
                "SELECT COUNT(*) FROM cache_log WHERE created_at >= ?1",
                params![today_start],
                |row| row.get(0),
            )?;

            let mut stmt =
                conn.prepare("SELECT operation, COUNT(*) FROM cache_log GROUP BY operation")?;
            let operations = stmt
                .query_map([], |row| {
                    let operation: String = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    Ok((operation, count.unsigned_abs()))
                })?
                .collect::<Result<_, _>>()?;

            Ok(Statistics {
                total: total.unsigned_abs(),
                today: today.unsigned_abs(),
                operations,
            })
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Delete records older than `days` days; returns the deleted count.
    pub async fn prune_older_than(&self, days: u32) -> Result<u64, AuditError> {
        let cutoff = timestamp_string(Utc::now() - chrono::Duration::days(i64::from(days)));

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, AuditError> {
            let conn = conn.blocking_lock();
            let deleted = conn.execute(
                "DELETE FROM cache_log WHERE created_at < ?1",
                params![cutoff],
            )?;
            Ok(deleted as u64)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Distinct keys observed in write records, most recently written first,
    /// bounded to `limit`.
    pub async fn distinct_write_keys(&self, limit: u64) -> Result<Vec<String>, AuditError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<String>, AuditError> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT cache_key, MAX(created_at) AS last_write FROM cache_log \
                 WHERE operation = 'write' GROUP BY cache_key \
                 ORDER BY last_write DESC LIMIT ?1",
            )?;
            let keys = stmt
                .query_map(
                    params![i64::try_from(limit).unwrap_or(i64::MAX)],
                    |row| row.get::<_, String>(0),
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Union of tags across all records with a non-empty tag set.
    pub async fn all_tags(&self) -> Result<Vec<String>, AuditError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<String>, AuditError> {
            let conn = conn.blocking_lock();
            let mut stmt =
                conn.prepare("SELECT tags FROM cache_log WHERE tags != '[]'")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut union = TagSet::new();
            for raw in rows {
                if let Ok(tags) = serde_json::from_str::<TagSet>(&raw) {
                    union.extend_from(&tags);
                }
            }
            Ok(union.into_iter().collect())
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Touch a record's `updated_at` bookkeeping timestamp.
    pub async fn touch(&self, id: i64) -> Result<(), AuditError> {
        let updated_at = now_string();

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), AuditError> {
            let conn = conn.blocking_lock();
            conn.execute(
                "UPDATE cache_log SET updated_at = ?1 WHERE id = ?2",
                params![updated_at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    async fn query_records(
        &self,
        sql: String,
        values: Vec<SqlValue>,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<AuditRecord>, AuditError> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(rusqlite::params_from_iter(values.iter()), |row| {
                    record_from_row(row)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }
}
