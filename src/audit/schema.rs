//! Database schema for the cache audit trail.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the audit database.
pub const SCHEMA: &str = r"
-- Enable WAL mode for better concurrent read/write performance
PRAGMA journal_mode = WAL;

-- One row per cache mutation that passed the recorder's filters
CREATE TABLE IF NOT EXISTS cache_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cache_key TEXT NOT NULL,
    operation TEXT NOT NULL,
    file_path TEXT,
    line_number INTEGER,
    content_summary TEXT,
    content_fingerprint TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    expire_seconds INTEGER NOT NULL DEFAULT 0,
    request_uri TEXT,
    user_agent TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

-- Schema version table for migrations
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Indexes for efficient queries
CREATE INDEX IF NOT EXISTS idx_cache_log_key ON cache_log(cache_key);
CREATE INDEX IF NOT EXISTS idx_cache_log_operation ON cache_log(operation);
CREATE INDEX IF NOT EXISTS idx_cache_log_created_at ON cache_log(created_at);
";
