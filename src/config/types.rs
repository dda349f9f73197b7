//! Configuration types.

use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Top-level configuration for the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Global switch; when false nothing is recorded.
    pub enabled: bool,
    /// Days audit records are kept before pruning.
    pub retention_days: u32,
    /// Whether to summarize written content.
    pub log_content: bool,
    /// Maximum summary byte length before truncation.
    pub max_summary_length: usize,
    /// Key regexes that are never recorded.
    pub exclude_key_patterns: Vec<String>,
    /// Caller-file regexes that are never recorded.
    pub exclude_file_patterns: Vec<String>,
    /// Throttling and monitoring knobs.
    pub performance: PerformanceConfig,
    /// Database location and naming conventions.
    pub database: DatabaseConfig,
    /// Read-side admin surface knobs.
    pub admin: AdminConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 30,
            log_content: true,
            max_summary_length: 10240,
            exclude_key_patterns: vec![
                "^session_".to_string(),
                "^csrf_token_".to_string(),
                "^captcha_".to_string(),
            ],
            exclude_file_patterns: vec!["vendor/".to_string(), "target/".to_string()],
            performance: PerformanceConfig::default(),
            database: DatabaseConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Throttling and monitoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Monitoring switch; when false nothing is recorded.
    pub enable_monitoring: bool,
    /// Minimum seconds between two records for the same key; 0 disables.
    pub throttle_seconds: u64,
    /// Throttle map size cap before pruning.
    pub throttle_cap: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enable_monitoring: true,
            throttle_seconds: 0,
            throttle_cap: 1000,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Audit database path; the per-user default when unset.
    pub path: Option<PathBuf>,
    /// Conventional table prefix stripped by the tag extractor.
    pub table_prefix: String,
}

/// Read-side admin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Default page size for list endpoints.
    pub page_size: u64,
    /// Bound on the known-key scan.
    pub scan_limit: u64,
    /// Whether cache values appear in detail responses.
    pub show_cache_value: bool,
    /// Maximum displayed value length.
    pub max_value_display_length: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            scan_limit: 1000,
            show_cache_value: true,
            max_value_display_length: 1000,
        }
    }
}

/// Key and file exclusion patterns, compiled once.
///
/// Patterns are evaluated in order; the first match excludes.
#[derive(Debug, Default)]
pub struct ExclusionRules {
    key_patterns: Vec<Regex>,
    file_patterns: Vec<Regex>,
}

impl ExclusionRules {
    /// Compile the configured pattern lists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` for the first pattern that
    /// fails to compile.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            key_patterns: compile_all(&config.exclude_key_patterns)?,
            file_patterns: compile_all(&config.exclude_file_patterns)?,
        })
    }

    /// Whether a cache key is excluded from recording.
    #[must_use]
    pub fn excludes_key(&self, key: &str) -> bool {
        self.key_patterns.iter().any(|p| p.is_match(key))
    }

    /// Whether a caller file path is excluded from recording.
    #[must_use]
    pub fn excludes_file(&self, file: &str) -> bool {
        self.file_patterns.iter().any(|p| p.is_match(file))
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.retention_days, 30);
        assert!(config.log_content);
        assert_eq!(config.max_summary_length, 10240);
        assert!(config.performance.enable_monitoring);
        assert_eq!(config.performance.throttle_seconds, 0);
        assert_eq!(config.performance.throttle_cap, 1000);
        assert_eq!(config.admin.page_size, 20);
        assert_eq!(config.admin.scan_limit, 1000);
    }

    #[test]
    fn test_exclusion_rules_from_defaults() {
        let rules = ExclusionRules::from_config(&LedgerConfig::default()).unwrap();

        assert!(rules.excludes_key("session_abc"));
        assert!(rules.excludes_key("csrf_token_1"));
        assert!(!rules.excludes_key("active_users"));

        assert!(rules.excludes_file("vendor/pkg/lib.rs"));
        assert!(!rules.excludes_file("app/service.rs"));
    }

    #[test]
    fn test_invalid_pattern_surfaces() {
        let mut config = LedgerConfig::default();
        config.exclude_key_patterns.push("[".to_string());

        let err = ExclusionRules::from_config(&config).unwrap_err();
        assert!(err.to_string().contains('['));
    }

    #[test]
    fn test_toml_roundtrip_with_partial_fields() {
        let toml_str = r#"
            retention_days = 7

            [performance]
            throttle_seconds = 60
        "#;

        let config: LedgerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.performance.throttle_seconds, 60);
        // Everything else keeps its default.
        assert!(config.enabled);
        assert_eq!(config.performance.throttle_cap, 1000);
        assert_eq!(config.admin.page_size, 20);
    }
}
