//! Table name extraction from structured query descriptions.

use serde::{Deserialize, Serialize};

use super::TagSet;
use crate::config::DatabaseConfig;

/// A table reference as it appears in a query: either a raw name (which may
/// carry an alias suffix like `"users u"` or a schema qualifier like
/// `"analytics.orders"`) or an explicit name/alias pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableRef {
    /// Raw table expression, possibly aliased or schema-qualified.
    Named(String),
    /// Explicit `{ name, alias }` form.
    Aliased { name: String, alias: String },
}

impl TableRef {
    /// Create a raw reference.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Create an explicit name/alias pair.
    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Aliased {
            name: name.into(),
            alias: alias.into(),
        }
    }
}

/// Read-only description of a query: the primary table, its joins, and any
/// eager-loaded relation names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDescription {
    /// The primary table, if known.
    pub table: Option<TableRef>,
    /// Joined tables.
    #[serde(default)]
    pub joins: Vec<TableRef>,
    /// Relation names from eager-loading directives.
    #[serde(default)]
    pub relations: Vec<String>,
}

impl QueryDescription {
    /// Describe a query over a single table.
    pub fn for_table(name: impl Into<String>) -> Self {
        Self {
            table: Some(TableRef::named(name)),
            joins: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Add a joined table.
    #[must_use]
    pub fn join(mut self, table: TableRef) -> Self {
        self.joins.push(table);
        self
    }

    /// Add an eager-loaded relation name.
    #[must_use]
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relations.push(relation.into());
        self
    }
}

/// Extracts the distinct set of table names a query touches.
///
/// Never fails: references that cannot be parsed are skipped.
#[derive(Debug, Clone, Default)]
pub struct TableReferenceExtractor {
    table_prefix: Option<String>,
}

impl TableReferenceExtractor {
    /// Extractor with no table-prefix convention.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor that strips a conventional table prefix (e.g. `"app_"`).
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            table_prefix: (!prefix.is_empty()).then_some(prefix),
        }
    }

    /// Extractor honoring the configured table prefix.
    #[must_use]
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::with_prefix(config.table_prefix.clone())
    }

    /// Extract the cleaned set of table names from `query`.
    ///
    /// Order is irrelevant; callers must treat the result as a set.
    #[must_use]
    pub fn extract(&self, query: &QueryDescription) -> TagSet {
        let mut tags = TagSet::new();

        if let Some(table) = &query.table {
            if let Some(name) = self.clean(table) {
                tags.insert(name);
            }
        }

        for join in &query.joins {
            if let Some(name) = self.clean(join) {
                tags.insert(name);
            }
        }

        for relation in &query.relations {
            if let Some(name) = self.clean_name(relation) {
                tags.insert(name);
            }
        }

        tags
    }

    fn clean(&self, table: &TableRef) -> Option<String> {
        match table {
            TableRef::Named(raw) => self.clean_name(raw),
            TableRef::Aliased { name, .. } => self.clean_name(name),
        }
    }

    /// Strip alias suffix, schema qualifier, and configured prefix.
    fn clean_name(&self, raw: &str) -> Option<String> {
        // "users u" → "users"
        let mut name = raw.trim().split_whitespace().next()?;

        // "analytics.orders" → "orders"
        if let Some((_, rest)) = name.rsplit_once('.') {
            name = rest;
        }

        let name = match &self.table_prefix {
            Some(prefix) => name.strip_prefix(prefix.as_str()).unwrap_or(name),
            None => name,
        };

        (!name.is_empty()).then(|| name.to_string())
    }
}
