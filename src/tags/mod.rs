//! Tag derivation for cache entries.
//!
//! Tags associate a cache entry with the tables a query touched (or with
//! caller-defined labels) so that whole groups of entries can be invalidated
//! together. This module derives table tags from a structured query
//! description and merges them with caller-supplied tags.

mod composer;
mod extractor;

pub use composer::{TagComposer, TagInput};
pub use extractor::{QueryDescription, TableRef, TableReferenceExtractor};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A de-duplicated set of non-empty tag strings.
///
/// Insertion silently drops empty strings, so the no-empty/no-duplicate
/// invariant holds by construction. Iteration order is stable (sorted),
/// which keeps serialized forms deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// Create an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, ignoring empty strings.
    pub fn insert(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !tag.is_empty() {
            self.0.insert(tag);
        }
    }

    /// Union with another tag set.
    pub fn extend_from(&mut self, other: &TagSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Whether the set contains `tag`.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Serialize to a JSON array string for database storage.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl IntoIterator for TagSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
