//! Merging of auto-derived table tags with caller-supplied tags.

use super::TagSet;

/// Caller-supplied tags: absent, a single label, or a list.
#[derive(Debug, Clone, Default)]
pub enum TagInput {
    /// No caller tags.
    #[default]
    None,
    /// A single tag; treated as a singleton set.
    One(String),
    /// A list of tags, possibly with duplicates or empties.
    Many(Vec<String>),
}

impl From<&str> for TagInput {
    fn from(tag: &str) -> Self {
        Self::One(tag.to_string())
    }
}

impl From<String> for TagInput {
    fn from(tag: String) -> Self {
        Self::One(tag)
    }
}

impl From<Vec<String>> for TagInput {
    fn from(tags: Vec<String>) -> Self {
        Self::Many(tags)
    }
}

impl From<Vec<&str>> for TagInput {
    fn from(tags: Vec<&str>) -> Self {
        Self::Many(tags.into_iter().map(String::from).collect())
    }
}

/// Composes final tag sets from extractor output and caller input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagComposer;

impl TagComposer {
    /// Union of `auto` tags and caller tags, empties filtered, de-duplicated.
    #[must_use]
    pub fn compose(auto: &TagSet, caller: impl Into<TagInput>) -> TagSet {
        let mut tags = auto.clone();
        match caller.into() {
            TagInput::None => {}
            TagInput::One(tag) => tags.insert(tag),
            TagInput::Many(list) => {
                for tag in list {
                    tags.insert(tag);
                }
            }
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto() -> TagSet {
        ["user", "order"].into_iter().collect()
    }

    #[test]
    fn test_no_caller_tags() {
        let composed = TagComposer::compose(&auto(), TagInput::None);
        assert_eq!(composed, auto());
    }

    #[test]
    fn test_single_string() {
        let composed = TagComposer::compose(&auto(), "hot");
        assert_eq!(composed.len(), 3);
        assert!(composed.contains("hot"));
    }

    #[test]
    fn test_list_with_duplicates_and_empties() {
        let composed = TagComposer::compose(&auto(), vec!["user", "", "report", "report"]);
        assert_eq!(composed.len(), 3);
        assert!(composed.contains("report"));
        assert!(!composed.contains(""));
    }

    #[test]
    fn test_empty_auto() {
        let composed = TagComposer::compose(&TagSet::new(), vec!["a", "b"]);
        assert_eq!(composed.len(), 2);
    }
}
