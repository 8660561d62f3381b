//! Command tag allocation and round-trip tracking.
//!
//! Tags are `TAG1`, `TAG2`, ... for the lifetime of a connection. Each issued
//! tag stays pending until its completion response arrives.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::Tag;

/// Prefix of every generated tag.
pub const TAG_PREFIX: &str = "TAG";

/// Allocates tags and remembers when each pending one was issued.
#[derive(Debug)]
pub struct TagManager {
    prefix: String,
    counter: u64,
    pending: HashMap<String, Instant>,
}

impl TagManager {
    /// Creates a manager with the [`TAG_PREFIX`] prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix(TAG_PREFIX)
    }

    /// Creates a manager with a custom prefix.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
            pending: HashMap::new(),
        }
    }

    /// Issues the next tag and marks it pending.
    pub fn new_tag(&mut self) -> Tag {
        self.counter += 1;
        let tag = self.format(self.counter);
        self.pending.insert(tag.clone(), Instant::now());
        Tag(tag)
    }

    /// Returns the last issued tag without issuing a new one.
    ///
    /// Before the first command this is `<prefix>0`, which never matches a
    /// server response.
    #[must_use]
    pub fn current_tag(&self) -> Tag {
        Tag(self.format(self.counter))
    }

    /// Returns true if `tag` was issued and has not completed.
    #[must_use]
    pub fn is_pending(&self, tag: &str) -> bool {
        self.pending.contains_key(tag)
    }

    /// Marks `tag` complete and returns its round-trip time.
    pub fn complete(&mut self, tag: &str) -> Option<Duration> {
        self.pending.remove(tag).map(|issued| issued.elapsed())
    }

    /// Returns the number of pending tags.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn format(&self, n: u64) -> String {
        format!("{}{n}", self.prefix)
    }
}

impl Default for TagManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_first_tag() {
        let mut tags = TagManager::new();
        assert_eq!(tags.new_tag().as_str(), "TAG1");
        assert_eq!(tags.current_tag().as_str(), "TAG1");
        assert_eq!(tags.new_tag().as_str(), "TAG2");
    }

    #[test]
    fn test_current_before_first() {
        let tags = TagManager::new();
        assert_eq!(tags.current_tag().as_str(), "TAG0");
        assert!(!tags.is_pending("TAG0"));
    }

    #[test]
    fn test_pending_lifecycle() {
        let mut tags = TagManager::new();
        let tag = tags.new_tag();
        assert!(tags.is_pending(tag.as_str()));
        assert!(tags.complete(tag.as_str()).is_some());
        assert!(!tags.is_pending(tag.as_str()));
        assert!(tags.complete(tag.as_str()).is_none());
        assert_eq!(tags.pending_count(), 0);
    }

    #[test]
    fn test_custom_prefix() {
        let mut tags = TagManager::with_prefix("A");
        assert_eq!(tags.new_tag().as_str(), "A1");
    }

    proptest! {
        #[test]
        fn prop_tags_never_repeat(count in 1usize..500) {
            let mut tags = TagManager::new();
            let mut seen = HashSet::new();
            for _ in 0..count {
                let tag = tags.new_tag();
                prop_assert!(seen.insert(tag.0.clone()));
                tags.complete(tag.as_str());
            }
        }
    }
}
