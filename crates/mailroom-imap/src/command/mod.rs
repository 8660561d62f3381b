//! Request building.
//!
//! Tags, parameter escaping and the modified UTF-7 mailbox encoding.

mod param;
mod tags;
pub mod utf7;

pub use param::{Param, QUOTED_PLACEHOLDER, RequestLine, quote};
pub use tags::{TAG_PREFIX, TagManager};

/// STORE flag operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace the flags (`FLAGS`).
    SetFlags,
    /// Add flags (`+FLAGS`).
    AddFlags,
    /// Remove flags (`-FLAGS`).
    RemoveFlags,
}

impl StoreAction {
    /// Returns the STORE data item name.
    #[must_use]
    pub const fn item(self, silent: bool) -> &'static str {
        match (self, silent) {
            (Self::SetFlags, false) => "FLAGS",
            (Self::SetFlags, true) => "FLAGS.SILENT",
            (Self::AddFlags, false) => "+FLAGS",
            (Self::AddFlags, true) => "+FLAGS.SILENT",
            (Self::RemoveFlags, false) => "-FLAGS",
            (Self::RemoveFlags, true) => "-FLAGS.SILENT",
        }
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

    #[test]
    fn test_store_action_items() {
        assert_eq!(StoreAction::AddFlags.item(false), "+FLAGS");
        assert_eq!(StoreAction::RemoveFlags.item(true), "-FLAGS.SILENT");
        assert_eq!(StoreAction::SetFlags.item(false), "FLAGS");
    }
}
