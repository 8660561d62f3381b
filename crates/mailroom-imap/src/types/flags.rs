//! Message flags.

use std::fmt;

/// Message flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message has been answered.
    Answered,
    /// Message is flagged for special attention.
    Flagged,
    /// Message is marked for deletion.
    Deleted,
    /// Message is a draft.
    Draft,
    /// Message is recent (first session to see it).
    Recent,
    /// Keyword or unknown system flag, as sent.
    Keyword(String),
}

static SYSTEM_FLAGS: [(Flag, &str); 6] = [
    (Flag::Seen, "\\Seen"),
    (Flag::Answered, "\\Answered"),
    (Flag::Flagged, "\\Flagged"),
    (Flag::Deleted, "\\Deleted"),
    (Flag::Draft, "\\Draft"),
    (Flag::Recent, "\\Recent"),
];

impl Flag {
    /// Reads a flag as sent by the server; system flag names are matched
    /// without regard to case.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        SYSTEM_FLAGS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map_or_else(|| Self::Keyword(s.to_string()), |(flag, _)| flag.clone())
    }

    /// Wire spelling of the flag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        if let Self::Keyword(keyword) = self {
            return keyword;
        }
        SYSTEM_FLAGS
            .iter()
            .find(|(flag, _)| flag == self)
            .map_or("", |(_, name)| *name)
    }

    /// True for `\Recent`, which clients may not set.
    #[must_use]
    pub const fn is_server_only(&self) -> bool {
        matches!(self, Self::Recent)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
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
    fn test_flag_parse() {
        assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\FLAGGED"), Flag::Flagged);
        assert_eq!(Flag::parse("$Forwarded"), Flag::Keyword("$Forwarded".to_string()));
    }

    #[test]
    fn test_recent_is_server_only() {
        assert!(Flag::parse("\\recent").is_server_only());
        assert!(!Flag::Seen.is_server_only());
    }

    #[test]
    fn test_flag_display_keeps_keyword_spelling() {
        assert_eq!(Flag::Deleted.to_string(), "\\Deleted");
        assert_eq!(Flag::parse("$Junk").to_string(), "$Junk");
    }
}
