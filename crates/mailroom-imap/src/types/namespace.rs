//! NAMESPACE response types (RFC 2342).

use crate::response::{Item, Response};

/// One namespace: a prefix and its hierarchy delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// Folder name prefix, e.g. `""` or `"#shared."`.
    pub prefix: String,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
}

/// The three namespace classes advertised by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    /// The user's own folders.
    pub personal: Vec<NamespaceEntry>,
    /// Other users' folders.
    pub other_users: Vec<NamespaceEntry>,
    /// Shared folders.
    pub shared: Vec<NamespaceEntry>,
}

impl Namespace {
    /// Builds the namespace from `* NAMESPACE <personal> <other> <shared>`.
    ///
    /// `NIL` classes are empty.
    #[must_use]
    pub fn from_response(response: &Response) -> Option<Self> {
        let [personal, other_users, shared, ..] = response.data() else {
            return None;
        };

        Some(Self {
            personal: entries(personal)?,
            other_users: entries(other_users)?,
            shared: entries(shared)?,
        })
    }

    /// Returns the delimiter of the first personal namespace.
    #[must_use]
    pub fn personal_delimiter(&self) -> Option<char> {
        self.personal.first().and_then(|entry| entry.delimiter)
    }
}

fn entries(item: &Item) -> Option<Vec<NamespaceEntry>> {
    if item.is_nil() {
        return Some(Vec::new());
    }

    item.as_list()?
        .iter()
        .map(|entry| {
            // Extension data after the delimiter is ignored.
            let [prefix, delimiter, ..] = entry.as_list()? else {
                return None;
            };
            Some(NamespaceEntry {
                prefix: prefix.to_text()?,
                delimiter: delimiter.as_str().and_then(|d| d.chars().next()),
            })
        })
        .collect()
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
    use crate::parser::ResponseParser;

    #[test]
    fn test_namespace_with_nil_class() {
        let response =
            ResponseParser::parse(b"* NAMESPACE ((\"\" \"/\")) NIL ((\"#shared.\" \".\"))\r\n").unwrap();
        let namespace = Namespace::from_response(&response).unwrap();

        assert_eq!(namespace.personal.len(), 1);
        assert_eq!(namespace.personal[0].prefix, "");
        assert_eq!(namespace.personal_delimiter(), Some('/'));
        assert!(namespace.other_users.is_empty());
        assert_eq!(namespace.shared[0].prefix, "#shared.");
        assert_eq!(namespace.shared[0].delimiter, Some('.'));
    }

    #[test]
    fn test_namespace_nil_delimiter_and_extensions() {
        let response = ResponseParser::parse(
            b"* NAMESPACE ((\"INBOX.\" NIL \"X-PARAM\" (\"FLAG1\"))) NIL NIL\r\n",
        )
        .unwrap();
        let namespace = Namespace::from_response(&response).unwrap();
        assert_eq!(namespace.personal[0].prefix, "INBOX.");
        assert_eq!(namespace.personal[0].delimiter, None);
    }

    #[test]
    fn test_namespace_malformed() {
        let response = ResponseParser::parse(b"* NAMESPACE NIL NIL\r\n").unwrap();
        assert!(Namespace::from_response(&response).is_none());

        let response = ResponseParser::parse(b"* NAMESPACE (\"\") NIL NIL\r\n").unwrap();
        assert!(Namespace::from_response(&response).is_none());
    }
}
