//! METADATA response types (RFC 5464).

use crate::response::Response;

/// One annotation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    /// Mailbox the entry belongs to; empty for server annotations.
    pub mailbox: String,
    /// Entry name, e.g. `/private/comment`.
    pub name: String,
    /// Value; `None` when unset.
    pub value: Option<Vec<u8>>,
}

impl MetadataEntry {
    /// Reads `* METADATA <mailbox> (<entry> <value> ...)`.
    #[must_use]
    pub fn from_response(response: &Response) -> Vec<Self> {
        let [mailbox, values, ..] = response.data() else {
            return Vec::new();
        };
        let (Some(mailbox), Some(values)) = (mailbox.to_text(), values.as_list()) else {
            return Vec::new();
        };

        values
            .chunks_exact(2)
            .filter_map(|pair| {
                Some(Self {
                    mailbox: mailbox.clone(),
                    name: pair[0].to_text()?,
                    value: pair[1].as_bytes().map(<[u8]>::to_vec),
                })
            })
            .collect()
    }

    /// Returns the value as text, if set and valid UTF-8.
    #[must_use]
    pub fn value_str(&self) -> Option<&str> {
        self.value
            .as_deref()
            .and_then(|v| std::str::from_utf8(v).ok())
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
    use crate::parser::ResponseParser;

    #[test]
    fn test_metadata_entries() {
        let response = ResponseParser::parse(
            b"* METADATA \"INBOX\" (/private/comment \"My own comment\" /shared/comment NIL)\r\n",
        )
        .unwrap();
        let entries = MetadataEntry::from_response(&response);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].mailbox, "INBOX");
        assert_eq!(entries[0].name, "/private/comment");
        assert_eq!(entries[0].value_str(), Some("My own comment"));
        assert_eq!(entries[1].value, None);
    }

    #[test]
    fn test_metadata_literal_value() {
        let response =
            ResponseParser::parse(b"* METADATA \"\" (/shared/admin {6}\r\na\r\nb\r\n)\r\n").unwrap();
        let entries = MetadataEntry::from_response(&response);
        assert_eq!(entries[0].mailbox, "");
        assert_eq!(entries[0].value.as_deref(), Some(&b"a\r\nb\r\n"[..]));
    }

    #[test]
    fn test_metadata_malformed() {
        let response = ResponseParser::parse(b"* METADATA INBOX\r\n").unwrap();
        assert!(MetadataEntry::from_response(&response).is_empty());
    }
}
