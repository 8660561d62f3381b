//! Parsed server responses.
//!
//! A [`Response`] is one logical protocol response: a line plus any literal
//! payloads it announced. Responses of one command cycle are gathered in a
//! [`ResponseCollection`] or pulled one by one from an [`UntaggedStream`].

mod collection;
mod stream;

pub use collection::ResponseCollection;
pub use stream::UntaggedStream;

use crate::types::{ResponseCode, Status, Tag};

/// Kind of a server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Completion of a command, prefixed by its tag.
    Tagged,
    /// Server data, prefixed by `*`.
    Untagged,
    /// Request for more client data, prefixed by `+`.
    Continuation,
}

/// One data item inside a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// Atom, number or flag (`\Seen`, `BODY[HEADER]`).
    Atom(String),
    /// Quoted string.
    String(Vec<u8>),
    /// Literal payload.
    Literal(Vec<u8>),
    /// `NIL`.
    Nil,
    /// Parenthesized list.
    List(Vec<Item>),
}

impl Item {
    /// Returns the text of an atom, string or UTF-8 literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Atom(s) => Some(s),
            Self::String(bytes) | Self::Literal(bytes) => std::str::from_utf8(bytes).ok(),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Returns the raw bytes of an atom, string or literal.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Atom(s) => Some(s.as_bytes()),
            Self::String(bytes) | Self::Literal(bytes) => Some(bytes),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Returns the elements of a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Parses an atom as an unsigned number.
    #[must_use]
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Atom(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns true for `NIL`.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Returns true if this is an atom equal to `name`, ignoring case.
    #[must_use]
    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Self::Atom(s) if s.eq_ignore_ascii_case(name))
    }

    /// Returns the text lossily decoded; `None` for `NIL` and lists.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        self.as_bytes()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// One parsed logical response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Tagged, untagged or continuation.
    pub kind: ResponseKind,
    /// Tag of a tagged response.
    pub tag: Option<Tag>,
    /// Token after the prefix: a status (`OK`), a keyword (`CAPABILITY`)
    /// or a message number (`12` in `* 12 FETCH`). Empty for continuations.
    pub status_or_index: String,
    /// Data items after `status_or_index`. Empty for status responses.
    pub items: Vec<Item>,
    /// Bracketed response code of a status response.
    pub code: Option<ResponseCode>,
    /// Human-readable text of a status response or continuation.
    pub text: String,
}

impl Response {
    /// Returns true for tagged responses.
    #[must_use]
    pub fn is_tagged(&self) -> bool {
        self.kind == ResponseKind::Tagged
    }

    /// Returns true for untagged responses.
    #[must_use]
    pub fn is_untagged(&self) -> bool {
        self.kind == ResponseKind::Untagged
    }

    /// Returns true for continuation requests.
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.kind == ResponseKind::Continuation
    }

    /// Returns the status of a status response.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self.kind {
            ResponseKind::Continuation => None,
            _ => Status::parse(&self.status_or_index),
        }
    }

    /// Returns the message number of `* <n> KEYWORD` responses.
    #[must_use]
    pub fn number(&self) -> Option<u32> {
        if self.is_untagged() {
            self.status_or_index.parse().ok()
        } else {
            None
        }
    }

    /// Returns the response keyword.
    ///
    /// For `* 3 EXISTS` this is `EXISTS`; otherwise it is `status_or_index`.
    #[must_use]
    pub fn keyword(&self) -> &str {
        if self.number().is_some() {
            self.items.first().and_then(Item::as_str).unwrap_or_default()
        } else {
            &self.status_or_index
        }
    }

    /// Returns true if this is an untagged response with `keyword`.
    #[must_use]
    pub fn is_untagged_keyword(&self, keyword: &str) -> bool {
        self.is_untagged() && self.keyword().eq_ignore_ascii_case(keyword)
    }

    /// Returns the data items after the keyword.
    ///
    /// For numbered responses the keyword item itself is skipped.
    #[must_use]
    pub fn data(&self) -> &[Item] {
        if self.number().is_some() {
            self.items.get(1..).unwrap_or_default()
        } else {
            &self.items
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
    use crate::parser::ResponseParser;

    #[test]
    fn test_numbered_keyword() {
        let response = ResponseParser::parse(b"* 23 EXISTS\r\n").unwrap();
        assert_eq!(response.number(), Some(23));
        assert_eq!(response.keyword(), "EXISTS");
        assert!(response.is_untagged_keyword("exists"));
        assert!(response.data().is_empty());
    }

    #[test]
    fn test_plain_keyword() {
        let response = ResponseParser::parse(b"* SEARCH 2 84 882\r\n").unwrap();
        assert_eq!(response.number(), None);
        assert_eq!(response.keyword(), "SEARCH");
        let numbers: Vec<u64> = response.data().iter().filter_map(Item::as_number).collect();
        assert_eq!(numbers, [2, 84, 882]);
    }

    #[test]
    fn test_status_of_tagged() {
        let response = ResponseParser::parse(b"TAG4 NO [TRYCREATE] No such mailbox\r\n").unwrap();
        assert_eq!(response.status(), Some(Status::No));
        assert_eq!(response.tag, Some(Tag::new("TAG4")));
        assert_eq!(response.code, Some(ResponseCode::TryCreate));
    }

    #[test]
    fn test_item_accessors() {
        assert_eq!(Item::Atom("42".into()).as_number(), Some(42));
        assert_eq!(Item::String(b"42".to_vec()).as_number(), None);
        assert_eq!(Item::Literal(b"abc".to_vec()).as_str(), Some("abc"));
        assert!(Item::Nil.is_nil());
        assert!(Item::Atom("\\Seen".into()).is_atom("\\SEEN"));
        assert_eq!(Item::List(vec![]).to_text(), None);
        assert_eq!(Item::String(vec![0xff]).to_text().unwrap(), "\u{fffd}");
    }
}
