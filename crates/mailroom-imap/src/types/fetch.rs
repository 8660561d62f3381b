//! FETCH response data.

use crate::response::{Item, Response};

use super::Flag;

/// The data items of one `* <n> FETCH (...)` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Message sequence number.
    pub seq: u32,
    /// Data item name and value pairs in server order. Names keep the
    /// server's spelling, sections included (`BODY[HEADER]`).
    pub items: Vec<(String, Item)>,
}

impl FetchResponse {
    /// Reads a FETCH response; `None` for any other response.
    #[must_use]
    pub fn from_response(response: &Response) -> Option<Self> {
        let seq = response.number()?;
        if !response.keyword().eq_ignore_ascii_case("FETCH") {
            return None;
        }

        let items = response
            .data()
            .first()?
            .as_list()?
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_str()?.to_string(), pair[1].clone())))
            .collect();

        Some(Self { seq, items })
    }

    /// Returns the value of data item `name`, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, item)| item)
    }

    /// Returns the UID.
    #[must_use]
    pub fn uid(&self) -> Option<u32> {
        self.get("UID")
            .and_then(Item::as_number)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Returns the flags.
    #[must_use]
    pub fn flags(&self) -> Option<Vec<Flag>> {
        self.get("FLAGS")?
            .as_list()
            .map(|flags| flags.iter().filter_map(Item::as_str).map(Flag::parse).collect())
    }

    /// Returns `RFC822.SIZE`.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.get("RFC822.SIZE").and_then(Item::as_number)
    }

    /// Returns `INTERNALDATE` as sent.
    #[must_use]
    pub fn internal_date(&self) -> Option<&str> {
        self.get("INTERNALDATE").and_then(Item::as_str)
    }

    /// Returns the bytes of a body section, e.g. `BODY[]` or `BODY[HEADER]`.
    ///
    /// A partial-range suffix (`<0>`) on the returned name is ignored.
    #[must_use]
    pub fn body(&self, section: &str) -> Option<&[u8]> {
        self.items
            .iter()
            .find(|(name, _)| {
                let name = name.split_once('<').map_or(name.as_str(), |(head, _)| head);
                name.eq_ignore_ascii_case(section)
            })
            .and_then(|(_, item)| item.as_bytes())
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
    fn test_fetch_items() {
        let response = ResponseParser::parse(
            b"* 12 FETCH (UID 4827 FLAGS (\\Seen $Forwarded) RFC822.SIZE 4423 INTERNALDATE \"17-Jul-1996 02:44:25 -0700\")\r\n",
        )
        .unwrap();
        let fetch = FetchResponse::from_response(&response).unwrap();

        assert_eq!(fetch.seq, 12);
        assert_eq!(fetch.uid(), Some(4827));
        assert_eq!(
            fetch.flags().unwrap(),
            vec![Flag::Seen, Flag::Keyword("$Forwarded".into())]
        );
        assert_eq!(fetch.size(), Some(4423));
        assert_eq!(fetch.internal_date(), Some("17-Jul-1996 02:44:25 -0700"));
    }

    #[test]
    fn test_fetch_body_sections() {
        let response = ResponseParser::parse(
            b"* 3 FETCH (BODY[HEADER.FIELDS (SUBJECT)] {15}\r\nSubject: Hi\r\n\r\n BODY[]<0> {5}\r\nHE\r\nO UID 9)\r\n",
        )
        .unwrap();
        let fetch = FetchResponse::from_response(&response).unwrap();

        assert_eq!(
            fetch.body("BODY[HEADER.FIELDS (SUBJECT)]").unwrap(),
            b"Subject: Hi\r\n\r\n"
        );
        assert_eq!(fetch.body("body[]").unwrap(), b"HE\r\nO");
        assert_eq!(fetch.uid(), Some(9));
    }

    #[test]
    fn test_not_a_fetch() {
        let response = ResponseParser::parse(b"* 3 EXISTS\r\n").unwrap();
        assert!(FetchResponse::from_response(&response).is_none());
        let response = ResponseParser::parse(b"* SEARCH 1 2\r\n").unwrap();
        assert!(FetchResponse::from_response(&response).is_none());
    }
}
