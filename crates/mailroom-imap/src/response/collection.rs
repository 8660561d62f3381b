//! Responses of one command cycle.

use super::Response;
use crate::types::{ResponseCode, Status};
use crate::{Error, Result};

/// Ordered responses of one command cycle.
///
/// A cycle ends with the issuing tag's tagged response or with a
/// continuation request; [`ResponseCollection::validate`] turns the terminal
/// status into an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseCollection {
    responses: Vec<Response>,
}

impl ResponseCollection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            responses: Vec::new(),
        }
    }

    /// Appends a response.
    pub fn push(&mut self, response: Response) {
        self.responses.push(response);
    }

    /// Returns the last response.
    #[must_use]
    pub fn last(&self) -> Option<&Response> {
        self.responses.last()
    }

    /// Iterates in wire order.
    pub fn iter(&self) -> std::slice::Iter<'_, Response> {
        self.responses.iter()
    }

    /// Returns the number of responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Returns true if no response was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Iterates over untagged responses with `keyword`.
    pub fn untagged<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Response> + 'a {
        self.responses
            .iter()
            .filter(move |r| r.is_untagged_keyword(keyword))
    }

    /// Returns the terminal response: the last one, if tagged or a continuation.
    #[must_use]
    pub fn terminal(&self) -> Option<&Response> {
        self.last().filter(|r| !r.is_untagged())
    }

    /// Returns the human-readable text of the terminal response.
    #[must_use]
    pub fn text(&self) -> &str {
        self.terminal().map_or("", |r| r.text.as_str())
    }

    /// Returns the payload of a terminal continuation request.
    #[must_use]
    pub fn continuation_value(&self) -> Option<&str> {
        self.last()
            .filter(|r| r.is_continuation())
            .map(|r| r.text.as_str())
    }

    /// Returns the capability list carried by this cycle, if any.
    ///
    /// Both untagged `CAPABILITY` data and `[CAPABILITY ...]` codes count;
    /// the last one wins.
    #[must_use]
    pub fn capability_result(&self) -> Option<Vec<String>> {
        self.responses.iter().rev().find_map(|r| {
            if r.is_untagged_keyword("CAPABILITY") {
                Some(r.items.iter().filter_map(super::Item::to_text).collect())
            } else if let Some(ResponseCode::Capability(caps)) = &r.code {
                Some(caps.clone())
            } else {
                None
            }
        })
    }

    /// Returns the text to surface to a user: an `[ALERT]` response, or
    /// the terminal response text.
    #[must_use]
    pub fn alert(&self) -> Option<&str> {
        self.responses
            .iter()
            .find(|r| r.code == Some(ResponseCode::Alert))
            .or_else(|| self.terminal())
            .map(|r| r.text.as_str())
    }

    /// Checks the terminal status of the cycle.
    ///
    /// # Errors
    ///
    /// - tagged `NO` → [`Error::NegativeResponse`]
    /// - tagged `BAD` → [`Error::InvalidResponse`]
    /// - no terminal response → [`Error::ResponseNotFound`]
    pub fn validate(self) -> Result<Self> {
        let Some(last) = self.responses.last() else {
            return Err(Error::ResponseNotFound("empty response collection".into()));
        };

        if last.is_continuation() {
            return Ok(self);
        }
        if !last.is_tagged() {
            return Err(Error::ResponseNotFound(
                "command cycle has no tagged response".into(),
            ));
        }

        match last.status() {
            Some(Status::Ok) => Ok(self),
            Some(Status::No) => Err(Error::NegativeResponse(self)),
            _ => Err(Error::InvalidResponse {
                message: last.text.clone(),
                responses: Some(self),
            }),
        }
    }

    /// Consumes the collection into its responses.
    #[must_use]
    pub fn into_vec(self) -> Vec<Response> {
        self.responses
    }
}

impl IntoIterator for ResponseCollection {
    type Item = Response;
    type IntoIter = std::vec::IntoIter<Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.responses.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResponseCollection {
    type Item = &'a Response;
    type IntoIter = std::slice::Iter<'a, Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.responses.iter()
    }
}

impl FromIterator<Response> for ResponseCollection {
    fn from_iter<I: IntoIterator<Item = Response>>(iter: I) -> Self {
        Self {
            responses: iter.into_iter().collect(),
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

    fn collect(lines: &[&str]) -> ResponseCollection {
        lines
            .iter()
            .map(|line| ResponseParser::parse(line.as_bytes()).unwrap())
            .collect()
    }

    #[test]
    fn test_validate_ok() {
        let responses = collect(&["* 3 EXISTS\r\n", "TAG1 OK done\r\n"]);
        let responses = responses.validate().unwrap();
        assert_eq!(responses.len(), 2);
        assert!(responses.last().unwrap().is_tagged());
    }

    #[test]
    fn test_validate_no() {
        let responses = collect(&["TAG1 NO [NONEXISTENT] Unknown mailbox\r\n"]);
        let Err(Error::NegativeResponse(responses)) = responses.validate() else {
            panic!("expected NegativeResponse");
        };
        assert_eq!(responses.text(), "Unknown mailbox");
    }

    #[test]
    fn test_validate_bad() {
        let responses = collect(&["TAG1 BAD Parse error\r\n"]);
        let Err(Error::InvalidResponse { message, responses }) = responses.validate() else {
            panic!("expected InvalidResponse");
        };
        assert_eq!(message, "Parse error");
        assert_eq!(responses.unwrap().len(), 1);
    }

    #[test]
    fn test_validate_continuation_pauses() {
        let responses = collect(&["+ Ready for literal\r\n"]);
        let responses = responses.validate().unwrap();
        assert_eq!(responses.continuation_value(), Some("Ready for literal"));
    }

    #[test]
    fn test_validate_missing_terminal() {
        assert!(matches!(
            ResponseCollection::new().validate(),
            Err(Error::ResponseNotFound(_))
        ));
        assert!(matches!(
            collect(&["* 1 EXISTS\r\n"]).validate(),
            Err(Error::ResponseNotFound(_))
        ));
    }

    #[test]
    fn test_capability_result_from_untagged() {
        let responses = collect(&[
            "* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n",
            "TAG1 OK Capability completed\r\n",
        ]);
        assert_eq!(
            responses.capability_result().unwrap(),
            ["IMAP4rev1", "AUTH=PLAIN"]
        );
    }

    #[test]
    fn test_capability_result_last_wins() {
        let responses = collect(&[
            "* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n",
            "TAG2 OK [CAPABILITY IMAP4rev1 IDLE] Logged in\r\n",
        ]);
        assert_eq!(responses.capability_result().unwrap(), ["IMAP4rev1", "IDLE"]);
        assert_eq!(collect(&["TAG3 OK done\r\n"]).capability_result(), None);
    }

    #[test]
    fn test_untagged_filter() {
        let responses = collect(&[
            "* LIST () \"/\" INBOX\r\n",
            "* LIST () \"/\" Sent\r\n",
            "* 4 EXISTS\r\n",
            "TAG1 OK done\r\n",
        ]);
        assert_eq!(responses.untagged("list").count(), 2);
        assert_eq!(responses.untagged("EXISTS").count(), 1);
    }

    #[test]
    fn test_wire_order_preserved() {
        let responses = collect(&["* 1 EXISTS\r\n", "* 0 RECENT\r\n", "TAG1 OK done\r\n"]);
        let keywords: Vec<&str> = responses.iter().map(Response::keyword).collect();
        assert_eq!(keywords, ["EXISTS", "RECENT", "OK"]);
    }
}
