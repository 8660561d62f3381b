//! IMAP protocol parser.
//!
//! Sans-I/O parser for server responses. The transport hands over one
//! logical response at a time (the line plus every literal it announced), and
//! [`ResponseParser::parse`] turns it into a [`Response`].
//!
//! # Architecture
//!
//! - **Lexer**: Tokenizes raw bytes into IMAP tokens (atoms, strings, numbers, etc.)
//! - **Response Parser**: Classifies the response and builds nested items
//!
//! # Example
//!
//! ```
//! use mailroom_imap::parser::ResponseParser;
//! use mailroom_imap::types::Status;
//!
//! let response = ResponseParser::parse(b"* OK IMAP4rev1 server ready\r\n").unwrap();
//! assert!(response.is_untagged());
//! assert_eq!(response.status(), Some(Status::Ok));
//! assert_eq!(response.text, "IMAP4rev1 server ready");
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod lexer;

pub use lexer::{Lexer, Token, is_atom_char, parse_literal_marker};

use crate::response::{Item, Response, ResponseKind};
use crate::types::{ResponseCode, Status, Tag};
use crate::{Error, Result};

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one logical response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => Ok(Self::parse_continuation(&mut lexer)),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(n) => Self::parse_tagged(&mut lexer, &n.to_string()),
            token => Err(Error::invalid(format!(
                "Expected *, + or tag, got {token:?}"
            ))),
        }
    }

    /// Parses a tagged response: `<tag> OK|NO|BAD [code] text`.
    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;

        let status = lexer.read_atom_string()?;
        if !matches!(
            Status::parse(status),
            Some(Status::Ok | Status::No | Status::Bad)
        ) {
            return Err(lexer.error(&format!("Invalid tagged status: {status}")));
        }

        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response {
            kind: ResponseKind::Tagged,
            tag: Some(Tag::new(tag)),
            status_or_index: status.to_string(),
            items: Vec::new(),
            code,
            text,
        })
    }

    /// Parses an untagged response: status, keyword data or message data.
    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let (status_or_index, is_status) = match lexer.next_token()? {
            Token::Atom(s) => (s.to_string(), Status::parse(s).is_some()),
            Token::Number(n) => (n.to_string(), false),
            token => {
                return Err(lexer.error(&format!(
                    "Unexpected token in untagged response: {token:?}"
                )));
            }
        };

        if is_status {
            let (code, text) = Self::parse_resp_text(lexer)?;
            return Ok(Response {
                kind: ResponseKind::Untagged,
                tag: None,
                status_or_index,
                items: Vec::new(),
                code,
                text,
            });
        }

        let items = Self::parse_items(lexer)?;
        Ok(Response {
            kind: ResponseKind::Untagged,
            tag: None,
            status_or_index,
            items,
            code: None,
            text: String::new(),
        })
    }

    /// Parses a continuation request: `+ text`.
    fn parse_continuation(lexer: &mut Lexer<'_>) -> Response {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        Response {
            kind: ResponseKind::Continuation,
            tag: None,
            status_or_index: String::new(),
            items: Vec::new(),
            code: None,
            text: read_text_until_crlf(lexer),
        }
    }

    /// Parses response text with optional response code.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let code = if lexer.peek() == Some(b'[') {
            Some(Self::parse_response_code(lexer)?)
        } else {
            None
        };

        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        Ok((code, read_text_until_crlf(lexer)))
    }

    /// Parses `[NAME args...]`.
    ///
    /// Codes whose arguments do not tokenize (free-form text such as
    /// `[REFERRAL ...]` with odd characters) keep the raw argument text.
    fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
        lexer.advance(); // [
        let start = lexer.position();

        if let Ok(code) = Self::parse_code_items(lexer) {
            return Ok(code);
        }

        lexer.rewind(start);
        let rest = lexer.remaining();
        let line_end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(rest.len());
        let Some(close) = rest[..line_end].iter().position(|&b| b == b']') else {
            return Err(lexer.error("Unterminated response code"));
        };

        let raw = String::from_utf8_lossy(&rest[..close]).into_owned();
        lexer.skip(close + 1);

        let (name, argument) = raw.split_once(' ').unwrap_or((raw.as_str(), ""));
        let arguments = if argument.is_empty() {
            Vec::new()
        } else {
            vec![Item::Atom(argument.to_string())]
        };
        Ok(ResponseCode::from_parts(name, arguments))
    }

    fn parse_code_items(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
        let name = lexer.read_atom_string()?;
        let mut arguments = Vec::new();

        loop {
            match lexer.next_token()? {
                Token::RBracket => break,
                Token::Space => {}
                Token::Crlf | Token::Eof => return Err(lexer.error("Unterminated response code")),
                token => arguments.push(Self::parse_item(lexer, token)?),
            }
        }

        Ok(ResponseCode::from_parts(name, arguments))
    }

    /// Parses space-separated items up to the end of the response.
    fn parse_items(lexer: &mut Lexer<'_>) -> Result<Vec<Item>> {
        let mut items = Vec::new();

        loop {
            match lexer.next_token()? {
                Token::Space => {}
                Token::Crlf | Token::Eof => return Ok(items),
                token => items.push(Self::parse_item(lexer, token)?),
            }
        }
    }

    /// Parses a parenthesized list; the opening paren is already consumed.
    fn parse_list(lexer: &mut Lexer<'_>) -> Result<Vec<Item>> {
        let mut items = Vec::new();

        loop {
            match lexer.next_token()? {
                Token::Space => {}
                Token::RParen => return Ok(items),
                Token::Crlf | Token::Eof => return Err(lexer.error("Unterminated list")),
                token => items.push(Self::parse_item(lexer, token)?),
            }
        }
    }

    fn parse_item(lexer: &mut Lexer<'_>, token: Token<'_>) -> Result<Item> {
        match token {
            Token::Atom(s) => Ok(Item::Atom(extend_atom(lexer, s)?)),
            Token::Number(n) => Ok(Item::Atom(n.to_string())),
            Token::QuotedString(bytes) => Ok(Item::String(bytes)),
            Token::Literal(bytes) => Ok(Item::Literal(bytes)),
            Token::Nil => Ok(Item::Nil),
            Token::LParen => Self::parse_list(lexer).map(Item::List),
            Token::Asterisk => Ok(Item::Atom("*".to_string())),
            Token::Plus => Ok(Item::Atom("+".to_string())),
            token => Err(lexer.error(&format!("Unexpected token: {token:?}"))),
        }
    }
}

/// Keeps a section spec inside its atom: `BODY[HEADER.FIELDS (FROM)]<0>`.
fn extend_atom(lexer: &mut Lexer<'_>, head: &str) -> Result<String> {
    let mut atom = head.to_string();
    if lexer.peek() != Some(b'[') {
        return Ok(atom);
    }

    let rest = lexer.remaining();
    let mut depth = 0usize;
    let mut end = None;
    for (i, &b) in rest.iter().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    end = Some(i + 1);
                    break;
                }
            }
            b'\r' | b'\n' => break,
            _ => {}
        }
    }
    let end = end.ok_or_else(|| lexer.error("Unterminated section"))?;
    let tail = rest[end..].iter().take_while(|&&b| is_atom_char(b)).count();

    atom.push_str(&String::from_utf8_lossy(&rest[..end + tail]));
    lexer.skip(end + tail);
    Ok(atom)
}

/// Reads the rest of the line as text, consuming the CRLF.
fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();

    let end = remaining
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(remaining.len());

    lexer.skip(end);
    if lexer.peek() == Some(b'\r') {
        lexer.skip(2);
    }

    String::from_utf8_lossy(&remaining[..end]).into_owned()
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

    fn atom(s: &str) -> Item {
        Item::Atom(s.to_string())
    }

    #[test]
    fn test_parse_greeting_with_capabilities() {
        let response =
            ResponseParser::parse(b"* OK [CAPABILITY IMAP4rev1 STARTTLS AUTH=PLAIN] Ready\r\n")
                .unwrap();

        assert!(response.is_untagged());
        assert_eq!(response.status(), Some(Status::Ok));
        assert_eq!(
            response.code,
            Some(ResponseCode::Capability(vec![
                "IMAP4rev1".into(),
                "STARTTLS".into(),
                "AUTH=PLAIN".into()
            ]))
        );
        assert_eq!(response.text, "Ready");
    }

    #[test]
    fn test_parse_tagged_without_text() {
        let response = ResponseParser::parse(b"TAG9 OK\r\n").unwrap();
        assert_eq!(response.tag, Some(Tag::new("TAG9")));
        assert_eq!(response.status(), Some(Status::Ok));
        assert_eq!(response.text, "");
    }

    #[test]
    fn test_parse_tagged_bad() {
        let response = ResponseParser::parse(b"TAG2 BAD [CLIENTBUG] Unknown command\r\n").unwrap();
        assert_eq!(response.status(), Some(Status::Bad));
        assert_eq!(response.code, Some(ResponseCode::ClientBug));
        assert_eq!(response.text, "Unknown command");
    }

    #[test]
    fn test_parse_tagged_invalid_status() {
        let result = ResponseParser::parse(b"TAG1 MAYBE whatever\r\n");
        assert!(matches!(result, Err(Error::InvalidResponse { .. })));
    }

    #[test]
    fn test_parse_text_with_brackets_and_parens() {
        let response =
            ResponseParser::parse(b"TAG1 OK Logged in (0.001 + 0.000 secs) [sic\r\n").unwrap();
        assert_eq!(response.code, None);
        assert_eq!(response.text, "Logged in (0.001 + 0.000 secs) [sic");
    }

    #[test]
    fn test_parse_continuation() {
        let response = ResponseParser::parse(b"+ dXNlcm5hbWU6\r\n").unwrap();
        assert!(response.is_continuation());
        assert_eq!(response.tag, None);
        assert_eq!(response.text, "dXNlcm5hbWU6");

        let bare = ResponseParser::parse(b"+\r\n").unwrap();
        assert!(bare.is_continuation());
        assert_eq!(bare.text, "");
    }

    #[test]
    fn test_parse_capability_data() {
        let response = ResponseParser::parse(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n").unwrap();
        assert_eq!(response.keyword(), "CAPABILITY");
        assert_eq!(response.items, vec![atom("IMAP4rev1"), atom("AUTH=PLAIN")]);
    }

    #[test]
    fn test_parse_list() {
        let response =
            ResponseParser::parse(b"* LIST (\\HasNoChildren \\Sent) \"/\" \"Sent Items\"\r\n")
                .unwrap();
        assert_eq!(
            response.items,
            vec![
                Item::List(vec![atom("\\HasNoChildren"), atom("\\Sent")]),
                Item::String(b"/".to_vec()),
                Item::String(b"Sent Items".to_vec()),
            ]
        );
    }

    #[test]
    fn test_parse_list_nil_delimiter() {
        let response = ResponseParser::parse(b"* LIST (\\Noselect) NIL \"\"\r\n").unwrap();
        assert_eq!(response.items[1], Item::Nil);
    }

    #[test]
    fn test_parse_namespace() {
        let response =
            ResponseParser::parse(b"* NAMESPACE ((\"\" \"/\")) NIL ((\"#shared.\" \".\"))\r\n")
                .unwrap();
        assert_eq!(response.items.len(), 3);
        assert_eq!(response.items[1], Item::Nil);
    }

    #[test]
    fn test_parse_literal_item() {
        let response = ResponseParser::parse(b"* 1 FETCH (BODY[TEXT] {5}\r\nHE\r\nO)\r\n").unwrap();
        assert_eq!(response.number(), Some(1));
        assert_eq!(response.keyword(), "FETCH");
        let Item::List(items) = &response.data()[0] else {
            panic!("expected list");
        };
        assert_eq!(items[0], atom("BODY[TEXT]"));
        assert_eq!(items[1], Item::Literal(b"HE\r\nO".to_vec()));
    }

    #[test]
    fn test_parse_section_with_fields_and_partial() {
        let response = ResponseParser::parse(
            b"* 7 FETCH (BODY[HEADER.FIELDS (FROM SUBJECT)]<0> {2}\r\nab UID 9)\r\n",
        )
        .unwrap();
        let items = response.data()[0].as_list().unwrap();
        assert_eq!(items[0], atom("BODY[HEADER.FIELDS (FROM SUBJECT)]<0>"));
        assert_eq!(items[1], Item::Literal(b"ab".to_vec()));
        assert_eq!(items[2], atom("UID"));
        assert_eq!(items[3], atom("9"));
    }

    #[test]
    fn test_parse_permanent_flags_code() {
        let response =
            ResponseParser::parse(b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n")
                .unwrap();
        assert_eq!(
            response.code,
            Some(ResponseCode::PermanentFlags(vec![
                "\\Deleted".into(),
                "\\Seen".into(),
                "\\*".into()
            ]))
        );
    }

    #[test]
    fn test_parse_free_form_code() {
        let response =
            ResponseParser::parse(b"TAG1 NO [REFERRAL imap://u;AUTH=*@h/%] Try elsewhere\r\n")
                .unwrap();
        let Some(ResponseCode::Other { name, arguments }) = response.code else {
            panic!("expected Other code");
        };
        assert_eq!(name, "REFERRAL");
        assert_eq!(arguments, vec![atom("imap://u;AUTH=*@h/%")]);
        assert_eq!(response.text, "Try elsewhere");
    }

    #[test]
    fn test_parse_bye() {
        let response = ResponseParser::parse(b"* BYE Logging out\r\n").unwrap();
        assert_eq!(response.status(), Some(Status::Bye));
        assert_eq!(response.text, "Logging out");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ResponseParser::parse(b"").is_err());
        assert!(ResponseParser::parse(b")\r\n").is_err());
        assert!(ResponseParser::parse(b"* LIST (\\Noselect\r\n").is_err());
    }

    #[test]
    fn test_parse_utf8_quoted_mailbox() {
        let response = ResponseParser::parse("* LIST () \"/\" \"Entwürfe\"\r\n".as_bytes()).unwrap();
        assert_eq!(response.items[2].as_str(), Some("Entwürfe"));
    }

    proptest! {
        #[test]
        fn prop_literal_round_trip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut input = format!("* 1 FETCH (BODY[] {{{}}}\r\n", data.len()).into_bytes();
            input.extend_from_slice(&data);
            input.extend_from_slice(b")\r\n");

            let response = ResponseParser::parse(&input).unwrap();
            let items = response.data()[0].as_list().unwrap();
            prop_assert_eq!(&items[1], &Item::Literal(data));
        }
    }
}
