//! Command parameters and request-line assembly.
//!
//! A request is built twice: the bytes sent to the server and a redacted
//! twin for the transcript, where secrets show as placeholders and literal
//! payloads as their size.

use std::fmt::Write;

use crate::types::Tag;
use crate::{Error, Result};

/// Logged form of a quoted secret.
pub const QUOTED_PLACEHOLDER: &str = "\"********\"";

/// One command parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Sent as-is (atoms, sequence sets, pre-escaped text).
    Atom(String),
    /// Sent as a quoted string with `\` and `"` escaped.
    Quoted(String),
    /// `NIL`.
    Nil,
    /// Sent as a literal; `non_sync` selects the LITERAL+ `{n+}` form.
    Literal {
        /// Payload.
        data: Vec<u8>,
        /// Skip the continuation round trip.
        non_sync: bool,
    },
    /// Parenthesized list. Empty lists are omitted from the line.
    List(Vec<Param>),
    /// A value that must not reach the transcript.
    Secret(Box<Param>),
}

impl Param {
    /// Creates an atom parameter.
    pub fn atom(value: impl Into<String>) -> Self {
        Self::Atom(value.into())
    }

    /// Creates a quoted string parameter.
    pub fn quoted(value: impl Into<String>) -> Self {
        Self::Quoted(value.into())
    }

    /// Creates a quoted string, or `NIL` for `None`.
    pub fn nstring(value: Option<impl Into<String>>) -> Self {
        value.map_or(Self::Nil, Self::quoted)
    }

    /// Creates a synchronizing literal.
    pub fn literal(data: impl Into<Vec<u8>>) -> Self {
        Self::Literal {
            data: data.into(),
            non_sync: false,
        }
    }

    /// Wraps a parameter so the transcript never shows it.
    #[must_use]
    pub fn secret(inner: Self) -> Self {
        Self::Secret(Box::new(inner))
    }

    /// Creates a list of atoms.
    pub fn atoms<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Self::atom).collect())
    }

    fn has_sync_literal(&self) -> bool {
        match self {
            Self::Literal { non_sync, .. } => !non_sync,
            Self::List(items) => items.iter().any(Self::has_sync_literal),
            Self::Secret(inner) => inner.has_sync_literal(),
            _ => false,
        }
    }

    fn has_non_sync_literal(&self) -> bool {
        match self {
            Self::Literal { non_sync, .. } => *non_sync,
            Self::List(items) => items.iter().any(Self::has_non_sync_literal),
            Self::Secret(inner) => inner.has_non_sync_literal(),
            _ => false,
        }
    }
}

/// Quotes a string for the wire.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the string contains CR, LF or NUL,
/// which a quoted string cannot carry.
pub fn quote(value: &str) -> Result<String> {
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(Error::InvalidArgument(
            "quoted string must not contain CR, LF or NUL".into(),
        ));
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Ok(out)
}

/// A fully assembled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// Tag of the request.
    pub tag: Tag,
    /// Bytes to send now, CRLF included.
    pub bytes: Vec<u8>,
    /// Redacted form for the transcript, without CRLF.
    pub logged: String,
    /// Segments to send one per server continuation, when the request was
    /// split at its synchronizing literals. Each starts with a literal's
    /// payload.
    pub remainder: Vec<Vec<u8>>,
    /// Secret values as they appear on the wire.
    pub secrets: Vec<String>,
}

impl RequestLine {
    /// Assembles `<tag> <command>[ <params>]`.
    ///
    /// With `break_on_literal`, a request containing synchronizing literals
    /// (and no LITERAL+ ones) is cut right after every literal marker; the
    /// pieces after the first cut go to [`RequestLine::remainder`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty command or an
    /// unquotable string.
    pub fn build(tag: Tag, command: &str, params: &[Param], break_on_literal: bool) -> Result<Self> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Error::InvalidArgument("command must not be empty".into()));
        }

        let split = break_on_literal
            && params.iter().any(Param::has_sync_literal)
            && !params.iter().any(Param::has_non_sync_literal);

        let mut writer = Writer {
            bytes: format!("{tag} {command}").into_bytes(),
            logged: format!("{tag} {command}"),
            secrets: Vec::new(),
            split,
            split_at: Vec::new(),
        };

        for param in params {
            if matches!(param, Param::List(items) if items.is_empty()) {
                continue;
            }
            writer.bytes.push(b' ');
            writer.logged.push(' ');
            writer.write(param, false)?;
        }
        writer.bytes.extend_from_slice(b"\r\n");

        let mut bytes = writer.bytes;
        let mut remainder: Vec<Vec<u8>> = writer
            .split_at
            .iter()
            .rev()
            .map(|&at| bytes.split_off(at))
            .collect();
        remainder.reverse();

        Ok(Self {
            tag,
            bytes,
            logged: writer.logged,
            remainder,
            secrets: writer.secrets,
        })
    }
}

struct Writer {
    bytes: Vec<u8>,
    logged: String,
    secrets: Vec<String>,
    split: bool,
    split_at: Vec<usize>,
}

impl Writer {
    fn write(&mut self, param: &Param, secret: bool) -> Result<()> {
        match param {
            Param::Atom(value) => {
                self.bytes.extend_from_slice(value.as_bytes());
                self.log(value, secret, crate::log::PLACEHOLDER);
            }
            Param::Quoted(value) => {
                let quoted = quote(value)?;
                self.bytes.extend_from_slice(quoted.as_bytes());
                self.log(&quoted, secret, QUOTED_PLACEHOLDER);
            }
            Param::Nil => {
                self.bytes.extend_from_slice(b"NIL");
                self.logged.push_str("NIL");
            }
            Param::Literal { data, non_sync } => {
                let marker = if *non_sync {
                    format!("{{{}+}}", data.len())
                } else {
                    format!("{{{}}}", data.len())
                };
                self.bytes.extend_from_slice(marker.as_bytes());
                self.bytes.extend_from_slice(b"\r\n");
                if self.split {
                    self.split_at.push(self.bytes.len());
                }
                self.bytes.extend_from_slice(data);
                let _ = write!(self.logged, "{marker} <{} octets>", data.len());
            }
            Param::List(items) => {
                self.bytes.push(b'(');
                self.logged.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.bytes.push(b' ');
                        self.logged.push(' ');
                    }
                    self.write(item, secret)?;
                }
                self.bytes.push(b')');
                self.logged.push(')');
            }
            Param::Secret(inner) => self.write(inner, true)?,
        }
        Ok(())
    }

    fn log(&mut self, wire: &str, secret: bool, placeholder: &str) {
        if secret {
            self.secrets.push(wire.to_string());
            self.logged.push_str(placeholder);
        } else {
            self.logged.push_str(wire);
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
    use crate::parser::lexer::{Lexer, Token};
    use proptest::prelude::*;

    fn tag(n: u32) -> Tag {
        Tag::new(format!("TAG{n}"))
    }

    #[test]
    fn test_bare_command() {
        let line = RequestLine::build(tag(1), "  CAPABILITY ", &[], false).unwrap();
        assert_eq!(line.bytes, b"TAG1 CAPABILITY\r\n");
        assert_eq!(line.logged, "TAG1 CAPABILITY");
        assert!(line.remainder.is_empty());
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            RequestLine::build(tag(1), "   ", &[], false),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_login_password_redacted() {
        let params = [
            Param::quoted("user@example.com"),
            Param::secret(Param::quoted("p\"ss")),
        ];
        let line = RequestLine::build(tag(2), "LOGIN", &params, false).unwrap();
        assert_eq!(line.bytes, b"TAG2 LOGIN \"user@example.com\" \"p\\\"ss\"\r\n");
        assert_eq!(line.logged, "TAG2 LOGIN \"user@example.com\" \"********\"");
        assert_eq!(line.secrets, ["\"p\\\"ss\""]);
    }

    #[test]
    fn test_secret_atom_placeholder() {
        let params = [Param::atom("PLAIN"), Param::secret(Param::atom("AGZvbwBiYXI="))];
        let line = RequestLine::build(tag(3), "AUTHENTICATE", &params, false).unwrap();
        assert_eq!(line.logged, "TAG3 AUTHENTICATE PLAIN *******");
        assert_eq!(line.secrets, ["AGZvbwBiYXI="]);
    }

    #[test]
    fn test_lists_and_nil() {
        let params = [
            Param::Nil,
            Param::List(vec![]),
            Param::atoms(["MESSAGES", "UIDNEXT"]),
        ];
        let line = RequestLine::build(tag(4), "X", &params, false).unwrap();
        assert_eq!(line.bytes, b"TAG4 X NIL (MESSAGES UIDNEXT)\r\n");
    }

    #[test]
    fn test_quote_rejects_line_breaks() {
        assert!(quote("a\r\nb").is_err());
        assert!(quote("a\0b").is_err());
        assert_eq!(quote("a\\b").unwrap(), "\"a\\\\b\"");
        assert_eq!(quote("").unwrap(), "\"\"");
    }

    #[test]
    fn test_break_on_literal() {
        let params = [
            Param::quoted("INBOX"),
            Param::atoms(["\\Seen"]),
            Param::literal(b"Hello".to_vec()),
        ];
        let line = RequestLine::build(tag(5), "APPEND", &params, true).unwrap();
        assert_eq!(line.bytes, b"TAG5 APPEND \"INBOX\" (\\Seen) {5}\r\n");
        assert_eq!(line.remainder, vec![b"Hello\r\n".to_vec()]);
        assert_eq!(line.logged, "TAG5 APPEND \"INBOX\" (\\Seen) {5} <5 octets>");
    }

    #[test]
    fn test_break_on_every_literal() {
        let params = [
            Param::quoted("INBOX"),
            Param::List(vec![
                Param::quoted("/private/a"),
                Param::literal(b"x\ny".to_vec()),
                Param::quoted("/private/b"),
                Param::literal(b"p\nq".to_vec()),
            ]),
        ];
        let line = RequestLine::build(tag(8), "SETMETADATA", &params, true).unwrap();
        assert_eq!(line.bytes, b"TAG8 SETMETADATA \"INBOX\" (\"/private/a\" {3}\r\n");
        assert_eq!(
            line.remainder,
            vec![b"x\ny \"/private/b\" {3}\r\n".to_vec(), b"p\nq)\r\n".to_vec()]
        );
    }

    #[test]
    fn test_literal_plus_never_breaks() {
        let params = [
            Param::quoted("INBOX"),
            Param::Literal {
                data: b"Hello".to_vec(),
                non_sync: true,
            },
        ];
        let line = RequestLine::build(tag(6), "APPEND", &params, true).unwrap();
        assert_eq!(line.bytes, b"TAG6 APPEND \"INBOX\" {5+}\r\nHello\r\n");
        assert!(line.remainder.is_empty());
    }

    #[test]
    fn test_no_break_without_flag() {
        let params = [Param::literal(b"abc".to_vec())];
        let line = RequestLine::build(tag(7), "X", &params, false).unwrap();
        assert_eq!(line.bytes, b"TAG7 X {3}\r\nabc\r\n");
        assert!(line.remainder.is_empty());
    }

    proptest! {
        #[test]
        fn prop_literal_encoding_round_trips(data in proptest::collection::vec(any::<u8>(), 0..128)) {
            let line = RequestLine::build(tag(1), "X", &[Param::literal(data.clone())], false).unwrap();
            let prefix = b"TAG1 X ".len();
            let mut lexer = Lexer::new(&line.bytes[prefix..]);
            prop_assert_eq!(lexer.next_token().unwrap(), Token::Literal(data));
            prop_assert_eq!(lexer.next_token().unwrap(), Token::Crlf);
        }

        #[test]
        fn prop_quoted_round_trips(value in "[^\r\n\u{0}]{0,40}") {
            let quoted = quote(&value).unwrap();
            let mut lexer = Lexer::new(quoted.as_bytes());
            prop_assert_eq!(lexer.next_token().unwrap(), Token::QuotedString(value.into_bytes()));
        }
    }
}
