//! IMAP lexer for tokenizing server responses.
//!
//! Breaks one logical response (as assembled by the transport, literals
//! included) into tokens for the response parser.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// IMAP lexer state.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Moves back to an earlier position.
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    /// Returns the remaining input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Peeks at the byte at offset from current position.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips n bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b'\r' => {
                if self.peek_at(1) == Some(b'\n') {
                    self.skip(2);
                    Ok(Token::Crlf)
                } else {
                    Err(self.error("Expected LF after CR"))
                }
            }
            b' ' => {
                self.advance();
                Ok(Token::Space)
            }
            b'(' => {
                self.advance();
                Ok(Token::LParen)
            }
            b')' => {
                self.advance();
                Ok(Token::RParen)
            }
            b'[' => {
                self.advance();
                Ok(Token::LBracket)
            }
            b']' => {
                self.advance();
                Ok(Token::RBracket)
            }
            b'*' => {
                self.advance();
                Ok(Token::Asterisk)
            }
            b'+' => {
                self.advance();
                Ok(Token::Plus)
            }
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            b'0'..=b'9' => self.read_number_or_atom(),
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    /// Reads a quoted string token.
    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.advance(); // opening quote

        let mut result = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => result.push(c),
                    // Lenient: keep unknown escapes as sent.
                    Some(c) => {
                        result.push(b'\\');
                        result.push(c);
                    }
                    None => return Err(self.error("Unexpected EOF in quoted string")),
                },
                Some(b'\r' | b'\n') => return Err(self.error("Line break in quoted string")),
                Some(c) => result.push(c),
                None => return Err(self.error("Unexpected EOF in quoted string")),
            }
        }

        Ok(Token::QuotedString(result))
    }

    /// Reads a literal `{n}\r\n<n bytes>` or `{n+}\r\n<n bytes>`.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        let Some(size) = parse_literal_marker(self.remaining()) else {
            return Err(self.error("Invalid literal size"));
        };

        let Some(close) = self.remaining().iter().position(|&b| b == b'}') else {
            return Err(self.error("Expected } after literal size"));
        };
        self.skip(close + 1);

        if self.advance() != Some(b'\r') || self.advance() != Some(b'\n') {
            return Err(self.error("Expected CRLF after literal size"));
        }

        let data = self
            .remaining()
            .get(..size)
            .ok_or_else(|| self.error("Incomplete literal data"))?
            .to_vec();
        self.skip(size);

        Ok(Token::Literal(data))
    }

    /// Reads a number or atom starting with a digit.
    fn read_number_or_atom(&mut self) -> Result<Token<'a>> {
        let s = self.take_atom_chars()?;

        if s.bytes().all(|b| b.is_ascii_digit()) {
            // Out-of-range numbers stay atoms.
            Ok(s.parse().map_or(Token::Atom(s), Token::Number))
        } else {
            Ok(Token::Atom(s))
        }
    }

    /// Reads an atom token.
    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let s = self.take_atom_chars()?;

        // The `\*` permanent flag.
        if s == "\\" && self.peek() == Some(b'*') {
            self.advance();
            return std::str::from_utf8(&self.input[start..self.pos])
                .map(Token::Atom)
                .map_err(|_| self.error("Invalid UTF-8 in atom"));
        }

        if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    fn take_atom_chars(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))
    }

    /// Creates a parse error at the current position.
    pub(crate) fn error(&self, message: &str) -> Error {
        Error::invalid(format!("{message} at byte {}", self.pos))
    }

    /// Expects and consumes a specific token.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Expects and consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("Expected atom, got {token:?}"))),
        }
    }

    /// Skips optional spaces.
    pub fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.advance();
        }
    }
}

/// Parses a literal marker at the start of `input`: `{n}` or `{n+}`.
///
/// Returns the announced size.
#[must_use]
pub fn parse_literal_marker(input: &[u8]) -> Option<usize> {
    let inner = input.strip_prefix(b"{")?;
    let close = inner.iter().position(|&b| b == b'}')?;
    let digits = &inner[..close];
    let digits = digits.strip_suffix(b"+").unwrap_or(digits);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Returns true if the byte is a valid atom character.
///
/// Note: This includes `\` to handle flags like `\Seen` as single tokens,
/// even though RFC 9051 technically defines `\` as a quoted-special.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    // atom-specials = "(" / ")" / "{" / SP / CTL / list-wildcards /
    //                 quoted-specials / resp-specials
    matches!(b,
        0x21..=0x27 |  // ! # $ & '  (not " or %)
        0x2B..=0x5A |  // + , - . / 0-9 : ; < = > ? @ A-Z
        0x5C |         // \ (for flags like \Seen)
        0x5E..=0x7A |  // ^ _ ` a-z
        0x7C |         // |
        0x7E           // ~
    ) && b != b'"'
        && b != b'%'
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
    fn test_simple_tokens() {
        let mut lexer = Lexer::new(b"* OK");

        assert_eq!(lexer.next_token().unwrap(), Token::Asterisk);
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("OK"));
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
        assert!(lexer.is_eof());
    }

    #[test]
    fn test_tagged_response() {
        let mut lexer = Lexer::new(b"TAG1 OK done\r\n");

        assert_eq!(lexer.next_token().unwrap(), Token::Atom("TAG1"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("OK"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("done"));
        assert_eq!(lexer.next_token().unwrap(), Token::Crlf);
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new(b"123 715194045007 99999999999999999999999 4:7");

        assert_eq!(lexer.next_token().unwrap(), Token::Number(123));
        lexer.skip_spaces();
        assert_eq!(lexer.next_token().unwrap(), Token::Number(715194045007));
        lexer.skip_spaces();
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Atom("99999999999999999999999")
        );
        lexer.skip_spaces();
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("4:7"));
    }

    #[test]
    fn test_quoted_string_escaped() {
        let mut lexer = Lexer::new(b"\"hello \\\"world\\\" \\\\\"");

        assert_eq!(
            lexer.next_token().unwrap(),
            Token::QuotedString(b"hello \"world\" \\".to_vec())
        );
    }

    #[test]
    fn test_quoted_string_keeps_8bit() {
        let mut lexer = Lexer::new("\"Entwürfe\"".as_bytes());

        assert_eq!(
            lexer.next_token().unwrap(),
            Token::QuotedString("Entwürfe".as_bytes().to_vec())
        );
    }

    #[test]
    fn test_unterminated_quoted_string() {
        let mut lexer = Lexer::new(b"\"abc");
        assert!(matches!(
            lexer.next_token(),
            Err(Error::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_nil() {
        let mut lexer = Lexer::new(b"NIL nil");

        assert_eq!(lexer.next_token().unwrap(), Token::Nil);
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Nil);
    }

    #[test]
    fn test_flags() {
        let mut lexer = Lexer::new(b"(\\Seen \\*)");

        assert_eq!(lexer.next_token().unwrap(), Token::LParen);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("\\Seen"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("\\*"));
        assert_eq!(lexer.next_token().unwrap(), Token::RParen);
    }

    #[test]
    fn test_literal_with_embedded_crlf() {
        let mut lexer = Lexer::new(b"{5}\r\nHE\r\nO)");

        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Literal(b"HE\r\nO".to_vec())
        );
        assert_eq!(lexer.next_token().unwrap(), Token::RParen);
    }

    #[test]
    fn test_non_sync_literal() {
        let mut lexer = Lexer::new(b"{3+}\r\nabc");
        assert_eq!(lexer.next_token().unwrap(), Token::Literal(b"abc".to_vec()));
    }

    #[test]
    fn test_incomplete_literal() {
        let mut lexer = Lexer::new(b"{10}\r\nabc");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_parse_literal_marker() {
        assert_eq!(parse_literal_marker(b"{42}"), Some(42));
        assert_eq!(parse_literal_marker(b"{0+}"), Some(0));
        assert_eq!(parse_literal_marker(b"{}"), None);
        assert_eq!(parse_literal_marker(b"{4x}"), None);
        assert_eq!(parse_literal_marker(b"42}"), None);
    }

    #[test]
    fn test_rewind() {
        let mut lexer = Lexer::new(b"A B");
        let start = lexer.position();
        lexer.next_token().unwrap();
        lexer.rewind(start);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("A"));
    }

    #[test]
    fn test_is_atom_char() {
        assert!(is_atom_char(b'A'));
        assert!(is_atom_char(b'0'));
        assert!(is_atom_char(b'\\'));
        assert!(is_atom_char(b'~'));
        assert!(!is_atom_char(b' '));
        assert!(!is_atom_char(b'('));
        assert!(!is_atom_char(b'{'));
        assert!(!is_atom_char(b'%'));
        assert!(!is_atom_char(b'"'));
        assert!(!is_atom_char(b']'));
    }
}
