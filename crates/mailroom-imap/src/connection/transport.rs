//! Framed transport for the IMAP wire protocol.
//!
//! IMAP uses CRLF-terminated lines with embedded literals. The transport
//! reads one complete response at a time (line plus any `{n}` literals),
//! bounds every individual read and write by the I/O timeout, and writes
//! both directions to the transcript logger.

#![allow(clippy::missing_errors_doc)]

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::stream::StartTls;
use crate::error::{ConnectionError, Error, Result};
use crate::log::{CATEGORY, Logger, Severity};
use crate::parser::parse_literal_marker;

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Maximum literal size to prevent memory exhaustion.
pub const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered, timed, logged byte transport.
///
/// After any failed read or write the stream is dropped and later calls
/// return [`ConnectionError::NotConnected`].
pub struct Transport<S> {
    reader: Option<BufReader<S>>,
    io_timeout: Duration,
    logger: Arc<dyn Logger>,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a connected stream.
    pub fn new(stream: S, io_timeout: Duration, logger: Arc<dyn Logger>) -> Self {
        Self {
            reader: Some(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream)),
            io_timeout,
            logger,
        }
    }

    /// Returns true while the stream is usable.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    /// Reads one complete server response, literals included.
    pub async fn read_response(&mut self) -> Result<Bytes> {
        let result = self.read_response_inner().await;
        if result.is_err() {
            self.reader = None;
        }
        result
    }

    async fn read_response_inner(&mut self) -> Result<Bytes> {
        let timeout = self.io_timeout;
        let reader = self.reader.as_mut().ok_or(ConnectionError::NotConnected)?;
        let mut response = BytesMut::new();

        loop {
            let line = read_line(reader, timeout).await?;
            self.logger.write(
                &format!("< {}", String::from_utf8_lossy(trim_crlf(&line))),
                Severity::Debug,
                CATEGORY,
            );
            let first = response.is_empty();
            response.extend_from_slice(&line);

            if first && is_text_response(&line) {
                break;
            }
            let Some(size) = literal_length(&line) else {
                break;
            };
            if size > MAX_LITERAL_SIZE {
                return Err(Error::invalid(format!(
                    "literal too large: {size} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let literal = read_exact(reader, size, timeout).await?;
            response.extend_from_slice(&literal);
        }

        Ok(response.freeze())
    }

    /// Writes bytes and flushes.
    ///
    /// `logged` replaces the transcript rendering of `data`; pass it whenever
    /// the bytes carry secrets or literal payloads.
    pub async fn write_raw(&mut self, data: &[u8], logged: Option<&str>) -> Result<()> {
        let result = self.write_raw_inner(data, logged).await;
        if result.is_err() {
            self.reader = None;
        }
        result
    }

    async fn write_raw_inner(&mut self, data: &[u8], logged: Option<&str>) -> Result<()> {
        let timeout = self.io_timeout;
        let reader = self.reader.as_mut().ok_or(ConnectionError::NotConnected)?;

        let line = logged.map_or_else(
            || String::from_utf8_lossy(trim_crlf(data)).into_owned(),
            |text| trim_crlf_str(text).to_string(),
        );
        self.logger.write(&format!("> {line}"), Severity::Debug, CATEGORY);

        let stream = reader.get_mut();
        let write = async {
            stream.write_all(data).await?;
            stream.flush().await
        };
        tokio::time::timeout(timeout, write)
            .await
            .map_err(|_| ConnectionError::Timeout(timeout))?
            .map_err(ConnectionError::Io)?;
        Ok(())
    }

    /// Shuts the stream down. Safe to call more than once.
    pub async fn disconnect(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            let _ = tokio::time::timeout(self.io_timeout, reader.get_mut().shutdown()).await;
        }
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + StartTls,
{
    /// Performs the TLS handshake on the open stream.
    ///
    /// Fails if the server sent bytes after the STARTTLS response; those
    /// would otherwise be treated as encrypted.
    pub async fn upgrade(&mut self, host: &str) -> Result<()> {
        let reader = self.reader.take().ok_or(ConnectionError::NotConnected)?;
        if !reader.buffer().is_empty() {
            return Err(Error::invalid("unexpected data before TLS handshake"));
        }

        let timeout = self.io_timeout;
        let stream = tokio::time::timeout(timeout, reader.into_inner().start_tls(host))
            .await
            .map_err(|_| ConnectionError::Timeout(timeout))??;
        self.reader = Some(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream));
        Ok(())
    }
}

/// Reads one LF-terminated line.
async fn read_line<R>(reader: &mut BufReader<R>, timeout: Duration) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let buf = tokio::time::timeout(timeout, reader.fill_buf())
            .await
            .map_err(|_| ConnectionError::Timeout(timeout))?
            .map_err(ConnectionError::Io)?;
        if buf.is_empty() {
            return Err(ConnectionError::Closed.into());
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..=pos]);
            reader.consume(pos + 1);
            return Ok(line);
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::invalid("line too long"));
        }
    }
}

/// Reads exactly `size` bytes, each chunk bounded by `timeout`.
async fn read_exact<R>(reader: &mut BufReader<R>, size: usize, timeout: Duration) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut data = vec![0u8; size];
    let mut filled = 0;

    while filled < size {
        let n = tokio::time::timeout(timeout, reader.read(&mut data[filled..]))
            .await
            .map_err(|_| ConnectionError::Timeout(timeout))?
            .map_err(ConnectionError::Io)?;
        if n == 0 {
            return Err(Error::ResponseNotFound(format!(
                "stream ended after {filled} of {size} literal bytes"
            )));
        }
        filled += n;
    }

    Ok(data)
}

/// Returns the size of the literal announced at the end of `line`.
fn literal_length(line: &[u8]) -> Option<usize> {
    let line = trim_crlf(line);
    if !line.ends_with(b"}") {
        return None;
    }
    let open = line.iter().rposition(|&b| b == b'{')?;
    parse_literal_marker(&line[open..])
}

/// True for status responses and continuations, whose free-form text never
/// announces a literal.
fn is_text_response(line: &[u8]) -> bool {
    if line.starts_with(b"+") {
        return true;
    }
    let mut words = line.splitn(3, |&b| b == b' ');
    words.next();
    words.next().is_some_and(|word| {
        let word = trim_crlf(word);
        [&b"OK"[..], b"NO", b"BAD", b"BYE", b"PREAUTH"]
            .iter()
            .any(|status| word.eq_ignore_ascii_case(status))
    })
}

fn trim_crlf(data: &[u8]) -> &[u8] {
    let data = data.strip_suffix(b"\n").unwrap_or(data);
    data.strip_suffix(b"\r").unwrap_or(data)
}

fn trim_crlf_str(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
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
    use crate::log::TranscriptLogger;
    use tokio_test::io::Builder;

    fn transport<S>(stream: S) -> (Transport<S>, Arc<TranscriptLogger>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let logger = Arc::new(TranscriptLogger::new());
        let transport = Transport::new(stream, Duration::from_secs(5), logger.clone());
        (transport, logger)
    }

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length(b"BODY {123}\r\n"), Some(123));
        assert_eq!(literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(literal_length(b"no literal\r\n"), None);
        assert_eq!(literal_length(b"incomplete {123"), None);
        assert_eq!(literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(literal_length(b"* OK [ALERT] {braces} here\r\n"), None);
    }

    #[test]
    fn test_text_responses() {
        assert!(is_text_response(b"TAG1 OK see {5}\r\n"));
        assert!(is_text_response(b"* bye {3}\r\n"));
        assert!(is_text_response(b"+ {2}\r\n"));
        assert!(!is_text_response(b"* 1 FETCH (BODY[] {5}\r\n"));
        assert!(!is_text_response(b"* LIST () \"/\" {4}\r\n"));
    }

    #[tokio::test]
    async fn test_status_text_braces_are_not_literals() {
        let mock = Builder::new()
            .read(b"TAG1 OK see {5}\r\n")
            .read(b"* 2 EXISTS\r\n")
            .build();
        let (mut transport, _) = transport(mock);

        let response = transport.read_response().await.unwrap();
        assert_eq!(&response[..], b"TAG1 OK see {5}\r\n");
        let response = transport.read_response().await.unwrap();
        assert_eq!(&response[..], b"* 2 EXISTS\r\n");
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let (mut transport, logger) = transport(mock);

        let response = transport.read_response().await.unwrap();
        assert_eq!(&response[..], b"* OK ready\r\n");
        assert!(logger.contains("< * OK ready"));
    }

    #[tokio::test]
    async fn test_read_line_split_across_reads() {
        let mock = Builder::new()
            .read(b"* OK rea")
            .read(b"dy\r")
            .read(b"\n")
            .build();
        let (mut transport, _) = transport(mock);

        let response = transport.read_response().await.unwrap();
        assert_eq!(&response[..], b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {5}\r\n")
            .read(b"hel")
            .read(b"lo)\r\n")
            .build();
        let (mut transport, _) = transport(mock);

        let response = transport.read_response().await.unwrap();
        assert_eq!(&response[..], b"* 1 FETCH (BODY[] {5}\r\nhello)\r\n");
    }

    #[tokio::test]
    async fn test_literal_containing_crlf() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {7}\r\na\r\nb\r\n)\r\n")
            .read(b"A1 OK done\r\n")
            .build();
        let (mut transport, _) = transport(mock);

        let first = transport.read_response().await.unwrap();
        assert_eq!(&first[..], b"* 1 FETCH (BODY[] {7}\r\na\r\nb\r\n)\r\n");
        let second = transport.read_response().await.unwrap();
        assert_eq!(&second[..], b"A1 OK done\r\n");
    }

    #[tokio::test]
    async fn test_write_raw_logs_rendering() {
        let mock = Builder::new().write(b"TAG1 LOGIN user pass\r\n").build();
        let (mut transport, logger) = transport(mock);

        transport
            .write_raw(
                b"TAG1 LOGIN user pass\r\n",
                Some("TAG1 LOGIN user \"********\"\r\n"),
            )
            .await
            .unwrap();
        assert!(logger.contains("> TAG1 LOGIN user \"********\""));
        assert!(!logger.contains("pass\""));
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let literal_size = MAX_LITERAL_SIZE + 1;
        let header = format!("* 1 FETCH (BODY {{{literal_size}}}\r\n");

        let mock = Builder::new().read(header.as_bytes()).build();
        let (mut transport, _) = transport(mock);

        let err = transport.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let (mut transport, _) = transport(mock);

        let err = transport.read_response().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_eof_is_closed() {
        let mock = Builder::new().build();
        let (mut transport, _) = transport(mock);

        let err = transport.read_response().await.unwrap_err();
        assert!(matches!(err, Error::Connection(ConnectionError::Closed)));
        assert!(!transport.is_connected());

        let err = transport.read_response().await.unwrap_err();
        assert!(matches!(err, Error::Connection(ConnectionError::NotConnected)));
    }

    #[tokio::test]
    async fn test_eof_mid_literal() {
        let mock = Builder::new().read(b"* 1 FETCH (BODY[] {10}\r\nabc").build();
        let (mut transport, _) = transport(mock);

        let err = transport.read_response().await.unwrap_err();
        assert!(matches!(err, Error::ResponseNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let (client, _server) = tokio::io::duplex(64);
        let logger = Arc::new(TranscriptLogger::new());
        let mut transport = Transport::new(client, Duration::from_secs(1), logger);

        let err = transport.read_response().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::Timeout(d)) if d == Duration::from_secs(1)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (client, _server) = tokio::io::duplex(64);
        let (mut transport, _) = transport(client);

        transport.disconnect().await;
        transport.disconnect().await;
        assert!(!transport.is_connected());
    }
}
