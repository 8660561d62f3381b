//! Error types for the IMAP library.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::response::ResponseCollection;

/// Transport-level failures.
///
/// Every variant leaves the connection unusable; later calls fail fast with
/// [`ConnectionError::NotConnected`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The server closed the connection.
    #[error("Connection closed by server")]
    Closed,

    /// The connection was shut down earlier.
    #[error("Not connected")]
    NotConnected,

    /// STARTTLS was attempted on an encrypted stream.
    #[error("Stream is already TLS")]
    AlreadyTls,
}

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket, TLS or timeout failure.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Malformed server data or a tagged `BAD`.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// What went wrong.
        message: String,
        /// The command cycle, when the error came from validation.
        responses: Option<ResponseCollection>,
    },

    /// Server answered `NO`.
    #[error("Server returned NO: {}", .0.text())]
    NegativeResponse(ResponseCollection),

    /// The stream ended before the terminal response arrived.
    #[error("Response not found: {0}")]
    ResponseNotFound(String),

    /// Server rejected the credentials.
    #[error("Authentication failed: {}", .0.text())]
    LoginBadCredentials(ResponseCollection),

    /// The authentication exchange did not follow the protocol.
    #[error("Login error: {0}")]
    Login(String),

    /// SASL mechanism failure.
    #[error("SASL error: {0}")]
    Sasl(#[from] mailroom_sasl::Error),

    /// STARTTLS is required by configuration but not advertised.
    #[error("STARTTLS is not supported by the server")]
    StartTlsUnsupported,

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// The caller passed an unusable value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Connection(ConnectionError::Io(err))
    }
}

impl Error {
    /// Creates an invalid response error without an attached collection.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
            responses: None,
        }
    }

    /// Returns true if the connection cannot be used after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ResponseNotFound(_) | Self::StartTlsUnsupported | Self::Bye(_)
        )
    }

    /// Returns the command cycle attached to the error, if any.
    #[must_use]
    pub const fn responses(&self) -> Option<&ResponseCollection> {
        match self {
            Self::NegativeResponse(responses) | Self::LoginBadCredentials(responses) => {
                Some(responses)
            }
            Self::InvalidResponse { responses, .. } => responses.as_ref(),
            _ => None,
        }
    }

    /// Returns the server text worth showing to a user, if any.
    ///
    /// Prefers an `[ALERT]` response over the terminal response text.
    #[must_use]
    pub fn alert(&self) -> Option<&str> {
        self.responses()
            .and_then(ResponseCollection::alert)
            .filter(|text| !text.is_empty())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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

    fn collection(lines: &[&[u8]]) -> ResponseCollection {
        let mut responses = ResponseCollection::new();
        for line in lines {
            responses.push(ResponseParser::parse(line).unwrap());
        }
        responses
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::from(io::Error::other("boom")).is_fatal());
        assert!(Error::ResponseNotFound("eof".into()).is_fatal());
        assert!(Error::Bye("bye".into()).is_fatal());
        assert!(!Error::InvalidArgument("x".into()).is_fatal());
        assert!(!Error::invalid("garbage").is_fatal());
        assert!(!Error::NegativeResponse(ResponseCollection::new()).is_fatal());
    }

    #[test]
    fn test_negative_response_display() {
        let err = Error::NegativeResponse(collection(&[b"TAG1 NO Mailbox does not exist\r\n"]));
        assert_eq!(err.to_string(), "Server returned NO: Mailbox does not exist");
    }

    #[test]
    fn test_alert_prefers_alert_code() {
        let err = Error::LoginBadCredentials(collection(&[
            b"* OK [ALERT] Password expires today\r\n",
            b"TAG2 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n",
        ]));
        assert_eq!(err.alert(), Some("Password expires today"));
    }

    #[test]
    fn test_alert_falls_back_to_terminal_text() {
        let err = Error::NegativeResponse(collection(&[b"TAG3 NO Quota exceeded\r\n"]));
        assert_eq!(err.alert(), Some("Quota exceeded"));
        assert_eq!(Error::Login("x".into()).alert(), None);
    }
}
