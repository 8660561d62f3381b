//! Error types for SASL negotiation.

/// Result type alias for SASL operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SASL error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The mechanism name is not one this library implements.
    #[error("Unsupported SASL mechanism type: {0}")]
    UnsupportedMechanism(String),

    /// No mechanism is shared between the client preferences and the server.
    #[error("No supported SASL mechanism found")]
    NoSupportedMechanism,

    /// The server challenge could not be understood.
    #[error("Invalid server challenge: {0}")]
    InvalidChallenge(String),

    /// The mechanism was asked to answer a challenge before `authenticate`.
    #[error("{0} challenge received before authenticate")]
    NotStarted(&'static str),

    /// The server's final message did not carry the expected signature.
    #[error("Server signature mismatch")]
    ServerSignatureMismatch,

    /// Base64 payload from the server could not be decoded.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// Creates an invalid challenge error.
    #[must_use]
    pub fn invalid_challenge(message: impl Into<String>) -> Self {
        Self::InvalidChallenge(message.into())
    }
}
