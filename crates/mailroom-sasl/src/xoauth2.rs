//! XOAUTH2 mechanism (Google/Microsoft proprietary).
//!
//! On failure the server answers the initial response with a continuation
//! whose payload is a base64 JSON error; the client must reply with an empty
//! line before the tagged `NO` arrives.

use serde::Deserialize;

/// XOAUTH2 is single-shot.
#[derive(Debug, Clone, Copy, Default)]
pub struct XOAuth2;

impl XOAuth2 {
    /// Builds `user=<user>\x01auth=Bearer <token>\x01\x01`.
    #[must_use]
    pub fn authenticate(self, user: &str, token: &str) -> Vec<u8> {
        format!("user={user}\x01auth=Bearer {token}\x01\x01").into_bytes()
    }
}

/// Parses an `OAuth2` error payload sent by the server.
///
/// `OAuth2` errors are JSON-encoded: `{"status":"401", "schemes":"bearer", "scope":"..."}`
///
/// # Errors
///
/// Returns an error if the payload is not the expected JSON.
pub fn parse_oauth_error(payload: &[u8]) -> Result<OAuthError, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// `OAuth2` error response from server.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthError {
    /// HTTP status code.
    pub status: String,
    /// Authentication schemes supported.
    #[serde(default)]
    pub schemes: Option<String>,
    /// `OAuth2` scope required.
    #[serde(default)]
    pub scope: Option<String>,
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
    fn test_xoauth2_format() {
        let out = XOAuth2.authenticate("test@test.com", "abc");
        assert_eq!(out, b"user=test@test.com\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_parse_oauth_error() {
        let json = br#"{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}"#;
        let error = parse_oauth_error(json).unwrap();

        assert_eq!(error.status, "401");
        assert_eq!(error.schemes.as_deref(), Some("bearer"));
        assert_eq!(error.scope.as_deref(), Some("https://mail.google.com/"));
    }

    #[test]
    fn test_parse_oauth_error_minimal() {
        let error = parse_oauth_error(br#"{"status":"400"}"#).unwrap();
        assert_eq!(error.status, "400");
        assert!(error.schemes.is_none());
    }

    #[test]
    fn test_parse_oauth_error_garbage() {
        assert!(parse_oauth_error(b"not json").is_err());
    }
}
