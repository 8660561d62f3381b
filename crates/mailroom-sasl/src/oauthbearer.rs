//! OAUTHBEARER mechanism (RFC 7628).

/// OAUTHBEARER is single-shot.
#[derive(Debug, Clone, Copy, Default)]
pub struct OAuthBearer;

impl OAuthBearer {
    /// Builds `n,a=<user>,\x01auth=Bearer <token>\x01\x01`.
    ///
    /// The GS2 `a=` field carries the authorization identity when given,
    /// otherwise the authenticating user.
    #[must_use]
    pub fn authenticate(self, user: &str, token: &str, authzid: Option<&str>) -> Vec<u8> {
        let identity = authzid.filter(|a| !a.is_empty()).unwrap_or(user);
        format!("n,a={identity},\x01auth=Bearer {token}\x01\x01").into_bytes()
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

    #[test]
    fn test_oauthbearer_format() {
        let out = OAuthBearer.authenticate("test@test.com", "abc", None);
        assert_eq!(out, b"n,a=test@test.com,\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_oauthbearer_authzid() {
        let out = OAuthBearer.authenticate("svc@test.com", "abc", Some("boss@test.com"));
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("n,a=boss@test.com,"));
    }
}
