//! Login credentials.

use std::fmt;

use serde::Deserialize;

/// What [`ImapClient::login`](super::ImapClient::login) authenticates with.
///
/// When both proxy fields are set, the proxy account authenticates and then
/// impersonates `login` with `PROXYAUTH`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// User name (usually an email address).
    pub login: String,
    /// Password or OAuth access token.
    pub password: String,
    /// Account that authenticates on behalf of `login`.
    #[serde(default)]
    pub proxy_auth_user: Option<String>,
    /// Password of the proxy account.
    #[serde(default)]
    pub proxy_auth_password: Option<String>,
    /// SASL mechanism preference, most preferred first. Empty means
    /// `LOGIN, PLAIN`.
    #[serde(default)]
    pub sasl_mechanisms: Vec<String>,
}

impl Credentials {
    /// Creates credentials for a plain user/password login.
    #[must_use]
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Authenticates as `user` and impersonates the login afterwards.
    #[must_use]
    pub fn with_proxy_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.proxy_auth_user = Some(user.into());
        self.proxy_auth_password = Some(password.into());
        self
    }

    /// Sets the SASL mechanism preference.
    #[must_use]
    pub fn with_mechanisms<I, S>(mut self, mechanisms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sasl_mechanisms = mechanisms.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `(authcid, password, impersonated user)`.
    pub(crate) fn effective(&self) -> (&str, &str, Option<&str>) {
        match (
            self.proxy_auth_user.as_deref().filter(|u| !u.is_empty()),
            self.proxy_auth_password.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(user), Some(password)) => (user, password, Some(self.login.as_str())),
            _ => (self.login.as_str(), self.password.as_str(), None),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("proxy_auth_user", &self.proxy_auth_user)
            .field(
                "proxy_auth_password",
                &self.proxy_auth_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sasl_mechanisms", &self.sasl_mechanisms)
            .finish()
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
    fn test_effective_without_proxy() {
        let credentials = Credentials::new("user@example.com", "secret");
        assert_eq!(credentials.effective(), ("user@example.com", "secret", None));
    }

    #[test]
    fn test_effective_with_proxy() {
        let credentials =
            Credentials::new("user@example.com", "ignored").with_proxy_auth("admin", "master");
        assert_eq!(
            credentials.effective(),
            ("admin", "master", Some("user@example.com"))
        );
    }

    #[test]
    fn test_half_proxy_is_ignored() {
        let mut credentials = Credentials::new("user", "pw");
        credentials.proxy_auth_user = Some("admin".into());
        assert_eq!(credentials.effective(), ("user", "pw", None));
    }

    #[test]
    fn test_debug_redacts() {
        let credentials = Credentials::new("user", "hunter2").with_proxy_auth("admin", "master");
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("master"));
        assert!(debug.contains("admin"));
    }

    #[test]
    fn test_deserialize() {
        let credentials: Credentials = serde_json::from_str(
            r#"{"login": "user", "password": "pw", "sasl_mechanisms": ["SCRAM-SHA-256", "PLAIN"]}"#,
        )
        .unwrap();
        assert_eq!(credentials.sasl_mechanisms, vec!["SCRAM-SHA-256", "PLAIN"]);
        assert!(credentials.proxy_auth_user.is_none());
    }
}
