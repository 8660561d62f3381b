//! Server capabilities.

/// Capability tokens advertised by the server.
///
/// Tokens keep the server's spelling and compare case-insensitively. The set
/// is replaced wholesale on every capability-bearing response, never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    tokens: Vec<String>,
}

impl Capabilities {
    /// Builds a capability set from tokens, dropping empty ones.
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for token in tokens {
            let token = token.into();
            let token = token.trim();
            if !token.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(token)) {
                out.push(token.to_string());
            }
        }
        Self { tokens: out }
    }

    /// Returns true if `name` is advertised. Blank names are never supported.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let name = name.trim();
        !name.is_empty() && self.tokens.iter().any(|t| t.eq_ignore_ascii_case(name))
    }

    /// Returns true if `AUTH=<mechanism>` is advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        let mechanism = mechanism.trim();
        !mechanism.is_empty() && self.contains(&format!("AUTH={mechanism}"))
    }

    /// Iterates over the advertised SASL mechanism names.
    pub fn auth_mechanisms(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| strip_prefix_ignore_case(t, "AUTH="))
    }

    /// Returns the `APPENDLIMIT=<n>` value, if advertised with a number.
    #[must_use]
    pub fn append_limit(&self) -> Option<u64> {
        self.tokens
            .iter()
            .find_map(|t| strip_prefix_ignore_case(t, "APPENDLIMIT="))
            .and_then(|n| n.parse().ok())
    }

    /// Returns a copy without `name`.
    #[must_use]
    pub fn without(&self, name: &str) -> Self {
        Self {
            tokens: self
                .tokens
                .iter()
                .filter(|t| !t.eq_ignore_ascii_case(name))
                .cloned()
                .collect(),
        }
    }

    /// Iterates over the tokens in server order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Returns the number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the server advertised nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn strip_prefix_ignore_case<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    let head = token.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &token[prefix.len()..])
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

    fn caps() -> Capabilities {
        Capabilities::new([
            "IMAP4rev1",
            "LITERAL+",
            "SASL-IR",
            "AUTH=PLAIN",
            "auth=xoauth2",
            "APPENDLIMIT=35651584",
            "METADATA",
        ])
    }

    #[test]
    fn test_contains_case_insensitive() {
        let caps = caps();
        assert!(caps.contains("imap4REV1"));
        assert!(caps.contains("  literal+ "));
        assert!(!caps.contains("STARTTLS"));
        assert!(!caps.contains(""));
        assert!(!caps.contains("   "));
    }

    #[test]
    fn test_supports_auth() {
        let caps = caps();
        assert!(caps.supports_auth("PLAIN"));
        assert!(caps.supports_auth("XOAUTH2"));
        assert!(!caps.supports_auth("LOGIN"));
        assert!(!caps.supports_auth(""));
        assert_eq!(caps.auth_mechanisms().collect::<Vec<_>>(), ["PLAIN", "xoauth2"]);
    }

    #[test]
    fn test_append_limit() {
        assert_eq!(caps().append_limit(), Some(35_651_584));
        assert_eq!(Capabilities::new(["APPENDLIMIT"]).append_limit(), None);
        assert_eq!(Capabilities::new(["IMAP4rev1"]).append_limit(), None);
    }

    #[test]
    fn test_without() {
        let caps = caps().without("metadata");
        assert!(!caps.contains("METADATA"));
        assert_eq!(caps.len(), 6);
    }

    #[test]
    fn test_new_drops_blank_and_duplicates() {
        let caps = Capabilities::new(["IDLE", "", "idle", " NAMESPACE "]);
        assert_eq!(caps.iter().collect::<Vec<_>>(), ["IDLE", "NAMESPACE"]);
    }

    #[test]
    fn test_prefix_on_multibyte_token() {
        assert!(!Capabilities::new(["ÄÖ"]).supports_auth("X"));
        assert_eq!(Capabilities::new(["ÄÖÜ"]).append_limit(), None);
    }
}
