//! PLAIN mechanism (RFC 4616).

/// PLAIN sends everything in a single message.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl Plain {
    /// Builds `authzid NUL authcid NUL passphrase`.
    ///
    /// An absent authorization identity is sent empty, meaning "same as
    /// the authentication identity".
    #[must_use]
    pub fn authenticate(self, authcid: &str, passphrase: &str, authzid: Option<&str>) -> Vec<u8> {
        let authzid = authzid.unwrap_or_default();
        let mut out = Vec::with_capacity(authzid.len() + authcid.len() + passphrase.len() + 2);
        out.extend_from_slice(authzid.as_bytes());
        out.push(0);
        out.extend_from_slice(authcid.as_bytes());
        out.push(0);
        out.extend_from_slice(passphrase.as_bytes());
        out
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
    fn test_plain_format() {
        assert_eq!(Plain.authenticate("test", "pass", None), b"\0test\0pass");
    }

    #[test]
    fn test_plain_with_authzid() {
        assert_eq!(
            Plain.authenticate("admin", "secret", Some("user")),
            b"user\0admin\0secret"
        );
    }

    #[test]
    fn test_plain_special_chars() {
        let out = Plain.authenticate("user", "pass@word!", None);
        assert_eq!(String::from_utf8(out).unwrap(), "\0user\0pass@word!");
    }

    proptest::proptest! {
        #[test]
        fn prop_plain_fields_split_on_nul(
            authcid in "[^\u{0}]{0,32}",
            passphrase in "[^\u{0}]{0,32}",
        ) {
            let out = Plain.authenticate(&authcid, &passphrase, None);
            let parts: Vec<&[u8]> = out.split(|&b| b == 0).collect();
            proptest::prop_assert_eq!(parts.len(), 3);
            proptest::prop_assert!(parts[0].is_empty());
            proptest::prop_assert_eq!(parts[1], authcid.as_bytes());
            proptest::prop_assert_eq!(parts[2], passphrase.as_bytes());
        }
    }
}
