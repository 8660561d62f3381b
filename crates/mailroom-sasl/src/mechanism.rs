//! Mechanism names, the closed mechanism family and mechanism detection.

use std::fmt;
use std::str::FromStr;

use crate::cram_md5::CramMd5;
use crate::login::Login;
use crate::oauthbearer::OAuthBearer;
use crate::plain::Plain;
use crate::scram::Scram;
use crate::xoauth2::XOAuth2;
use crate::{Error, Result};

/// Hash function used by a SCRAM mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScramHash {
    /// SCRAM-SHA-1 (RFC 5802).
    Sha1,
    /// SCRAM-SHA-256 (RFC 7677).
    Sha256,
    /// SCRAM-SHA-512.
    Sha512,
}

impl ScramHash {
    /// Digest output length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }
}

/// Kind of SASL mechanism supported by this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MechanismKind {
    /// PLAIN (RFC 4616).
    Plain,
    /// Legacy LOGIN.
    Login,
    /// CRAM-MD5 (RFC 2195).
    CramMd5,
    /// XOAUTH2 (Google/Microsoft proprietary).
    XOAuth2,
    /// OAUTHBEARER (RFC 7628).
    OAuthBearer,
    /// SCRAM-SHA-* without channel binding.
    Scram(ScramHash),
}

/// Name table for every mechanism the library implements.
const MECHANISMS: &[(&str, MechanismKind)] = &[
    ("PLAIN", MechanismKind::Plain),
    ("LOGIN", MechanismKind::Login),
    ("CRAM-MD5", MechanismKind::CramMd5),
    ("XOAUTH2", MechanismKind::XOAuth2),
    ("OAUTHBEARER", MechanismKind::OAuthBearer),
    ("SCRAM-SHA-1", MechanismKind::Scram(ScramHash::Sha1)),
    ("SCRAM-SHA-256", MechanismKind::Scram(ScramHash::Sha256)),
    ("SCRAM-SHA-512", MechanismKind::Scram(ScramHash::Sha512)),
];

/// Client preference order used when the caller does not provide one.
pub const DEFAULT_PREFERENCES: [MechanismKind; 2] = [MechanismKind::Login, MechanismKind::Plain];

impl MechanismKind {
    /// Looks up a mechanism by its IANA name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMechanism`] for names outside the table,
    /// including channel-binding `-PLUS` variants.
    pub fn from_name(name: &str) -> Result<Self> {
        let wanted = name.trim();
        MECHANISMS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(wanted))
            .map(|&(_, kind)| kind)
            .ok_or_else(|| Error::UnsupportedMechanism(wanted.to_string()))
    }

    /// Returns the IANA mechanism name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
            Self::Scram(ScramHash::Sha1) => "SCRAM-SHA-1",
            Self::Scram(ScramHash::Sha256) => "SCRAM-SHA-256",
            Self::Scram(ScramHash::Sha512) => "SCRAM-SHA-512",
        }
    }

    /// Returns true if the client answers server challenges with a proof
    /// derived from the password, which itself never crosses the wire.
    #[must_use]
    pub const fn is_challenge_response(self) -> bool {
        matches!(self, Self::CramMd5 | Self::Scram(_))
    }

    /// Returns every mechanism the library implements.
    pub fn all() -> impl Iterator<Item = Self> {
        MECHANISMS.iter().map(|&(_, kind)| kind)
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MechanismKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Picks the first preferred mechanism the server advertises.
///
/// `is_auth_supported` answers whether the server advertises `AUTH=<name>`.
/// An empty preference list falls back to [`DEFAULT_PREFERENCES`].
///
/// # Errors
///
/// Returns [`Error::UnsupportedMechanism`] if a preference names a mechanism
/// this library does not implement, and [`Error::NoSupportedMechanism`] if
/// nothing overlaps.
pub fn detect_type<F>(is_auth_supported: F, preferences: &[MechanismKind]) -> Result<MechanismKind>
where
    F: Fn(&str) -> bool,
{
    let preferences = if preferences.is_empty() {
        &DEFAULT_PREFERENCES[..]
    } else {
        preferences
    };

    preferences
        .iter()
        .copied()
        .find(|kind| is_auth_supported(kind.name()))
        .ok_or(Error::NoSupportedMechanism)
}

/// Parses a list of preference names, rejecting unknown names up front.
///
/// # Errors
///
/// Returns [`Error::UnsupportedMechanism`] for the first unknown name.
pub fn parse_preferences<S: AsRef<str>>(names: &[S]) -> Result<Vec<MechanismKind>> {
    names
        .iter()
        .map(|name| MechanismKind::from_name(name.as_ref()))
        .collect()
}

/// A live mechanism instance, owned for the duration of one authentication.
#[derive(Debug)]
pub enum Mechanism {
    /// PLAIN.
    Plain(Plain),
    /// LOGIN.
    Login(Login),
    /// CRAM-MD5.
    CramMd5(CramMd5),
    /// XOAUTH2.
    XOAuth2(XOAuth2),
    /// OAUTHBEARER.
    OAuthBearer(OAuthBearer),
    /// SCRAM-SHA-*.
    Scram(Scram),
}

impl Mechanism {
    /// Creates a fresh mechanism instance.
    #[must_use]
    pub fn new(kind: MechanismKind) -> Self {
        match kind {
            MechanismKind::Plain => Self::Plain(Plain),
            MechanismKind::Login => Self::Login(Login::default()),
            MechanismKind::CramMd5 => Self::CramMd5(CramMd5::default()),
            MechanismKind::XOAuth2 => Self::XOAuth2(XOAuth2),
            MechanismKind::OAuthBearer => Self::OAuthBearer(OAuthBearer),
            MechanismKind::Scram(hash) => Self::Scram(Scram::new(hash)),
        }
    }

    /// Creates a mechanism instance by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMechanism`] for unknown names.
    pub fn from_name(name: &str) -> Result<Self> {
        MechanismKind::from_name(name).map(Self::new)
    }

    /// Returns the mechanism kind.
    #[must_use]
    pub const fn kind(&self) -> MechanismKind {
        match self {
            Self::Plain(_) => MechanismKind::Plain,
            Self::Login(_) => MechanismKind::Login,
            Self::CramMd5(_) => MechanismKind::CramMd5,
            Self::XOAuth2(_) => MechanismKind::XOAuth2,
            Self::OAuthBearer(_) => MechanismKind::OAuthBearer,
            Self::Scram(scram) => MechanismKind::Scram(scram.hash()),
        }
    }

    /// Produces the client's first message.
    ///
    /// The result is raw (not base64 encoded). CRAM-MD5 has no initial
    /// response and returns an empty vector; it only records the credentials.
    pub fn authenticate(&mut self, authcid: &str, passphrase: &str, authzid: Option<&str>) -> Vec<u8> {
        match self {
            Self::Plain(m) => m.authenticate(authcid, passphrase, authzid),
            Self::Login(m) => m.authenticate(authcid, passphrase),
            Self::CramMd5(m) => {
                m.authenticate(authcid, passphrase);
                Vec::new()
            }
            Self::XOAuth2(m) => m.authenticate(authcid, passphrase),
            Self::OAuthBearer(m) => m.authenticate(authcid, passphrase, authzid),
            Self::Scram(m) => m.authenticate(authcid, passphrase, authzid),
        }
    }

    /// Answers a decoded server challenge.
    ///
    /// Returns `None` for mechanisms without a challenge step.
    ///
    /// # Errors
    ///
    /// Returns an error if the challenge is malformed or arrives before
    /// [`Mechanism::authenticate`].
    pub fn challenge(&mut self, challenge: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Plain(_) | Self::XOAuth2(_) | Self::OAuthBearer(_) => Ok(None),
            Self::Login(m) => m.challenge().map(Some),
            Self::CramMd5(m) => m.challenge(challenge).map(Some),
            Self::Scram(m) => m.challenge(challenge).map(Some),
        }
    }

    /// Checks the server's final message.
    ///
    /// Only SCRAM carries a server proof; every other mechanism accepts.
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        match self {
            Self::Scram(m) => m.verify(data),
            _ => true,
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

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(MechanismKind::from_name("plain").unwrap(), MechanismKind::Plain);
        assert_eq!(MechanismKind::from_name(" CRAM-MD5 ").unwrap(), MechanismKind::CramMd5);
        assert_eq!(
            MechanismKind::from_name("scram-sha-256").unwrap(),
            MechanismKind::Scram(ScramHash::Sha256)
        );
    }

    #[test]
    fn test_from_name_rejects_unknown() {
        assert!(matches!(
            MechanismKind::from_name("GSSAPI"),
            Err(Error::UnsupportedMechanism(name)) if name == "GSSAPI"
        ));
        assert!(MechanismKind::from_name("SCRAM-SHA-256-PLUS").is_err());
        assert!(MechanismKind::from_name("").is_err());
    }

    #[test]
    fn test_name_round_trips_through_table() {
        for kind in MechanismKind::all() {
            assert_eq!(MechanismKind::from_name(kind.name()).unwrap(), kind);
        }
    }

    #[test]
    fn test_detect_prefers_client_order() {
        let server = ["PLAIN", "LOGIN"];
        let detected = detect_type(|m| server.contains(&m), &[]).unwrap();
        assert_eq!(detected, MechanismKind::Login);
    }

    #[test]
    fn test_detect_explicit_preferences() {
        let server = ["PLAIN", "SCRAM-SHA-256"];
        let prefs = parse_preferences(&["SCRAM-SHA-256", "PLAIN"]).unwrap();
        let detected = detect_type(|m| server.contains(&m), &prefs).unwrap();
        assert_eq!(detected, MechanismKind::Scram(ScramHash::Sha256));
    }

    #[test]
    fn test_detect_no_overlap() {
        let server = ["GSSAPI"];
        let result = detect_type(|m| server.contains(&m), &[]);
        assert!(matches!(result, Err(Error::NoSupportedMechanism)));
    }

    #[test]
    fn test_parse_preferences_rejects_unknown() {
        let result = parse_preferences(&["PLAIN", "NTLM"]);
        assert!(matches!(result, Err(Error::UnsupportedMechanism(name)) if name == "NTLM"));
    }

    #[test]
    fn test_mechanism_kind_preserved() {
        for kind in MechanismKind::all() {
            assert_eq!(Mechanism::new(kind).kind(), kind);
        }
    }

    #[test]
    fn test_single_shot_mechanisms_have_no_challenge() {
        let mut plain = Mechanism::new(MechanismKind::Plain);
        let _ = plain.authenticate("user", "pass", None);
        assert!(plain.challenge(b"anything").unwrap().is_none());
        assert!(plain.verify(b""));
    }

    #[test]
    fn test_challenge_response_kinds() {
        let kinds: Vec<&str> = MechanismKind::all()
            .filter(|kind| kind.is_challenge_response())
            .map(MechanismKind::name)
            .collect();
        assert_eq!(kinds, vec!["CRAM-MD5", "SCRAM-SHA-1", "SCRAM-SHA-256", "SCRAM-SHA-512"]);
    }
}
