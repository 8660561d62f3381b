//! SCRAM-SHA-* mechanisms (RFC 5802, RFC 7677), without channel binding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::mechanism::ScramHash;
use crate::{Error, Result};

/// SCRAM exchange state.
///
/// Carries the client nonce and first message from `authenticate` into
/// `challenge`, and the expected server signature from `challenge` into
/// `verify`.
#[derive(Debug)]
pub struct Scram {
    hash: ScramHash,
    client_nonce: String,
    gs2_header: String,
    client_first_bare: String,
    passphrase: Option<String>,
    server_signature: Option<Vec<u8>>,
}

impl Scram {
    /// Creates a SCRAM instance with a fresh random nonce.
    #[must_use]
    pub fn new(hash: ScramHash) -> Self {
        Self::with_nonce(hash, generate_nonce())
    }

    /// Creates a SCRAM instance with a caller-chosen nonce.
    #[must_use]
    pub fn with_nonce(hash: ScramHash, nonce: impl Into<String>) -> Self {
        Self {
            hash,
            client_nonce: nonce.into(),
            gs2_header: String::new(),
            client_first_bare: String::new(),
            passphrase: None,
            server_signature: None,
        }
    }

    /// Returns the hash function in use.
    #[must_use]
    pub const fn hash(&self) -> ScramHash {
        self.hash
    }

    /// Builds the client-first message: `gs2-header n=<user>,r=<nonce>`.
    pub fn authenticate(&mut self, authcid: &str, passphrase: &str, authzid: Option<&str>) -> Vec<u8> {
        self.gs2_header = match authzid.filter(|a| !a.is_empty()) {
            Some(authzid) => format!("n,a={},", sasl_name(authzid)),
            None => "n,,".to_string(),
        };
        self.client_first_bare = format!("n={},r={}", sasl_name(authcid), self.client_nonce);
        self.passphrase = Some(passphrase.to_string());
        self.server_signature = None;

        format!("{}{}", self.gs2_header, self.client_first_bare).into_bytes()
    }

    /// Answers the server-first message with the client-final message.
    ///
    /// # Errors
    ///
    /// Returns an error if the server message is malformed, the server nonce
    /// does not extend the client nonce, or `authenticate` was not called.
    pub fn challenge(&mut self, server_first: &[u8]) -> Result<Vec<u8>> {
        let passphrase = self.passphrase.as_deref().ok_or(Error::NotStarted("SCRAM"))?;
        let server_first = std::str::from_utf8(server_first)
            .map_err(|_| Error::invalid_challenge("server-first is not UTF-8"))?;
        let first = ServerFirst::parse(server_first)?;

        if first.nonce.len() <= self.client_nonce.len() || !first.nonce.starts_with(&self.client_nonce) {
            return Err(Error::invalid_challenge("server nonce must extend client nonce"));
        }

        let salt = STANDARD.decode(first.salt)?;
        let iterations: u32 = first
            .iterations
            .parse()
            .ok()
            .filter(|&i| i > 0)
            .ok_or_else(|| Error::invalid_challenge("invalid iteration count"))?;

        let salted_password = hi(self.hash, passphrase.as_bytes(), &salt, iterations);
        let client_key = hmac(self.hash, &salted_password, b"Client Key")?;
        let stored_key = h(self.hash, &client_key);
        let server_key = hmac(self.hash, &salted_password, b"Server Key")?;

        let without_proof = format!(
            "c={},r={}",
            STANDARD.encode(self.gs2_header.as_bytes()),
            first.nonce
        );
        let auth_message = format!("{},{server_first},{without_proof}", self.client_first_bare);

        let client_signature = hmac(self.hash, &stored_key, auth_message.as_bytes())?;
        let proof: Vec<u8> = client_key
            .iter()
            .zip(&client_signature)
            .map(|(key, sig)| key ^ sig)
            .collect();

        self.server_signature = Some(hmac(self.hash, &server_key, auth_message.as_bytes())?);

        Ok(format!("{without_proof},p={}", STANDARD.encode(proof)).into_bytes())
    }

    /// Checks the server-final message `v=<signature>`.
    ///
    /// Returns false for `e=` errors, malformed input, or when no
    /// client-final message has been produced yet.
    #[must_use]
    pub fn verify(&self, server_final: &[u8]) -> bool {
        let Some(expected) = &self.server_signature else {
            return false;
        };
        let Ok(text) = std::str::from_utf8(server_final) else {
            return false;
        };

        text.trim()
            .split(',')
            .find_map(|attr| attr.strip_prefix("v="))
            .and_then(|sig| STANDARD.decode(sig).ok())
            .is_some_and(|sig| sig == *expected)
    }
}

/// Parsed server-first message.
struct ServerFirst<'a> {
    nonce: &'a str,
    salt: &'a str,
    iterations: &'a str,
}

impl<'a> ServerFirst<'a> {
    fn parse(input: &'a str) -> Result<Self> {
        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for attr in input.trim().split(',') {
            if let Some(v) = attr.strip_prefix("r=") {
                nonce = Some(v);
            } else if let Some(v) = attr.strip_prefix("s=") {
                salt = Some(v);
            } else if let Some(v) = attr.strip_prefix("i=") {
                iterations = Some(v);
            } else if attr.starts_with("m=") {
                return Err(Error::invalid_challenge("mandatory extension not supported"));
            } else if let Some(v) = attr.strip_prefix("e=") {
                return Err(Error::invalid_challenge(format!("server error: {v}")));
            }
        }

        Ok(Self {
            nonce: nonce.ok_or_else(|| Error::invalid_challenge("missing r in server-first"))?,
            salt: salt.ok_or_else(|| Error::invalid_challenge("missing s in server-first"))?,
            iterations: iterations
                .ok_or_else(|| Error::invalid_challenge("missing i in server-first"))?,
        })
    }
}

fn generate_nonce() -> String {
    let bytes: [u8; 18] = rand::thread_rng().r#gen();
    STANDARD.encode(bytes)
}

/// Escapes `=` and `,` in SCRAM user names.
fn sasl_name(s: &str) -> String {
    s.replace('=', "=3D").replace(',', "=2C")
}

fn hi(hash: ScramHash, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut out = vec![0u8; hash.output_len()];
    match hash {
        ScramHash::Sha1 => pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut out),
        ScramHash::Sha256 => pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out),
        ScramHash::Sha512 => pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut out),
    }
    out
}

fn hmac(hash: ScramHash, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    match hash {
        ScramHash::Sha1 => mac::<Hmac<Sha1>>(key, data),
        ScramHash::Sha256 => mac::<Hmac<Sha256>>(key, data),
        ScramHash::Sha512 => mac::<Hmac<Sha512>>(key, data),
    }
}

fn mac<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        <M as Mac>::new_from_slice(key).map_err(|_| Error::invalid_challenge("HMAC key rejected"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn h(hash: ScramHash, data: &[u8]) -> Vec<u8> {
    match hash {
        ScramHash::Sha1 => Sha1::digest(data).to_vec(),
        ScramHash::Sha256 => Sha256::digest(data).to_vec(),
        ScramHash::Sha512 => Sha512::digest(data).to_vec(),
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
    fn test_rfc5802_sha1_exchange() {
        let mut scram = Scram::with_nonce(ScramHash::Sha1, "fyko+d2lbbFgONRv9qkxdawL");

        let first = scram.authenticate("user", "pencil", None);
        assert_eq!(first, b"n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL");

        let final_msg = scram
            .challenge(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096")
            .unwrap();
        assert_eq!(
            String::from_utf8(final_msg).unwrap(),
            "c=biws,r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,p=v0X8v3Bz2T0CJGbJQyF0X+HI4Ts="
        );

        assert!(scram.verify(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ="));
    }

    #[test]
    fn test_rfc7677_sha256_exchange() {
        let mut scram = Scram::with_nonce(ScramHash::Sha256, "rOprNGfwEbeRWgbNEkqO");

        let first = scram.authenticate("user", "pencil", None);
        assert_eq!(first, b"n,,n=user,r=rOprNGfwEbeRWgbNEkqO");

        let final_msg = scram
            .challenge(
                b"r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096",
            )
            .unwrap();
        assert_eq!(
            String::from_utf8(final_msg).unwrap(),
            "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ="
        );

        assert!(scram.verify(b"v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4="));
    }

    #[test]
    fn test_verify_rejects_wrong_signature() {
        let mut scram = Scram::with_nonce(ScramHash::Sha1, "fyko+d2lbbFgONRv9qkxdawL");
        let _ = scram.authenticate("user", "pencil", None);
        let _ = scram
            .challenge(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096")
            .unwrap();

        assert!(!scram.verify(b"v=AAAAAAAAAAAAAAAAAAAAAAAAAAA="));
        assert!(!scram.verify(b"e=invalid-proof"));
    }

    #[test]
    fn test_verify_before_challenge() {
        let scram = Scram::with_nonce(ScramHash::Sha256, "abc");
        assert!(!scram.verify(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ="));
    }

    #[test]
    fn test_rejects_foreign_nonce() {
        let mut scram = Scram::with_nonce(ScramHash::Sha256, "clientnonce");
        let _ = scram.authenticate("user", "pencil", None);
        let result = scram.challenge(b"r=othernonce123,s=QSXCR+Q6sek8bf92,i=4096");
        assert!(matches!(result, Err(Error::InvalidChallenge(_))));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let mut scram = Scram::with_nonce(ScramHash::Sha256, "abc");
        let _ = scram.authenticate("user", "pencil", None);
        assert!(scram.challenge(b"r=abcdef,i=4096").is_err());
        assert!(scram.challenge(b"r=abcdef,s=QSXCR+Q6sek8bf92,i=0").is_err());
        assert!(scram.challenge(b"m=ext,r=abcdef,s=QSXCR+Q6sek8bf92,i=1").is_err());
    }

    #[test]
    fn test_user_name_escaping() {
        let mut scram = Scram::with_nonce(ScramHash::Sha256, "n0nce");
        let first = scram.authenticate("a=b,c", "x", Some("boss"));
        assert_eq!(first, b"n,a=boss,n=a=3Db=2Cc,r=n0nce");
    }

    #[test]
    fn test_random_nonce_is_unique() {
        let a = Scram::new(ScramHash::Sha512);
        let b = Scram::new(ScramHash::Sha512);
        assert_ne!(a.client_nonce, b.client_nonce);
        assert!(!a.client_nonce.contains(','));
    }
}
