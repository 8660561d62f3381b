//! CRAM-MD5 mechanism (RFC 2195).

use std::fmt::Write;

use hmac::{Hmac, Mac};

use crate::{Error, Result};

type HmacMd5 = Hmac<md5::Md5>;

/// CRAM-MD5 state: credentials wait for the server's timestamp challenge.
#[derive(Debug, Default)]
pub struct CramMd5 {
    credentials: Option<(String, String)>,
}

impl CramMd5 {
    /// Records the credentials; CRAM-MD5 has no initial response.
    pub fn authenticate(&mut self, authcid: &str, passphrase: &str) {
        self.credentials = Some((authcid.to_string(), passphrase.to_string()));
    }

    /// Computes `authcid SP hex(HMAC-MD5(passphrase, challenge))`.
    ///
    /// # Errors
    ///
    /// Returns an error if called before `authenticate`.
    pub fn challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        let (authcid, passphrase) = self
            .credentials
            .as_ref()
            .ok_or(Error::NotStarted("CRAM-MD5"))?;

        let mut mac = <HmacMd5 as Mac>::new_from_slice(passphrase.as_bytes())
            .map_err(|_| Error::invalid_challenge("HMAC key rejected"))?;
        mac.update(challenge);
        let digest = mac.finalize().into_bytes();

        let mut response = String::with_capacity(authcid.len() + 1 + digest.len() * 2);
        response.push_str(authcid);
        response.push(' ');
        for byte in digest.iter() {
            let _ = write!(response, "{byte:02x}");
        }
        Ok(response.into_bytes())
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
    fn test_rfc2195_example() {
        let mut cram = CramMd5::default();
        cram.authenticate("tim", "tanstaaftanstaaf");
        let response = cram
            .challenge(b"<1896.697170952@postoffice.reston.mci.net>")
            .unwrap();
        assert_eq!(
            String::from_utf8(response).unwrap(),
            "tim b913a602c7eda7a495b4e6e7334d3890"
        );
    }

    #[test]
    fn test_challenge_before_authenticate() {
        let mut cram = CramMd5::default();
        assert!(matches!(
            cram.challenge(b"<1@host>"),
            Err(Error::NotStarted("CRAM-MD5"))
        ));
    }
}
