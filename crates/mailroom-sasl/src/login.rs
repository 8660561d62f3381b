//! Legacy LOGIN mechanism.
//!
//! The server prompts twice (`Username:` then `Password:`); the prompts carry
//! no information, so the client answers them in order.

use crate::{Error, Result};

/// LOGIN mechanism state.
#[derive(Debug, Default)]
pub struct Login {
    passphrase: Option<String>,
}

impl Login {
    /// Returns the username and keeps the passphrase for the second prompt.
    pub fn authenticate(&mut self, authcid: &str, passphrase: &str) -> Vec<u8> {
        self.passphrase = Some(passphrase.to_string());
        authcid.as_bytes().to_vec()
    }

    /// Answers the password prompt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] if called before `authenticate` or twice.
    pub fn challenge(&mut self) -> Result<Vec<u8>> {
        self.passphrase
            .take()
            .map(String::into_bytes)
            .ok_or(Error::NotStarted("LOGIN"))
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
    fn test_login_sequence() {
        let mut login = Login::default();
        assert_eq!(login.authenticate("user", "secret"), b"user");
        assert_eq!(login.challenge().unwrap(), b"secret");
    }

    #[test]
    fn test_login_password_only_once() {
        let mut login = Login::default();
        let _ = login.authenticate("user", "secret");
        let _ = login.challenge().unwrap();
        assert!(matches!(login.challenge(), Err(Error::NotStarted("LOGIN"))));
    }
}
