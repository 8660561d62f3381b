//! # mailroom-sasl
//!
//! Client-side SASL mechanisms for mail protocols (IMAP `AUTHENTICATE`,
//! SMTP `AUTH`).
//!
//! ## Features
//!
//! - **Closed mechanism family**: PLAIN (RFC 4616), LOGIN, CRAM-MD5
//!   (RFC 2195), XOAUTH2, OAUTHBEARER (RFC 7628) and SCRAM-SHA-1/256/512
//!   (RFC 5802, RFC 7677)
//! - **Name table lookup**: unknown mechanism names are rejected before any
//!   network round trip
//! - **Mechanism detection**: first client preference the server advertises
//!
//! Mechanisms work on raw bytes; base64 framing belongs to the protocol
//! layer.
//!
//! ## Example
//!
//! ```
//! use mailroom_sasl::{Mechanism, MechanismKind, detect_type};
//!
//! let advertised = ["PLAIN", "LOGIN"];
//! let kind = detect_type(|m| advertised.contains(&m), &[]).unwrap();
//! assert_eq!(kind, MechanismKind::Login);
//!
//! let mut plain = Mechanism::new(MechanismKind::Plain);
//! let initial = plain.authenticate("user", "secret", None);
//! assert_eq!(initial, b"\0user\0secret");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cram_md5;
mod error;
mod login;
mod mechanism;
mod oauthbearer;
mod plain;
mod scram;
mod xoauth2;

pub use cram_md5::CramMd5;
pub use error::{Error, Result};
pub use login::Login;
pub use mechanism::{
    DEFAULT_PREFERENCES, Mechanism, MechanismKind, ScramHash, detect_type, parse_preferences,
};
pub use oauthbearer::OAuthBearer;
pub use plain::Plain;
pub use scram::Scram;
pub use xoauth2::{OAuthError, XOAuth2, parse_oauth_error};
