//! # mailroom-imap
//!
//! An IMAP4rev1 client protocol engine: connection lifecycle, tag/response
//! correlation, SASL authentication, capability tracking and a streaming
//! response loop.
//!
//! ## Features
//!
//! - **One connection, one command in flight**: every command takes
//!   `&mut self`, so a cycle can never interleave with another
//! - **SASL negotiation**: PLAIN, LOGIN, CRAM-MD5, XOAUTH2, OAUTHBEARER and
//!   SCRAM-SHA-1/256/512 via `mailroom-sasl`, with SASL-IR when offered
//! - **Redacted transcripts**: secrets are registered with the [`Logger`]
//!   before they hit the wire and never show up in log lines
//! - **TLS via rustls**: implicit TLS and in-place STARTTLS
//! - **Streamed responses**: large `FETCH` results are pulled one untagged
//!   response at a time through [`UntaggedStream`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailroom_imap::{Config, Credentials, ImapClient, TracingLogger};
//!
//! #[tokio::main]
//! async fn main() -> mailroom_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let mut client = ImapClient::connect(config, Arc::new(TracingLogger::new())).await?;
//!
//!     client.login(&Credentials::new("user@example.com", "password")).await?;
//!
//!     for folder in client.folder_list("", "*").await? {
//!         println!("{}", folder.name);
//!     }
//!
//!     let inbox = client.folder_examine("INBOX").await?;
//!     println!("Messages: {}", inbox.exists);
//!
//!     client.logout().await?;
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Disconnected → Connected → (STARTTLS)? → Authenticated ⇄ Selected → LoggedOut
//! ```
//!
//! ## Modules
//!
//! - [`command`]: tags, parameter escaping, modified UTF-7
//! - [`connection`]: configuration, streams, transport and the client
//! - [`log`]: transcript logging with secret redaction
//! - [`parser`]: sans-I/O response parser
//! - [`response`]: parsed responses and command cycles
//! - [`types`]: capabilities, folders, flags and other typed results

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod log;
pub mod parser;
pub mod response;
pub mod types;

pub use command::{Param, StoreAction, TagManager};
pub use connection::{
    Config, ConfigBuilder, ConnectionState, Credentials, ImapClient, ImapStream, Security, StartTls,
};
pub use error::{ConnectionError, Error, Result};
pub use log::{Logger, Severity, TracingLogger, TranscriptLogger};
pub use parser::ResponseParser;
pub use response::{Item, Response, ResponseCollection, UntaggedStream};
pub use types::{
    Capabilities, FetchResponse, Flag, Folder, FolderStatus, MailboxAttribute, Namespace, Quota,
    QuotaRoot, ResponseCode, SelectedFolder, SequenceSet, Status, Tag,
};

/// Re-export of the SASL crate.
pub use mailroom_sasl as sasl;
