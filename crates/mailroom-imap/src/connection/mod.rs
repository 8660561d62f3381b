//! IMAP connection management.
//!
//! This module provides connection handling for IMAP servers, including:
//! - Configuration (host, port, security mode, timeouts)
//! - TLS/plaintext stream abstraction with in-place STARTTLS upgrade
//! - Framed, timed and logged I/O for the IMAP wire format
//! - The client that drives command cycles over one connection

mod client;
mod config;
mod stream;
mod transport;

pub use client::{
    ConnectionState, Credentials, DEFAULT_STATUS_ITEMS, ImapClient, UNKNOWN_SERVER_ID,
};
pub use config::{Config, ConfigBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, Security};
pub use stream::{ImapStream, StartTls, connect, create_tls_connector};
pub use transport::{MAX_LINE_LENGTH, MAX_LITERAL_SIZE, Transport};
