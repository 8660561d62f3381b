//! Stream types for IMAP connections.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Config, Security};
use crate::error::ConnectionError;

/// A stream that can be upgraded to TLS in place (STARTTLS).
pub trait StartTls: Sized {
    /// Performs the TLS handshake over this stream.
    fn start_tls(self, host: &str) -> impl Future<Output = Result<Self, ConnectionError>> + Send;
}

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Upgrades a plaintext stream to TLS using STARTTLS.
    ///
    /// # Errors
    ///
    /// Fails if the stream is already encrypted or the handshake fails.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self, ConnectionError> {
        match self {
            Self::Plain(tcp) => {
                let tls = handshake(host, tcp).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(ConnectionError::AlreadyTls),
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl StartTls for ImapStream {
    fn start_tls(self, host: &str) -> impl Future<Output = Result<Self, ConnectionError>> + Send {
        let host = host.to_string();
        async move { self.upgrade_to_tls(&host).await }
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector with default root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

async fn handshake(host: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>, ConnectionError> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = create_tls_connector().connect(server_name, tcp).await?;
    Ok(tls)
}

/// Opens the TCP connection described by `config`, bounded by its
/// connect timeout. Implicit TLS completes the handshake before returning.
///
/// # Errors
///
/// Returns a [`ConnectionError`] on DNS, TCP, TLS failure or timeout.
pub async fn connect(config: &Config) -> Result<ImapStream, ConnectionError> {
    let open = async {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        match config.security {
            Security::Implicit => {
                let tls = handshake(&config.host, tcp).await?;
                Ok(ImapStream::Tls(Box::new(tls)))
            }
            Security::None | Security::StartTls | Security::StartTlsIfAvailable => {
                Ok(ImapStream::Plain(tcp))
            }
        }
    };

    tokio::time::timeout(config.connect_timeout, open)
        .await
        .map_err(|_| ConnectionError::Timeout(config.connect_timeout))?
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
    use tokio::net::TcpListener;

    #[test]
    fn test_create_tls_connector() {
        let _connector = create_tls_connector();
    }

    #[tokio::test]
    async fn test_connect_plain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = Config::builder("127.0.0.1")
            .security(Security::None)
            .port(port)
            .build();

        let stream = connect(&config).await.unwrap();
        assert!(!stream.is_tls());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config::builder("127.0.0.1")
            .security(Security::None)
            .port(port)
            .build();
        assert!(matches!(
            connect(&config).await,
            Err(ConnectionError::Io(_))
        ));
    }
}
