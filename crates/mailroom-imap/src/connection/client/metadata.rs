//! Annotation commands (RFC 5464).
//!
//! An empty folder name addresses server annotations, which need
//! `METADATA-SERVER` instead of `METADATA`.

use tokio::io::{AsyncRead, AsyncWrite};

use super::ImapClient;
use crate::command::Param;
use crate::connection::StartTls;
use crate::error::{Error, Result};
use crate::types::MetadataEntry;

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + StartTls,
{
    async fn metadata_supported(&mut self, folder: &str) -> Result<bool> {
        if self.is_supported("METADATA").await? {
            return Ok(true);
        }
        Ok(folder.is_empty() && self.is_supported("METADATA-SERVER").await?)
    }

    /// Reads annotation entries (`GETMETADATA`).
    ///
    /// Returns nothing when the server lacks the extension or it is disabled
    /// by configuration.
    pub async fn get_metadata(
        &mut self,
        folder: &str,
        entries: &[&str],
    ) -> Result<Vec<MetadataEntry>> {
        if entries.is_empty() || !self.metadata_supported(folder).await? {
            return Ok(Vec::new());
        }

        let entries = Param::List(entries.iter().map(|e| Param::quoted(*e)).collect());
        let params = [self.folder_param(folder), entries];
        let responses = self
            .send_request_get_response("GETMETADATA", &params)
            .await?;

        Ok(responses
            .untagged("METADATA")
            .flat_map(MetadataEntry::from_response)
            .collect())
    }

    /// Writes annotation entries (`SETMETADATA`); `None` removes an entry.
    ///
    /// Values spanning several lines go out as literals, non-synchronizing
    /// when `LITERAL+` is advertised.
    pub async fn set_metadata(
        &mut self,
        folder: &str,
        entries: &[(&str, Option<&str>)],
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if !self.metadata_supported(folder).await? {
            return Err(Error::InvalidArgument(
                "server does not support METADATA".into(),
            ));
        }

        let non_sync = self.is_supported("LITERAL+").await?;
        let list = entries
            .iter()
            .flat_map(|(name, value)| [Param::quoted(*name), metadata_value(*value, non_sync)])
            .collect();
        let params = [self.folder_param(folder), Param::List(list)];
        let segments = self.send_request("SETMETADATA", &params, true).await?;
        let result = self.finish_literals("SETMETADATA", segments).await;
        self.logged(result)?;
        Ok(())
    }
}

fn metadata_value(value: Option<&str>, non_sync: bool) -> Param {
    match value {
        Some(value) if value.contains(['\r', '\n']) => Param::Literal {
            data: value.as_bytes().to_vec(),
            non_sync,
        },
        other => Param::nstring(other),
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
    use std::time::Duration;

    use super::super::tests::{client, client_with};
    use super::*;
    use crate::connection::{Config, Security};
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_get_metadata() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 METADATA] Ready\r\n")
            .write(b"TAG1 GETMETADATA \"INBOX\" (\"/private/comment\" \"/shared/color\")\r\n")
            .read(b"* METADATA \"INBOX\" (\"/private/comment\" \"My inbox\" \"/shared/color\" NIL)\r\n")
            .read(b"TAG1 OK GETMETADATA complete\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let entries = client
            .get_metadata("INBOX", &["/private/comment", "/shared/color"])
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value_str(), Some("My inbox"));
        assert!(entries[1].value.is_none());
    }

    #[tokio::test]
    async fn test_set_metadata() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 METADATA] Ready\r\n")
            .write(b"TAG1 SETMETADATA \"INBOX\" (\"/private/comment\" \"hi\" \"/private/old\" NIL)\r\n")
            .read(b"TAG1 OK SETMETADATA complete\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        client
            .set_metadata(
                "INBOX",
                &[("/private/comment", Some("hi")), ("/private/old", None)],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_metadata_multiline_values_as_literals() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 METADATA] Ready\r\n")
            .write(b"TAG1 SETMETADATA \"INBOX\" (\"/private/a\" {3}\r\n")
            .read(b"+ Ready for literal data\r\n")
            .write(b"x\ny \"/private/b\" \"plain\" \"/private/c\" {4}\r\n")
            .read(b"+ Ready for literal data\r\n")
            .write(b"p\r\nq)\r\n")
            .read(b"TAG1 OK SETMETADATA complete\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        client
            .set_metadata(
                "INBOX",
                &[
                    ("/private/a", Some("x\ny")),
                    ("/private/b", Some("plain")),
                    ("/private/c", Some("p\r\nq")),
                ],
            )
            .await
            .unwrap();
        assert!(logger.contains("{3} <3 octets>"));
    }

    #[tokio::test]
    async fn test_set_metadata_literal_plus() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 METADATA LITERAL+] Ready\r\n")
            .write(b"TAG1 SETMETADATA \"INBOX\" (\"/private/comment\" {3+}\r\na\nb)\r\n")
            .read(b"TAG1 OK SETMETADATA complete\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        client
            .set_metadata("INBOX", &[("/private/comment", Some("a\nb"))])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_metadata_literal_refused() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 METADATA] Ready\r\n")
            .write(b"TAG1 SETMETADATA \"INBOX\" (\"/private/comment\" {3}\r\n")
            .read(b"TAG1 NO Value too long\r\n")
            .write(b"TAG2 NOOP\r\n")
            .read(b"TAG2 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let err = client
            .set_metadata("INBOX", &[("/private/comment", Some("a\nb"))])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NegativeResponse(_)));
        client.noop().await.unwrap();
    }

    #[tokio::test]
    async fn test_server_metadata_capability() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 METADATA-SERVER] Ready\r\n")
            .write(b"TAG1 GETMETADATA \"\" (\"/shared/admin\")\r\n")
            .read(b"* METADATA \"\" (\"/shared/admin\" \"mailto:admin@example.com\")\r\nTAG1 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        assert!(client.get_metadata("INBOX", &["/shared/admin"]).await.unwrap().is_empty());
        let entries = client.get_metadata("", &["/shared/admin"]).await.unwrap();
        assert_eq!(entries[0].value_str(), Some("mailto:admin@example.com"));
    }

    #[tokio::test]
    async fn test_metadata_disabled_by_config() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 METADATA] Ready\r\n")
            .build();
        let config = Config::builder("imap.example.com")
            .security(Security::None)
            .io_timeout(Duration::from_secs(5))
            .disable_metadata(true)
            .build();
        let (mut client, _) = client_with(mock, config).await;

        assert!(client.get_metadata("INBOX", &["/private/comment"]).await.unwrap().is_empty());
        let err = client
            .set_metadata("INBOX", &[("/private/comment", Some("x"))])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
