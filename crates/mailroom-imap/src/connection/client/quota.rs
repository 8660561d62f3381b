//! Quota commands (RFC 2087).

use tokio::io::{AsyncRead, AsyncWrite};

use super::ImapClient;
use crate::command::Param;
use crate::connection::StartTls;
use crate::error::Result;
use crate::types::{Quota, QuotaRoot};

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + StartTls,
{
    /// Returns the quota roots of a folder and their usage
    /// (`GETQUOTAROOT`), `None` without `QUOTA`.
    pub async fn quota_root(&mut self, folder: &str) -> Result<Option<QuotaRoot>> {
        if !self.is_supported("QUOTA").await? {
            return Ok(None);
        }

        let params = [self.folder_param(folder)];
        let responses = self
            .send_request_get_response("GETQUOTAROOT", &params)
            .await?;
        Ok(Some(QuotaRoot::from_responses(folder, &responses)))
    }

    /// Returns the usage of one quota root (`GETQUOTA`), `None` without
    /// `QUOTA` or when the server sent no data.
    pub async fn quota(&mut self, root: &str) -> Result<Option<Quota>> {
        if !self.is_supported("QUOTA").await? {
            return Ok(None);
        }

        let responses = self
            .send_request_get_response("GETQUOTA", &[Param::quoted(root)])
            .await?;
        Ok(responses.untagged("QUOTA").find_map(Quota::from_response))
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
    use super::super::tests::client;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_quota_root() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 QUOTA] Ready\r\n")
            .write(b"TAG1 GETQUOTAROOT \"INBOX\"\r\n")
            .read(b"* QUOTAROOT INBOX \"\"\r\n")
            .read(b"* QUOTA \"\" (STORAGE 10 512 MESSAGE 4 1000)\r\n")
            .read(b"TAG1 OK Getquota completed\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let root = client.quota_root("INBOX").await.unwrap().unwrap();
        assert_eq!(root.roots, vec![String::new()]);
        let storage = root.quotas[0].resource("STORAGE").unwrap();
        assert_eq!((storage.usage, storage.limit), (10, 512));
    }

    #[tokio::test]
    async fn test_quota() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 QUOTA] Ready\r\n")
            .write(b"TAG1 GETQUOTA \"user.alice\"\r\n")
            .read(b"* QUOTA \"user.alice\" (STORAGE 1 100)\r\nTAG1 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let quota = client.quota("user.alice").await.unwrap().unwrap();
        assert_eq!(quota.root, "user.alice");
        assert_eq!(quota.resources.len(), 1);
    }

    #[tokio::test]
    async fn test_quota_unsupported() {
        let mock = Builder::new().read(b"* OK [CAPABILITY IMAP4rev1] Ready\r\n").build();
        let (mut client, _) = client(mock).await;

        assert!(client.quota_root("INBOX").await.unwrap().is_none());
        assert!(client.quota("").await.unwrap().is_none());
    }
}
