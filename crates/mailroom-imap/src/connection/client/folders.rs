//! Folder commands.

use tokio::io::{AsyncRead, AsyncWrite};

use super::{ConnectionState, ImapClient};
use crate::command::Param;
use crate::connection::StartTls;
use crate::error::{Error, Result};
use crate::types::{Folder, FolderStatus, SelectedFolder, SequenceSet};

/// Attributes requested by [`ImapClient::folder_status`] when none are given.
pub const DEFAULT_STATUS_ITEMS: [&str; 4] = ["MESSAGES", "UNSEEN", "UIDNEXT", "UIDVALIDITY"];

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + StartTls,
{
    /// Lists folders matching `pattern` under `reference` (`LIST`).
    pub async fn folder_list(&mut self, reference: &str, pattern: &str) -> Result<Vec<Folder>> {
        self.list_folders("LIST", reference, pattern).await
    }

    /// Lists subscribed folders (`LSUB`).
    pub async fn folder_subscribed_list(
        &mut self,
        reference: &str,
        pattern: &str,
    ) -> Result<Vec<Folder>> {
        self.list_folders("LSUB", reference, pattern).await
    }

    async fn list_folders(
        &mut self,
        command: &str,
        reference: &str,
        pattern: &str,
    ) -> Result<Vec<Folder>> {
        let params = [self.folder_param(reference), self.folder_param(pattern)];
        let responses = self.send_request_get_response(command, &params).await?;
        let utf8 = self.is_utf8();

        Ok(responses
            .untagged(command)
            .filter_map(|r| Folder::from_response(r, utf8))
            .collect())
    }

    /// Returns folder counters without selecting it (`STATUS`).
    ///
    /// An empty `items` list requests [`DEFAULT_STATUS_ITEMS`].
    pub async fn folder_status(&mut self, name: &str, items: &[&str]) -> Result<FolderStatus> {
        let items = if items.is_empty() {
            &DEFAULT_STATUS_ITEMS[..]
        } else {
            items
        };
        let params = [self.folder_param(name), Param::atoms(items.iter().copied())];
        let responses = self.send_request_get_response("STATUS", &params).await?;

        responses
            .untagged("STATUS")
            .find_map(FolderStatus::from_response)
            .ok_or_else(|| Error::invalid(format!("no STATUS data for {name}")))
    }

    /// Opens a folder read-write (`SELECT`).
    pub async fn folder_select(&mut self, name: &str) -> Result<SelectedFolder> {
        self.select_folder(name, false).await
    }

    /// Opens a folder read-only (`EXAMINE`, or `SELECT` when the connection
    /// is configured to force it).
    pub async fn folder_examine(&mut self, name: &str) -> Result<SelectedFolder> {
        self.select_folder(name, true).await
    }

    async fn select_folder(&mut self, name: &str, read_only: bool) -> Result<SelectedFolder> {
        let command = if read_only && !self.config.force_select_on_examine {
            "EXAMINE"
        } else {
            "SELECT"
        };

        // A failed SELECT leaves no folder selected.
        self.current_folder = None;
        if self.state == ConnectionState::Selected {
            self.state = ConnectionState::Authenticated;
        }

        let params = [self.folder_param(name)];
        let responses = self.send_request_get_response(command, &params).await?;
        let folder = SelectedFolder::from_responses(name, read_only, &responses);

        self.current_folder = Some(folder.clone());
        self.state = ConnectionState::Selected;
        Ok(folder)
    }

    /// Closes the selected folder without expunging.
    ///
    /// Uses `UNSELECT` (RFC 3691) when available, otherwise selects a folder
    /// that cannot exist, which deselects on every server.
    pub async fn folder_unselect(&mut self) -> Result<()> {
        if self.current_folder.is_none() {
            return Ok(());
        }

        if self.is_supported("UNSELECT").await? {
            self.send_request_get_response("UNSELECT", &[]).await?;
        } else {
            match self
                .send_request_get_response("EXAMINE", &[Param::quoted("")])
                .await
            {
                Ok(_) | Err(Error::NegativeResponse(_) | Error::InvalidResponse { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        self.current_folder = None;
        if self.state == ConnectionState::Selected {
            self.state = ConnectionState::Authenticated;
        }
        Ok(())
    }

    /// Creates a folder, subscribing to it when `subscribe` is set.
    pub async fn folder_create(&mut self, name: &str, subscribe: bool) -> Result<()> {
        let params = [self.folder_param(name)];
        self.send_request_get_response("CREATE", &params).await?;
        if subscribe {
            self.folder_subscribe(name).await?;
        }
        Ok(())
    }

    /// Deletes a folder.
    pub async fn folder_delete(&mut self, name: &str) -> Result<()> {
        if self.current_folder.as_ref().is_some_and(|f| f.name == name) {
            self.folder_unselect().await?;
        }
        let params = [self.folder_param(name)];
        self.send_request_get_response("DELETE", &params).await?;
        Ok(())
    }

    /// Renames a folder.
    pub async fn folder_rename(&mut self, from: &str, to: &str) -> Result<()> {
        let params = [self.folder_param(from), self.folder_param(to)];
        self.send_request_get_response("RENAME", &params).await?;
        Ok(())
    }

    /// Subscribes to a folder.
    pub async fn folder_subscribe(&mut self, name: &str) -> Result<()> {
        let params = [self.folder_param(name)];
        self.send_request_get_response("SUBSCRIBE", &params).await?;
        Ok(())
    }

    /// Unsubscribes from a folder.
    pub async fn folder_unsubscribe(&mut self, name: &str) -> Result<()> {
        let params = [self.folder_param(name)];
        self.send_request_get_response("UNSUBSCRIBE", &params).await?;
        Ok(())
    }

    /// Permanently removes `\Deleted` messages from the selected folder.
    ///
    /// With `uids` and `UIDPLUS`, only those messages are expunged
    /// (`UID EXPUNGE`). Returns the expunged sequence numbers.
    pub async fn folder_expunge(&mut self, uids: Option<&SequenceSet>) -> Result<Vec<u32>> {
        let responses = match uids {
            Some(uids) if self.is_supported("UIDPLUS").await? => {
                self.send_request_get_response("UID EXPUNGE", &[Param::atom(uids.to_string())])
                    .await?
            }
            _ => self.send_request_get_response("EXPUNGE", &[]).await?,
        };

        let expunged: Vec<u32> = responses
            .untagged("EXPUNGE")
            .filter_map(crate::response::Response::number)
            .collect();

        if let Some(folder) = self.current_folder.as_mut() {
            let removed = u32::try_from(expunged.len()).unwrap_or(u32::MAX);
            folder.exists = folder.exists.saturating_sub(removed);
        }
        Ok(expunged)
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
    use crate::types::MailboxAttribute;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_folder_list_decodes_utf7() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 LIST \"\" \"*\"\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n")
            .read(b"* LIST (\\HasNoChildren \\Drafts) \"/\" \"Entw&APw-rfe\"\r\n")
            .read(b"* LIST (\\Noselect) \"/\" \"Archive\"\r\n")
            .read(b"TAG1 OK LIST completed\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let folders = client.folder_list("", "*").await.unwrap();
        assert_eq!(folders.len(), 3);
        assert_eq!(folders[1].name, "Entwürfe");
        assert_eq!(folders[1].raw_name, "Entw&APw-rfe");
        assert!(folders[1].has_attribute(&MailboxAttribute::Drafts));
        assert!(!folders[2].is_selectable());
    }

    #[tokio::test]
    async fn test_folder_subscribed_list() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 LSUB \"\" \"%\"\r\n")
            .read(b"* LSUB () \".\" \"INBOX\"\r\nTAG1 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let folders = client.folder_subscribed_list("", "%").await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].delimiter, Some('.'));
    }

    #[tokio::test]
    async fn test_folder_status() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 STATUS \"INBOX\" (MESSAGES UNSEEN UIDNEXT UIDVALIDITY)\r\n")
            .read(b"* STATUS \"INBOX\" (MESSAGES 12 UNSEEN 3 UIDNEXT 44 UIDVALIDITY 1700000000)\r\n")
            .read(b"TAG1 OK STATUS completed\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let status = client.folder_status("INBOX", &[]).await.unwrap();
        assert_eq!(status.messages, Some(12));
        assert_eq!(status.unseen, Some(3));
        assert_eq!(status.uid_next, Some(44));
        assert_eq!(status.uid_validity, Some(1700000000));
    }

    #[tokio::test]
    async fn test_select_then_unselect() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 UNSELECT] Ready\r\n")
            .write(b"TAG1 SELECT \"INBOX\"\r\n")
            .read(b"* FLAGS (\\Answered \\Seen)\r\n* 172 EXISTS\r\n* 1 RECENT\r\n")
            .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n* OK [UIDNEXT 4392] Predicted next UID\r\n")
            .read(b"TAG1 OK [READ-WRITE] SELECT completed\r\n")
            .write(b"TAG2 UNSELECT\r\n")
            .read(b"TAG2 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let folder = client.folder_select("INBOX").await.unwrap();
        assert_eq!(folder.exists, 172);
        assert_eq!(folder.recent, 1);
        assert_eq!(folder.uid_validity, Some(3857529045));
        assert_eq!(folder.uid_next, Some(4392));
        assert!(!folder.read_only);
        assert_eq!(client.state(), ConnectionState::Selected);
        assert_eq!(client.current_folder().unwrap().name, "INBOX");

        client.folder_unselect().await.unwrap();
        assert!(client.current_folder().is_none());
        client.folder_unselect().await.unwrap();
    }

    #[tokio::test]
    async fn test_examine_is_read_only() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 EXAMINE \"INBOX\"\r\n")
            .read(b"* 2 EXISTS\r\nTAG1 OK [READ-ONLY] EXAMINE completed\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let folder = client.folder_examine("INBOX").await.unwrap();
        assert!(folder.read_only);
    }

    #[tokio::test]
    async fn test_force_select_on_examine() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 SELECT \"INBOX\"\r\n")
            .read(b"TAG1 OK [READ-WRITE] SELECT completed\r\n")
            .build();
        let config = Config::builder("imap.example.com")
            .security(Security::None)
            .io_timeout(Duration::from_secs(5))
            .force_select_on_examine(true)
            .build();
        let (mut client, _) = client_with(mock, config).await;

        let folder = client.folder_examine("INBOX").await.unwrap();
        assert!(folder.read_only);
    }

    #[tokio::test]
    async fn test_failed_select_clears_folder() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 SELECT \"INBOX\"\r\n")
            .read(b"* 1 EXISTS\r\nTAG1 OK SELECT completed\r\n")
            .write(b"TAG2 SELECT \"Missing\"\r\n")
            .read(b"TAG2 NO Mailbox doesn't exist\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        client.folder_select("INBOX").await.unwrap();
        let err = client.folder_select("Missing").await.unwrap_err();
        assert!(matches!(err, Error::NegativeResponse(_)));
        assert!(client.current_folder().is_none());
    }

    #[tokio::test]
    async fn test_create_and_subscribe_encodes_name() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 CREATE \"Entw&APw-rfe\"\r\n")
            .read(b"TAG1 OK done\r\n")
            .write(b"TAG2 SUBSCRIBE \"Entw&APw-rfe\"\r\n")
            .read(b"TAG2 OK done\r\n")
            .write(b"TAG3 RENAME \"Entw&APw-rfe\" \"Old\"\r\n")
            .read(b"TAG3 OK done\r\n")
            .write(b"TAG4 UNSUBSCRIBE \"Old\"\r\n")
            .read(b"TAG4 OK done\r\n")
            .write(b"TAG5 DELETE \"Old\"\r\n")
            .read(b"TAG5 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        client.folder_create("Entwürfe", true).await.unwrap();
        client.folder_rename("Entwürfe", "Old").await.unwrap();
        client.folder_unsubscribe("Old").await.unwrap();
        client.folder_delete("Old").await.unwrap();
    }

    #[tokio::test]
    async fn test_uid_expunge() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 UIDPLUS] Ready\r\n")
            .write(b"TAG1 SELECT \"INBOX\"\r\n")
            .read(b"* 5 EXISTS\r\nTAG1 OK done\r\n")
            .write(b"TAG2 UID EXPUNGE 3:4\r\n")
            .read(b"* 3 EXPUNGE\r\n* 3 EXPUNGE\r\nTAG2 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        client.folder_select("INBOX").await.unwrap();
        let uids = SequenceSet::range(3, 4).unwrap();
        assert_eq!(client.folder_expunge(Some(&uids)).await.unwrap(), vec![3, 3]);
        assert_eq!(client.current_folder().unwrap().exists, 3);
    }
}
