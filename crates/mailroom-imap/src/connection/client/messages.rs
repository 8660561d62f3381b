//! Message commands for the selected folder.

use tokio::io::{AsyncRead, AsyncWrite};

use super::ImapClient;
use crate::command::{Param, StoreAction};
use crate::connection::StartTls;
use crate::error::{Error, Result};
use crate::response::{Item, UntaggedStream};
use crate::types::{FetchResponse, Flag, ResponseCode, SequenceSet};

fn uid_command(command: &str, uid: bool) -> String {
    if uid {
        format!("UID {command}")
    } else {
        command.to_string()
    }
}

fn fetch_params(set: &SequenceSet, items: &[&str]) -> [Param; 2] {
    let items = match items {
        [single] => Param::atom(*single),
        _ => Param::atoms(items.iter().copied()),
    };
    [Param::atom(set.to_string()), items]
}

fn flag_list(flags: &[Flag]) -> Param {
    Param::List(flags.iter().map(|f| Param::atom(f.as_str())).collect())
}

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + StartTls,
{
    /// Fetches data items (`FETCH` / `UID FETCH`).
    pub async fn fetch(
        &mut self,
        set: &SequenceSet,
        items: &[&str],
        uid: bool,
    ) -> Result<Vec<FetchResponse>> {
        if items.is_empty() {
            return Err(Error::InvalidArgument("no FETCH items given".into()));
        }
        let command = uid_command("FETCH", uid);
        let responses = self
            .send_request_get_response(&command, &fetch_params(set, items))
            .await?;

        Ok(responses
            .untagged("FETCH")
            .filter_map(FetchResponse::from_response)
            .collect())
    }

    /// Fetches data items and yields each untagged response as it arrives.
    ///
    /// Use [`FetchResponse::from_response`] on the yielded responses.
    pub async fn fetch_stream(
        &mut self,
        set: &SequenceSet,
        items: &[&str],
        uid: bool,
    ) -> Result<UntaggedStream<'_, S>> {
        if items.is_empty() {
            return Err(Error::InvalidArgument("no FETCH items given".into()));
        }
        let command = uid_command("FETCH", uid);
        self.stream_untagged(&command, &fetch_params(set, items))
            .await
    }

    /// Changes message flags (`STORE` / `UID STORE`).
    ///
    /// Returns the updated flags the server reported; empty when `silent`.
    pub async fn store_flags(
        &mut self,
        set: &SequenceSet,
        action: StoreAction,
        flags: &[Flag],
        uid: bool,
        silent: bool,
    ) -> Result<Vec<FetchResponse>> {
        let flags = match (action, flags) {
            // `FLAGS ()` clears every flag; an empty list param would be dropped.
            (StoreAction::SetFlags, []) => Param::atom("()"),
            (_, []) => return Ok(Vec::new()),
            _ => flag_list(flags),
        };
        let command = uid_command("STORE", uid);
        let params = [
            Param::atom(set.to_string()),
            Param::atom(action.item(silent)),
            flags,
        ];
        let responses = self.send_request_get_response(&command, &params).await?;

        Ok(responses
            .untagged("FETCH")
            .filter_map(FetchResponse::from_response)
            .collect())
    }

    /// Copies messages to another folder (`COPY` / `UID COPY`).
    pub async fn copy(&mut self, set: &SequenceSet, destination: &str, uid: bool) -> Result<()> {
        let command = uid_command("COPY", uid);
        let params = [Param::atom(set.to_string()), self.folder_param(destination)];
        self.send_request_get_response(&command, &params).await?;
        Ok(())
    }

    /// Moves messages to another folder.
    ///
    /// Uses `MOVE` (RFC 6851) when advertised. Otherwise copies, marks the
    /// originals `\Deleted` and expunges them; without `UIDPLUS` (or for
    /// sequence numbers) that expunge also removes other `\Deleted` messages.
    pub async fn move_messages(
        &mut self,
        set: &SequenceSet,
        destination: &str,
        uid: bool,
    ) -> Result<()> {
        if self.is_supported("MOVE").await? {
            let command = uid_command("MOVE", uid);
            let params = [Param::atom(set.to_string()), self.folder_param(destination)];
            self.send_request_get_response(&command, &params).await?;
            return Ok(());
        }

        self.copy(set, destination, uid).await?;
        self.store_flags(set, StoreAction::AddFlags, &[Flag::Deleted], uid, true)
            .await?;
        let uids = uid.then_some(set);
        self.folder_expunge(uids).await?;
        Ok(())
    }

    /// Searches the selected folder (`SEARCH` / `UID SEARCH`).
    ///
    /// `criteria` is sent as-is, e.g. `UNSEEN SINCE 1-Jan-2024`.
    pub async fn search(&mut self, criteria: &str, uid: bool) -> Result<Vec<u32>> {
        let criteria = criteria.trim();
        if criteria.is_empty() || criteria.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
            return Err(Error::InvalidArgument(
                "search criteria must be a single non-empty line".into(),
            ));
        }

        let mut params = Vec::with_capacity(3);
        if !criteria.is_ascii() {
            params.push(Param::atom("CHARSET"));
            params.push(Param::atom("UTF-8"));
        }
        params.push(Param::atom(criteria));

        let command = uid_command("SEARCH", uid);
        let responses = self.send_request_get_response(&command, &params).await?;

        Ok(responses
            .untagged("SEARCH")
            .flat_map(|r| r.items.iter().filter_map(Item::as_number))
            .filter_map(|n| u32::try_from(n).ok())
            .collect())
    }

    /// Appends a message to a folder.
    ///
    /// Honours `APPENDLIMIT` and uses a non-synchronizing literal when
    /// `LITERAL+` is advertised. Returns the new UID from `APPENDUID`.
    pub async fn append(
        &mut self,
        folder: &str,
        message: &[u8],
        flags: &[Flag],
        internal_date: Option<&str>,
    ) -> Result<Option<u32>> {
        let size = u64::try_from(message.len()).unwrap_or(u64::MAX);
        if let Some(limit) = self.append_limit().await?.filter(|limit| size > *limit) {
            return Err(Error::InvalidArgument(format!(
                "message of {size} octets exceeds APPENDLIMIT {limit}"
            )));
        }
        let non_sync = self.is_supported("LITERAL+").await?;

        let mut params = vec![self.folder_param(folder)];
        if !flags.is_empty() {
            params.push(flag_list(flags));
        }
        if let Some(date) = internal_date {
            params.push(Param::quoted(date));
        }
        params.push(Param::Literal {
            data: message.to_vec(),
            non_sync,
        });

        let segments = self.send_request("APPEND", &params, !non_sync).await?;
        let result = self.finish_literals("APPEND", segments).await;
        let responses = self.logged(result)?;

        Ok(responses.terminal().and_then(|r| match &r.code {
            Some(ResponseCode::AppendUid { uids, .. }) => uids.parse().ok(),
            _ => None,
        }))
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
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_fetch_with_literal() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 UID FETCH 1:2 (UID FLAGS BODY.PEEK[HEADER])\r\n")
            .read(b"* 1 FETCH (UID 10 FLAGS (\\Seen) BODY[HEADER] {15}\r\nSubject: Hi\r\n\r\n)\r\n")
            .read(b"* 2 FETCH (UID 11 FLAGS () BODY[HEADER] NIL)\r\n")
            .read(b"TAG1 OK FETCH completed\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let set = SequenceSet::range(1, 2).unwrap();
        let messages = client
            .fetch(&set, &["UID", "FLAGS", "BODY.PEEK[HEADER]"], true)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].uid(), Some(10));
        assert_eq!(messages[0].flags().unwrap(), vec![Flag::Seen]);
        assert_eq!(messages[0].body("HEADER"), Some(&b"Subject: Hi\r\n\r\n"[..]));
        assert_eq!(messages[1].uid(), Some(11));
    }

    #[tokio::test]
    async fn test_fetch_stream_yields_untagged() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 FETCH 1:* FLAGS\r\n")
            .read(b"* 1 FETCH (FLAGS (\\Seen))\r\n")
            .read(b"* 2 FETCH (FLAGS (\\Flagged))\r\n")
            .read(b"TAG1 OK done\r\n")
            .write(b"TAG2 NOOP\r\n")
            .read(b"TAG2 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let mut stream = client
            .fetch_stream(&SequenceSet::RangeFrom(1), &["FLAGS"], false)
            .await
            .unwrap();
        let mut seen = Vec::new();
        while let Some(response) = stream.next().await.unwrap() {
            seen.push(FetchResponse::from_response(&response).unwrap().seq);
        }
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(stream.collection().len(), 1);
        assert!(stream.next().await.unwrap().is_none());
        drop(stream);

        client.noop().await.unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_stream_is_drained() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 FETCH 1:* FLAGS\r\n")
            .read(b"* 1 FETCH (FLAGS (\\Seen))\r\n")
            .read(b"* 2 FETCH (FLAGS ())\r\nTAG1 OK done\r\n")
            .write(b"TAG2 NOOP\r\n")
            .read(b"TAG2 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let mut stream = client
            .fetch_stream(&SequenceSet::RangeFrom(1), &["FLAGS"], false)
            .await
            .unwrap();
        assert!(stream.next().await.unwrap().is_some());
        drop(stream);

        client.noop().await.unwrap();
        assert_eq!(client.current_tag().as_str(), "TAG2");
    }

    #[tokio::test]
    async fn test_store_flags() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 UID STORE 7 +FLAGS (\\Seen \\Flagged)\r\n")
            .read(b"* 3 FETCH (UID 7 FLAGS (\\Seen \\Flagged))\r\nTAG1 OK done\r\n")
            .write(b"TAG2 STORE 3 FLAGS.SILENT ()\r\n")
            .read(b"TAG2 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let set = SequenceSet::single(7).unwrap();
        let updated = client
            .store_flags(&set, StoreAction::AddFlags, &[Flag::Seen, Flag::Flagged], true, false)
            .await
            .unwrap();
        assert_eq!(updated[0].flags().unwrap(), vec![Flag::Seen, Flag::Flagged]);

        let set = SequenceSet::single(3).unwrap();
        let updated = client
            .store_flags(&set, StoreAction::SetFlags, &[], false, true)
            .await
            .unwrap();
        assert!(updated.is_empty());

        let nothing = client
            .store_flags(&set, StoreAction::RemoveFlags, &[], false, true)
            .await
            .unwrap();
        assert!(nothing.is_empty());
    }

    #[tokio::test]
    async fn test_move_with_capability() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 MOVE] Ready\r\n")
            .write(b"TAG1 UID MOVE 4:6 \"Archive\"\r\n")
            .read(b"* 4 EXPUNGE\r\nTAG1 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let set = SequenceSet::range(4, 6).unwrap();
        client.move_messages(&set, "Archive", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_move_fallback() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 UIDPLUS] Ready\r\n")
            .write(b"TAG1 UID COPY 9 \"Archive\"\r\n")
            .read(b"TAG1 OK [COPYUID 38505 9 101] done\r\n")
            .write(b"TAG2 UID STORE 9 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"TAG2 OK done\r\n")
            .write(b"TAG3 UID EXPUNGE 9\r\n")
            .read(b"* 2 EXPUNGE\r\nTAG3 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let set = SequenceSet::single(9).unwrap();
        client.move_messages(&set, "Archive", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_search() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 UID SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 2 84 882\r\nTAG1 OK done\r\n")
            .write(b"TAG2 SEARCH ALL\r\n")
            .read(b"* SEARCH\r\nTAG2 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        assert_eq!(client.search("UNSEEN", true).await.unwrap(), vec![2, 84, 882]);
        assert!(client.search("ALL", false).await.unwrap().is_empty());
        assert!(matches!(
            client.search("ALL\r\nTAG9 LOGOUT", false).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_append_synchronizing_literal() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 UIDPLUS] Ready\r\n")
            .write(b"TAG1 APPEND \"Sent\" (\\Seen) {11}\r\n")
            .read(b"+ Ready for literal data\r\n")
            .write(b"Hello\r\nWorld\r\n")
            .read(b"TAG1 OK [APPENDUID 38505 3955] APPEND completed\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        let uid = client
            .append("Sent", b"Hello\r\nWorld", &[Flag::Seen], None)
            .await
            .unwrap();
        assert_eq!(uid, Some(3955));
        assert!(logger.contains("<11 octets>"));
        assert!(!logger.contains("Hello"));
    }

    #[tokio::test]
    async fn test_append_literal_plus() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 LITERAL+] Ready\r\n")
            .write(b"TAG1 APPEND \"Drafts\" {3+}\r\nabc\r\n")
            .read(b"TAG1 OK APPEND completed\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        assert_eq!(client.append("Drafts", b"abc", &[], None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_append_rejected() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] Ready\r\n")
            .write(b"TAG1 APPEND \"Nope\" {3}\r\n")
            .read(b"TAG1 NO [TRYCREATE] No such mailbox\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let err = client.append("Nope", b"abc", &[], None).await.unwrap_err();
        assert!(matches!(err, Error::NegativeResponse(_)));
    }

    #[tokio::test]
    async fn test_append_limit() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 APPENDLIMIT=2] Ready\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let err = client.append("INBOX", b"abc", &[], None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
