//! Integration tests for the IMAP client.
//!
//! These tests drive the public API against a scripted mock stream, so no
//! real server is needed.

#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use proptest::prelude::*;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_test::io::{Builder, Mock};

use mailroom_imap::sasl::{MechanismKind, ScramHash, detect_type, parse_preferences};
use mailroom_imap::{
    Config, ConnectionError, ConnectionState, Credentials, Error, FetchResponse, ImapClient,
    Response, ResponseCollection, ResponseParser, Security, SequenceSet, Severity, StartTls,
    Status, TagManager, TranscriptLogger,
};

/// Scripted stream that remembers whether TLS was negotiated.
struct MockStream {
    inner: Mock,
    tls: Arc<AtomicBool>,
}

impl MockStream {
    fn new(inner: Mock) -> (Self, Arc<AtomicBool>) {
        let tls = Arc::new(AtomicBool::new(false));
        (
            Self {
                inner,
                tls: Arc::clone(&tls),
            },
            tls,
        )
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl StartTls for MockStream {
    fn start_tls(
        self,
        _host: &str,
    ) -> impl Future<Output = Result<Self, ConnectionError>> + Send {
        async move {
            self.tls.store(true, Ordering::SeqCst);
            Ok(self)
        }
    }
}

fn plain_config() -> Config {
    Config::builder("imap.example.com")
        .security(Security::None)
        .io_timeout(Duration::from_secs(5))
        .build()
}

async fn connect(
    mock: Mock,
    config: Config,
) -> (ImapClient<MockStream>, Arc<TranscriptLogger>, Arc<AtomicBool>) {
    let (stream, tls) = MockStream::new(mock);
    let logger = Arc::new(TranscriptLogger::new());
    let client = ImapClient::from_stream(stream, config, logger.clone())
        .await
        .unwrap();
    (client, logger, tls)
}

#[tokio::test]
async fn test_full_session() {
    let mock = Builder::new()
        .read(b"* OK IMAP4rev1 Service Ready\r\n")
        .write(b"TAG1 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN UIDPLUS\r\n")
        .read(b"TAG1 OK CAPABILITY completed\r\n")
        .write(b"TAG2 AUTHENTICATE PLAIN AHVzZXIAc2VjcmV0\r\n")
        .read(b"TAG2 OK [CAPABILITY IMAP4rev1 UIDPLUS MOVE] Logged in\r\n")
        .write(b"TAG3 LIST \"\" \"*\"\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n")
        .read(b"* LIST (\\HasNoChildren \\Sent) \"/\" \"Sent\"\r\n")
        .read(b"TAG3 OK LIST completed\r\n")
        .write(b"TAG4 SELECT \"INBOX\"\r\n")
        .read(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
        .read(b"* 2 EXISTS\r\n* 0 RECENT\r\n")
        .read(b"* OK [UIDVALIDITY 1700000000] UIDs valid\r\n")
        .read(b"TAG4 OK [READ-WRITE] SELECT completed\r\n")
        .write(b"TAG5 UID FETCH 1:* (UID BODY.PEEK[])\r\n")
        .read(b"* 1 FETCH (UID 10 BODY[] {5}\r\nHE\r\nO)\r\n")
        .read(b"* 2 FETCH (UID 11 BODY[] {3}\r\nabc)\r\n")
        .read(b"TAG5 OK FETCH completed\r\n")
        .write(b"TAG6 LOGOUT\r\n")
        .read(b"* BYE Logging out\r\n")
        .read(b"TAG6 OK LOGOUT completed\r\n")
        .build();
    let (mut client, logger, _) = connect(mock, plain_config()).await;
    assert_eq!(client.state(), ConnectionState::Connected);

    assert!(client.is_supported("AUTH=PLAIN").await.unwrap());
    client
        .login(&Credentials::new("user", "secret").with_mechanisms(["PLAIN"]))
        .await
        .unwrap();
    assert_eq!(client.state(), ConnectionState::Authenticated);
    assert_eq!(client.logged_in_user(), Some("user"));
    // The login response carried fresh capabilities.
    assert!(client.is_supported("MOVE").await.unwrap());

    let folders = client.folder_list("", "*").await.unwrap();
    let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["INBOX", "Sent"]);

    let inbox = client.folder_select("INBOX").await.unwrap();
    assert_eq!(inbox.exists, 2);
    assert_eq!(inbox.uid_validity, Some(1_700_000_000));
    assert_eq!(client.state(), ConnectionState::Selected);

    let mut stream = client
        .fetch_stream(&SequenceSet::RangeFrom(1), &["UID", "BODY.PEEK[]"], true)
        .await
        .unwrap();
    let mut bodies = Vec::new();
    while let Some(response) = stream.next().await.unwrap() {
        let fetch = FetchResponse::from_response(&response).unwrap();
        bodies.push((fetch.uid().unwrap(), fetch.body("BODY[]").unwrap().to_vec()));
    }
    drop(stream);
    assert_eq!(
        bodies,
        vec![(10, b"HE\r\nO".to_vec()), (11, b"abc".to_vec())]
    );

    client.logout().await.unwrap();
    assert_eq!(client.state(), ConnectionState::LoggedOut);
    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::LoggedOut);

    assert!(!logger.contains("secret"));
    assert!(!logger.contains("AHVzZXIAc2VjcmV0"));
}

#[tokio::test]
async fn test_capability_lookup() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN IDLE] Ready\r\n")
        .build();
    let (mut client, _, _) = connect(mock, plain_config()).await;

    assert!(client.is_supported("AUTH=PLAIN").await.unwrap());
    assert!(client.is_supported("idle").await.unwrap());
    assert!(!client.is_supported("STARTTLS").await.unwrap());
    assert!(!client.is_supported("  ").await.unwrap());
    assert!(client.is_auth_supported("plain").await.unwrap());
    assert!(!client.is_auth_supported("XOAUTH2").await.unwrap());
}

#[tokio::test]
async fn test_rejected_login_is_bad_credentials() {
    let mock = Builder::new()
        .read(b"* OK Ready\r\n")
        .write(b"TAG1 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\nTAG1 OK done\r\n")
        .write(b"TAG2 LOGIN \"user\" \"hunter2\"\r\n")
        .read(b"TAG2 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
        .build();
    let (mut client, logger, _) = connect(mock, plain_config()).await;

    let err = client
        .login(&Credentials::new("user", "hunter2").with_mechanisms(["LOGIN"]))
        .await
        .unwrap_err();
    let responses = match err {
        Error::LoginBadCredentials(responses) => responses,
        other => panic!("expected LoginBadCredentials, got {other:?}"),
    };
    assert_eq!(responses.text(), "Invalid credentials");
    assert!(!client.is_logged_in());
    assert!(!logger.contains("hunter2"));
    assert!(
        logger
            .lines()
            .iter()
            .any(|line| line.severity == Severity::Notice)
    );
}

#[tokio::test]
async fn test_starttls_upgrade() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] Ready\r\n")
        .write(b"TAG1 STARTTLS\r\n")
        .read(b"TAG1 OK Begin TLS negotiation now\r\n")
        .write(b"TAG2 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n")
        .read(b"TAG2 OK CAPABILITY completed\r\n")
        .build();
    let config = Config::builder("imap.example.com")
        .security(Security::StartTls)
        .io_timeout(Duration::from_secs(5))
        .build();
    let (mut client, _, tls) = connect(mock, config).await;

    assert!(tls.load(Ordering::SeqCst));
    assert!(client.cached_capabilities().is_none());
    assert!(!client.is_supported("LOGINDISABLED").await.unwrap());
    assert!(client.is_supported("AUTH=PLAIN").await.unwrap());
}

#[tokio::test]
async fn test_unknown_tag_is_rejected() {
    let mock = Builder::new()
        .read(b"* OK Ready\r\n")
        .write(b"TAG1 NOOP\r\n")
        .read(b"OTHER7 OK stray\r\n")
        .build();
    let (mut client, _, _) = connect(mock, plain_config()).await;

    let err = client.noop().await.unwrap_err();
    assert!(matches!(err, Error::InvalidResponse { .. }));
}

#[test]
fn test_literal_keeps_embedded_crlf() {
    let response = ResponseParser::parse(b"* 1 FETCH (BODY[] {5}\r\nHE\r\nO)\r\n").unwrap();
    let fetch = FetchResponse::from_response(&response).unwrap();
    assert_eq!(fetch.seq, 1);
    assert_eq!(fetch.body("BODY[]"), Some(&b"HE\r\nO"[..]));
}

fn cycle(lines: &[&[u8]]) -> ResponseCollection {
    let mut collection = ResponseCollection::new();
    for line in lines {
        collection.push(ResponseParser::parse(line).unwrap());
    }
    collection
}

#[test]
fn test_cycle_validation() {
    let ok = cycle(&[b"* 3 EXISTS\r\n", b"TAG1 OK done\r\n"]);
    assert!(ok.validate().is_ok());

    let no = cycle(&[b"TAG1 NO nope\r\n"]);
    assert!(matches!(no.validate(), Err(Error::NegativeResponse(_))));

    let bad = cycle(&[b"TAG1 BAD syntax\r\n"]);
    assert!(matches!(bad.validate(), Err(Error::InvalidResponse { .. })));

    let continuation = cycle(&[b"+ go ahead\r\n"]);
    assert!(continuation.validate().is_ok());

    let untagged = cycle(&[b"* 3 EXISTS\r\n"]);
    assert!(matches!(untagged.validate(), Err(Error::ResponseNotFound(_))));

    assert!(matches!(
        ResponseCollection::new().validate(),
        Err(Error::ResponseNotFound(_))
    ));
}

#[test]
fn test_tagged_status_parsing() {
    let response: Response = ResponseParser::parse(b"A001 OK [READ-ONLY] done\r\n").unwrap();
    assert!(response.is_tagged());
    assert_eq!(response.status(), Some(Status::Ok));
    assert_eq!(response.text, "done");
}

#[test]
fn test_mechanism_selection() {
    let both = |m: &str| m.eq_ignore_ascii_case("PLAIN") || m.eq_ignore_ascii_case("LOGIN");
    let prefs = parse_preferences(&["LOGIN", "PLAIN"]).unwrap();
    assert_eq!(detect_type(both, &prefs).unwrap(), MechanismKind::Login);

    let advertised = ["PLAIN", "SCRAM-SHA-256", "XOAUTH2"];
    let supported = |m: &str| advertised.iter().any(|a| a.eq_ignore_ascii_case(m));

    let prefs = parse_preferences(&["CRAM-MD5", "SCRAM-SHA-256", "PLAIN"]).unwrap();
    assert_eq!(
        detect_type(supported, &prefs).unwrap(),
        MechanismKind::Scram(ScramHash::Sha256)
    );

    let prefs = parse_preferences(&["CRAM-MD5"]).unwrap();
    assert!(detect_type(supported, &prefs).is_err());

    assert!(parse_preferences(&["SCRAM-SHA-256-PLUS"]).is_err());
}

proptest! {
    #[test]
    fn prop_tags_are_unique(count in 1usize..200) {
        let mut tags = TagManager::new();
        let issued: Vec<String> = (0..count).map(|_| tags.new_tag().to_string()).collect();
        let mut deduped = issued.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), issued.len());
        prop_assert_eq!(tags.pending_count(), count);
    }
}
