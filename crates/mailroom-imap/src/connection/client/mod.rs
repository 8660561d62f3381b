//! IMAP client connection.
//!
//! [`ImapClient`] owns one transport and drives strictly sequential command
//! cycles over it: every command method takes `&mut self`, sends one tagged
//! request and reads until that tag's completion (or a continuation).
//!
//! Connection states:
//!
//! ```text
//! Disconnected → Connected → (STARTTLS)? → Authenticated ⇄ Selected → LoggedOut
//! ```
//!
//! Command groups (folders, messages, quota, metadata) live in their own
//! `impl` blocks and only use the public send/receive methods.

#![allow(clippy::missing_errors_doc)]

mod auth;
mod credentials;
mod folders;
mod messages;
mod metadata;
mod quota;

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};

pub use self::credentials::Credentials;
pub use self::folders::DEFAULT_STATUS_ITEMS;
use super::config::Config;
use super::stream::{self, ImapStream, StartTls};
use super::transport::Transport;
use crate::command::{Param, RequestLine, TagManager, quote, utf7};
use crate::error::{ConnectionError, Error, Result};
use crate::log::{CATEGORY, Logger, PLACEHOLDER, Severity};
use crate::parser::ResponseParser;
use crate::response::{Item, Response, ResponseCollection, UntaggedStream};
use crate::types::{Capabilities, Namespace, ResponseCode, SelectedFolder, Status, Tag};

/// Answer of [`ImapClient::server_id`] when the server does not identify itself.
pub const UNKNOWN_SERVER_ID: &str = "UNKNOWN";

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No usable transport.
    Disconnected,
    /// Greeting received, not authenticated.
    Connected,
    /// Logged in (or pre-authenticated), no folder selected.
    Authenticated,
    /// Logged in with a selected folder.
    Selected,
    /// `LOGOUT` was sent.
    LoggedOut,
}

/// IMAP client over one connection.
pub struct ImapClient<S = ImapStream> {
    transport: Transport<S>,
    config: Config,
    logger: Arc<dyn Logger>,
    tags: TagManager,
    capabilities: Option<Arc<Capabilities>>,
    state: ConnectionState,
    utf8: bool,
    logged_in_user: Option<String>,
    current_folder: Option<SelectedFolder>,
    last_command: Option<String>,
    abandoned: Option<Tag>,
    #[cfg(test)]
    scram_nonce: Option<String>,
}

// Manual Debug implementation since Transport and the logger don't implement Debug
impl<S> fmt::Debug for ImapClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapClient")
            .field("host", &self.config.host)
            .field("state", &self.state)
            .field("tags", &self.tags)
            .field("capabilities", &self.capabilities)
            .field("utf8", &self.utf8)
            .field("logged_in_user", &self.logged_in_user)
            .finish_non_exhaustive()
    }
}

impl ImapClient<ImapStream> {
    /// Connects to the configured server and reads its greeting.
    ///
    /// Performs STARTTLS when the security mode asks for it.
    pub async fn connect(config: Config, logger: Arc<dyn Logger>) -> Result<Self> {
        logger.write(
            &format!(
                "Connecting to {}:{} ({:?})",
                config.host, config.port, config.security
            ),
            Severity::Info,
            CATEGORY,
        );

        match stream::connect(&config).await {
            Ok(stream) => Self::from_stream(stream, config, logger).await,
            Err(err) => {
                let err = Error::from(err);
                logger.write(&err.to_string(), Severity::Warning, CATEGORY);
                Err(err)
            }
        }
    }
}

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + StartTls,
{
    /// Wraps an open stream, reads the greeting and negotiates STARTTLS.
    pub async fn from_stream(stream: S, config: Config, logger: Arc<dyn Logger>) -> Result<Self> {
        let transport = Transport::new(stream, config.io_timeout, Arc::clone(&logger));
        let mut client = Self {
            transport,
            config,
            logger,
            tags: TagManager::new(),
            capabilities: None,
            state: ConnectionState::Connected,
            utf8: false,
            logged_in_user: None,
            current_folder: None,
            last_command: None,
            abandoned: None,
            #[cfg(test)]
            scram_nonce: None,
        };

        match client.greeting().await {
            Ok(()) => Ok(client),
            Err(err) => {
                let err = client.log_error(err);
                client.disconnect().await;
                Err(err)
            }
        }
    }

    async fn greeting(&mut self) -> Result<()> {
        let greeting = self.read_response().await?;
        if !greeting.is_untagged() {
            return Err(Error::invalid("server greeting is not an untagged response"));
        }

        match greeting.status() {
            Some(Status::Ok) => {}
            Some(Status::PreAuth) => self.state = ConnectionState::Authenticated,
            Some(Status::Bye) => return Err(Error::Bye(greeting.text)),
            _ => {
                return Err(Error::invalid(format!(
                    "unexpected greeting: {}",
                    greeting.status_or_index
                )));
            }
        }

        if let Some(ResponseCode::Capability(tokens)) = &greeting.code {
            self.set_capabilities(tokens.clone());
        }

        let security = self.config.security;
        if security.wants_starttls() {
            if self.capability_inner().await?.contains("STARTTLS") {
                self.starttls().await?;
            } else if security.requires_starttls() {
                return Err(Error::StartTlsUnsupported);
            }
        }

        Ok(())
    }

    async fn starttls(&mut self) -> Result<()> {
        self.execute("STARTTLS", &[]).await?;
        let host = self.config.host.clone();
        self.transport.upgrade(&host).await?;
        self.capabilities = None;
        self.logger
            .write("TLS negotiation complete", Severity::Info, CATEGORY);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Request / response core
    // ---------------------------------------------------------------------

    /// Sends `<tag> <command> <params>`.
    ///
    /// With `break_on_literal`, only the part up to the first synchronizing
    /// literal marker is sent; the rest is returned as one segment per
    /// literal, each to be sent after a continuation from the server. The tag
    /// is [`ImapClient::current_tag`].
    pub async fn send_request(
        &mut self,
        command: &str,
        params: &[Param],
        break_on_literal: bool,
    ) -> Result<Vec<Vec<u8>>> {
        let result = self.send(command, params, break_on_literal).await;
        self.logged(result.map(|(_, remainder)| remainder))
    }

    /// Reads the cycle of the last sent request and validates it.
    pub async fn get_response(&mut self) -> Result<ResponseCollection> {
        let tag = self.tags.current_tag();
        let result = self.receive(&tag).await;
        self.logged(result)
    }

    /// Sends a request and returns its validated cycle.
    pub async fn send_request_get_response(
        &mut self,
        command: &str,
        params: &[Param],
    ) -> Result<ResponseCollection> {
        let result = self.execute(command, params).await;
        self.logged(result)
    }

    /// Sends a request and streams its untagged responses.
    ///
    /// Dropping the stream early leaves the cycle open; it is drained before
    /// the next request.
    pub async fn stream_untagged(
        &mut self,
        command: &str,
        params: &[Param],
    ) -> Result<UntaggedStream<'_, S>> {
        let result = self.send(command, params, false).await;
        let (tag, _) = self.logged(result)?;
        self.abandoned = Some(tag.clone());
        Ok(UntaggedStream::new(self, tag))
    }

    /// Writes raw bytes, e.g. a literal after a continuation.
    ///
    /// `logged` replaces the bytes in the transcript.
    pub async fn send_raw(&mut self, data: &[u8], logged: Option<&str>) -> Result<()> {
        let result = self.transport.write_raw(data, logged).await;
        self.logged(result)
    }

    pub(crate) async fn send(
        &mut self,
        command: &str,
        params: &[Param],
        break_on_literal: bool,
    ) -> Result<(Tag, Vec<Vec<u8>>)> {
        if !self.transport.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }
        self.drain_abandoned().await?;

        let tag = self.tags.new_tag();
        let request =
            RequestLine::build(tag.clone(), command, params, break_on_literal).map_err(|err| {
                self.tags.complete(tag.as_str());
                err
            })?;

        for secret in &request.secrets {
            self.logger.add_secret(secret);
        }
        self.last_command = Some(request.logged.clone());
        self.transport
            .write_raw(&request.bytes, Some(&request.logged))
            .await?;

        Ok((tag, request.remainder))
    }

    /// Sends the segments left over by [`ImapClient::send_request`], each
    /// after the server's go-ahead, and reads the final cycle.
    pub(crate) async fn finish_literals(
        &mut self,
        command: &str,
        segments: Vec<Vec<u8>>,
    ) -> Result<ResponseCollection> {
        let tag = self.tags.current_tag();
        for segment in segments {
            let ready = self.receive(&tag).await?;
            if ready.continuation_value().is_none() {
                return Err(Error::invalid(format!(
                    "{command} completed before the literal was sent"
                )));
            }
            let logged = format!("<{} octets>", segment.len());
            self.transport.write_raw(&segment, Some(&logged)).await?;
        }
        self.receive(&tag).await
    }

    pub(crate) async fn receive(&mut self, tag: &Tag) -> Result<ResponseCollection> {
        self.read_cycle(tag).await?.validate()
    }

    pub(crate) async fn execute(
        &mut self,
        command: &str,
        params: &[Param],
    ) -> Result<ResponseCollection> {
        let (tag, _) = self.send(command, params, false).await?;
        self.receive(&tag).await
    }

    /// Sends one base64 line of a SASL exchange.
    pub(crate) async fn send_sasl(&mut self, data: &[u8], secret: bool) -> Result<()> {
        let encoded = STANDARD.encode(data);
        if secret {
            self.logger.add_secret(&encoded);
        }
        let logged = if secret { PLACEHOLDER } else { encoded.as_str() };
        let line = format!("{encoded}\r\n");
        self.transport.write_raw(line.as_bytes(), Some(logged)).await
    }

    async fn read_response(&mut self) -> Result<Response> {
        let bytes = self.transport.read_response().await?;
        ResponseParser::parse(&bytes)
    }

    /// Reads the responses of the cycle ending at `end_tag`, unvalidated.
    pub(crate) async fn read_cycle(&mut self, end_tag: &Tag) -> Result<ResponseCollection> {
        let mut responses = ResponseCollection::new();
        loop {
            let response = self.next_cycle_response(end_tag).await?;
            let terminal = Self::is_terminal(&response, end_tag);
            responses.push(response);
            if terminal {
                return Ok(responses);
            }
        }
    }

    /// Reads one response while `end_tag` is outstanding.
    pub(crate) async fn next_cycle_response(&mut self, end_tag: &Tag) -> Result<Response> {
        let bytes = match self.transport.read_response().await {
            Err(Error::Connection(ConnectionError::Closed)) => {
                return Err(Error::ResponseNotFound(format!(
                    "connection closed before {end_tag} completed"
                )));
            }
            other => other?,
        };
        let response = match ResponseParser::parse(&bytes) {
            Ok(response) => response,
            Err(err) => {
                self.resync_after_garbage(&bytes, end_tag);
                return Err(err);
            }
        };

        if response.code == Some(ResponseCode::ClientBug) {
            let command = self.last_command.as_deref().unwrap_or_default();
            self.logger.write(
                &format!("[CLIENTBUG] {} (command: {command})", response.text),
                Severity::Warning,
                CATEGORY,
            );
        }

        if let Some(tag) = &response.tag {
            if !self.tags.is_pending(tag.as_str()) {
                self.abandoned = Some(end_tag.clone());
                return Err(Error::invalid(format!("tagged response for unknown tag {tag}")));
            }
            if let Some(elapsed) = self.tags.complete(tag.as_str()) {
                self.logger.write(
                    &format!("{tag} completed in {:.3}s", elapsed.as_secs_f64()),
                    Severity::Time,
                    CATEGORY,
                );
            }
        }

        Ok(response)
    }

    /// Keeps the connection in step after an unparsable response: the rest
    /// of the cycle is drained before the next command, unless the garbage
    /// was the cycle's own tagged line.
    fn resync_after_garbage(&mut self, bytes: &[u8], end_tag: &Tag) {
        let own_tagged = bytes
            .strip_prefix(end_tag.as_str().as_bytes())
            .is_some_and(|rest| rest.starts_with(b" "));
        if own_tagged {
            self.tags.complete(end_tag.as_str());
        } else {
            self.abandoned = Some(end_tag.clone());
        }
    }

    pub(crate) fn is_terminal(response: &Response, end_tag: &Tag) -> bool {
        response.is_continuation() || response.tag.as_ref() == Some(end_tag)
    }

    pub(crate) fn finish_stream(&mut self, tag: &Tag) {
        if self.abandoned.as_ref() == Some(tag) {
            self.abandoned = None;
        }
    }

    async fn drain_abandoned(&mut self) -> Result<()> {
        if let Some(tag) = self.abandoned.take() {
            self.logger.write(
                &format!("Draining unfinished cycle {tag}"),
                Severity::Debug,
                CATEGORY,
            );
            self.read_cycle(&tag).await?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Capabilities
    // ---------------------------------------------------------------------

    /// Returns the server capabilities, sending `CAPABILITY` if none are
    /// cached.
    pub async fn capability(&mut self) -> Result<Arc<Capabilities>> {
        let result = self.capability_inner().await;
        self.logged(result)
    }

    async fn capability_inner(&mut self) -> Result<Arc<Capabilities>> {
        if let Some(capabilities) = &self.capabilities {
            return Ok(Arc::clone(capabilities));
        }

        let responses = self.execute("CAPABILITY", &[]).await?;
        Ok(match responses.capability_result() {
            Some(tokens) => self.set_capabilities(tokens),
            // Nothing to cache; the next query asks again.
            None => Arc::new(Capabilities::default()),
        })
    }

    /// Replaces the cached capability set.
    pub(crate) fn set_capabilities(&mut self, tokens: Vec<String>) -> Arc<Capabilities> {
        let mut capabilities = Capabilities::new(tokens);
        if self.config.disable_metadata {
            capabilities = capabilities.without("METADATA");
        }
        let capabilities = Arc::new(capabilities);
        self.capabilities = Some(Arc::clone(&capabilities));
        capabilities
    }

    /// Returns the cached capability set without querying the server.
    #[must_use]
    pub fn cached_capabilities(&self) -> Option<Arc<Capabilities>> {
        self.capabilities.clone()
    }

    /// Returns true if the server advertises `name`. Blank names are never
    /// supported.
    pub async fn is_supported(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        Ok(self.capability().await?.contains(name))
    }

    /// Returns true if the server advertises `AUTH=<mechanism>`.
    pub async fn is_auth_supported(&mut self, mechanism: &str) -> Result<bool> {
        Ok(self.capability().await?.supports_auth(mechanism))
    }

    /// Returns the advertised `APPENDLIMIT`, if any.
    pub async fn append_limit(&mut self) -> Result<Option<u64>> {
        Ok(self.capability().await?.append_limit())
    }

    // ---------------------------------------------------------------------
    // Session commands
    // ---------------------------------------------------------------------

    /// Enables extensions (RFC 5161) and returns what the server enabled.
    ///
    /// An empty list sends nothing.
    pub async fn enable(&mut self, extensions: &[&str]) -> Result<Vec<String>> {
        if extensions.is_empty() {
            return Ok(Vec::new());
        }

        let params: Vec<Param> = extensions.iter().map(|e| Param::atom(*e)).collect();
        let responses = self.send_request_get_response("ENABLE", &params).await?;
        let enabled: Vec<String> = responses
            .untagged("ENABLED")
            .flat_map(|r| r.items.iter().filter_map(Item::to_text))
            .collect();

        if enabled
            .iter()
            .any(|e| e.eq_ignore_ascii_case("UTF8=ACCEPT") || e.eq_ignore_ascii_case("UTF8=ONLY"))
        {
            self.utf8 = true;
        }
        Ok(enabled)
    }

    /// Sends `NOOP`.
    pub async fn noop(&mut self) -> Result<()> {
        self.send_request_get_response("NOOP", &[]).await?;
        Ok(())
    }

    /// Sends `LOGOUT` if logged in. Safe to call more than once.
    pub async fn logout(&mut self) -> Result<()> {
        if !self.is_logged_in() {
            return Ok(());
        }

        self.state = ConnectionState::LoggedOut;
        self.logged_in_user = None;
        self.current_folder = None;

        match self.execute("LOGOUT", &[]).await {
            // Servers may close right after BYE.
            Ok(_) | Err(Error::ResponseNotFound(_)) => Ok(()),
            Err(err) => Err(self.log_error(err)),
        }
    }

    /// Closes the transport. Safe to call more than once.
    pub async fn disconnect(&mut self) {
        if self.transport.is_connected() {
            self.transport.disconnect().await;
            self.logger.write("Disconnected", Severity::Info, CATEGORY);
        }
        if self.state != ConnectionState::LoggedOut {
            self.state = ConnectionState::Disconnected;
        }
        self.current_folder = None;
    }

    /// Returns the server's `ID` (RFC 2971) as `key=value` pairs, or
    /// [`UNKNOWN_SERVER_ID`].
    pub async fn server_id(&mut self) -> Result<String> {
        if !self.is_supported("ID").await? {
            return Ok(UNKNOWN_SERVER_ID.to_string());
        }

        let responses = self.send_request_get_response("ID", &[Param::Nil]).await?;
        let id = responses
            .untagged("ID")
            .find_map(|r| r.items.first().and_then(Item::as_list))
            .map(|fields| {
                fields
                    .chunks_exact(2)
                    .filter_map(|pair| Some(format!("{}={}", pair[0].to_text()?, pair[1].to_text()?)))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|id| !id.is_empty());

        Ok(id.unwrap_or_else(|| UNKNOWN_SERVER_ID.to_string()))
    }

    /// Returns the server namespaces (RFC 2342), `None` if unsupported.
    pub async fn namespace(&mut self) -> Result<Option<Namespace>> {
        if !self.is_supported("NAMESPACE").await? {
            return Ok(None);
        }

        let responses = self.send_request_get_response("NAMESPACE", &[]).await?;
        Ok(responses
            .untagged("NAMESPACE")
            .find_map(Namespace::from_response))
    }

    // ---------------------------------------------------------------------
    // Escaping
    // ---------------------------------------------------------------------

    /// Quotes a string for the wire; `None` becomes `NIL`.
    pub fn escape_string(value: Option<&str>) -> Result<String> {
        value.map_or_else(|| Ok("NIL".to_string()), quote)
    }

    /// Encodes a folder name: modified UTF-7 unless UTF8 was enabled.
    #[must_use]
    pub fn escape_folder_name(&self, name: &str) -> String {
        if self.utf8 {
            name.to_string()
        } else {
            utf7::encode(name)
        }
    }

    /// Decodes a folder name sent by the server.
    #[must_use]
    pub fn to_utf8(&self, name: &str) -> String {
        if self.utf8 {
            name.to_string()
        } else {
            utf7::decode(name).unwrap_or_else(|| name.to_string())
        }
    }

    pub(crate) fn folder_param(&self, name: &str) -> Param {
        Param::quoted(self.escape_folder_name(name))
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Returns the connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns true once authenticated, until logout.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Authenticated | ConnectionState::Selected
        )
    }

    /// Returns the user `login` authenticated as.
    #[must_use]
    pub fn logged_in_user(&self) -> Option<&str> {
        self.logged_in_user.as_deref()
    }

    /// Returns true if UTF8=ACCEPT is in effect.
    #[must_use]
    pub const fn is_utf8(&self) -> bool {
        self.utf8
    }

    /// Returns the selected folder.
    #[must_use]
    pub const fn current_folder(&self) -> Option<&SelectedFolder> {
        self.current_folder.as_ref()
    }

    /// Returns the connection settings.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the last issued tag.
    #[must_use]
    pub fn current_tag(&self) -> Tag {
        self.tags.current_tag()
    }

    /// Returns the transcript rendering of the last request.
    #[must_use]
    pub fn last_command(&self) -> Option<&str> {
        self.last_command.as_deref()
    }

    // ---------------------------------------------------------------------
    // Error reporting
    // ---------------------------------------------------------------------

    /// Writes an error to the transcript and returns it.
    pub(crate) fn log_error(&mut self, err: Error) -> Error {
        let severity = match err {
            Error::LoginBadCredentials(_) => Severity::Notice,
            _ => Severity::Warning,
        };
        self.logger.write(&err.to_string(), severity, CATEGORY);

        if err.is_fatal() && self.state != ConnectionState::LoggedOut {
            self.state = ConnectionState::Disconnected;
        }
        err
    }

    fn logged<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|err| self.log_error(err))
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
pub(crate) mod tests {
    use std::future::Future;
    use std::time::Duration;

    use super::*;
    use crate::connection::Security;
    use crate::log::TranscriptLogger;
    use tokio_test::io::{Builder, Mock};

    impl StartTls for Mock {
        fn start_tls(self, _host: &str) -> impl Future<Output = std::result::Result<Self, ConnectionError>> + Send {
            async move { Ok(self) }
        }
    }

    pub(crate) fn config() -> Config {
        Config::builder("imap.example.com")
            .security(Security::None)
            .io_timeout(Duration::from_secs(5))
            .build()
    }

    pub(crate) async fn client(mock: Mock) -> (ImapClient<Mock>, Arc<TranscriptLogger>) {
        client_with(mock, config()).await
    }

    pub(crate) async fn client_with(mock: Mock, config: Config) -> (ImapClient<Mock>, Arc<TranscriptLogger>) {
        let logger = Arc::new(TranscriptLogger::new());
        let client = ImapClient::from_stream(mock, config, logger.clone())
            .await
            .unwrap();
        (client, logger)
    }

    #[tokio::test]
    async fn test_greeting_capabilities_are_cached() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 ID AUTH=PLAIN] Ready\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        assert_eq!(client.state(), ConnectionState::Connected);
        assert!(client.is_supported("auth=plain").await.unwrap());
        assert!(!client.is_supported("STARTTLS").await.unwrap());
        assert!(!client.is_supported("  ").await.unwrap());
    }

    #[tokio::test]
    async fn test_capability_fetched_lazily() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\nTAG1 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        assert!(client.cached_capabilities().is_none());
        assert!(client.is_supported("AUTH=PLAIN").await.unwrap());
        assert!(!client.is_supported("STARTTLS").await.unwrap());
        assert!(client.is_auth_supported("plain").await.unwrap());
        assert_eq!(client.current_tag().as_str(), "TAG1");
    }

    #[tokio::test]
    async fn test_greeting_bye() {
        let mock = Builder::new().read(b"* BYE Too many connections\r\n").build();
        let logger = Arc::new(TranscriptLogger::new());
        let err = ImapClient::from_stream(mock, config(), logger.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Bye(ref text) if text == "Too many connections"));
        assert!(logger.contains("Too many connections"));
    }

    #[tokio::test]
    async fn test_preauth_greeting() {
        let mock = Builder::new().read(b"* PREAUTH [CAPABILITY IMAP4rev1] Welcome\r\n").build();
        let (client, _) = client(mock).await;
        assert!(client.is_logged_in());
    }

    #[tokio::test]
    async fn test_starttls_invalidates_capabilities() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] Ready\r\n")
            .write(b"TAG1 STARTTLS\r\n")
            .read(b"TAG1 OK Begin TLS negotiation now\r\n")
            .write(b"TAG2 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\nTAG2 OK done\r\n")
            .build();
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .build();
        let (mut client, logger) = client_with(mock, config).await;

        assert!(client.cached_capabilities().is_none());
        assert!(!client.is_supported("LOGINDISABLED").await.unwrap());
        assert!(client.is_supported("AUTH=PLAIN").await.unwrap());
        assert!(logger.contains("TLS negotiation complete"));
    }

    #[tokio::test]
    async fn test_starttls_required_but_missing() {
        let mock = Builder::new().read(b"* OK [CAPABILITY IMAP4rev1] Ready\r\n").build();
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .build();
        let err = ImapClient::from_stream(mock, config, Arc::new(TranscriptLogger::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StartTlsUnsupported));
    }

    #[tokio::test]
    async fn test_starttls_if_available_skips() {
        let mock = Builder::new().read(b"* OK [CAPABILITY IMAP4rev1] Ready\r\n").build();
        let config = Config::builder("imap.example.com")
            .security(Security::StartTlsIfAvailable)
            .build();
        let (client, _) = client_with(mock, config).await;
        assert!(client.cached_capabilities().is_some());
    }

    #[tokio::test]
    async fn test_responses_in_wire_order() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 NOOP\r\n")
            .read(b"* 3 EXISTS\r\n* 1 RECENT\r\nTAG1 OK NOOP completed\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        let responses = client.send_request_get_response("NOOP", &[]).await.unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses.iter().next().unwrap().keyword(), "EXISTS");
        assert_eq!(responses.last().unwrap().tag.as_ref().unwrap(), "TAG1");
        assert!(logger.lines().iter().any(|l| l.severity == Severity::Time));
    }

    #[tokio::test]
    async fn test_negative_response() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 SELECT \"Nope\"\r\n")
            .read(b"TAG1 NO [NONEXISTENT] Unknown mailbox\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        let err = client
            .send_request_get_response("SELECT", &[Param::quoted("Nope")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NegativeResponse(_)));
        assert_eq!(err.alert(), Some("Unknown mailbox"));
        assert!(!err.is_fatal());
        assert!(
            logger
                .lines()
                .iter()
                .any(|l| l.severity == Severity::Warning && l.text.contains("Unknown mailbox"))
        );
    }

    #[tokio::test]
    async fn test_unknown_tag_rejected() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 NOOP\r\n")
            .read(b"TAG7 OK what\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_garbage_mid_cycle_is_drained_before_next_command() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 LIST \"\" \"*\"\r\n")
            .read(b"* LIST (\\Noselect \"/\" broken\r\n")
            .read(b"* CAPABILITY STALE\r\nTAG1 OK LIST completed\r\n")
            .write(b"TAG2 NOOP\r\n")
            .read(b"TAG2 OK NOOP completed\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        let err = client.folder_list("", "*").await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { .. }));
        assert_eq!(client.state(), ConnectionState::Connected);

        let responses = client.send_request_get_response("NOOP", &[]).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert!(responses.capability_result().is_none());
        assert_eq!(responses.terminal().unwrap().tag.as_ref().unwrap().as_str(), "TAG2");
        assert!(logger.contains("Draining unfinished cycle TAG1"));
    }

    #[tokio::test]
    async fn test_garbage_tagged_line_completes_cycle() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 NOOP\r\n")
            .read(b"TAG1 MAYBE done\r\n")
            .write(b"TAG2 NOOP\r\n")
            .read(b"TAG2 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { .. }));
        assert!(!client.tags.is_pending("TAG1"));
        client.noop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_tag_keeps_cycle_in_step() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 NOOP\r\n")
            .read(b"TAG7 OK what\r\nTAG1 OK done\r\n")
            .write(b"TAG2 NOOP\r\n")
            .read(b"TAG2 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        assert!(client.noop().await.is_err());
        client.noop().await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_mid_cycle_is_response_not_found() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 NOOP\r\n")
            .read(b"* 2 EXISTS\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::ResponseNotFound(_)));
        assert_eq!(client.state(), ConnectionState::Disconnected);

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::Connection(ConnectionError::NotConnected)));
    }

    #[tokio::test]
    async fn test_clientbug_is_logged() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 NOOP\r\n")
            .read(b"TAG1 OK [CLIENTBUG] Done, but stop doing that\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        client.noop().await.unwrap();
        assert!(
            logger
                .lines()
                .iter()
                .any(|l| l.severity == Severity::Warning && l.text.contains("TAG1 NOOP"))
        );
    }

    #[tokio::test]
    async fn test_enable_sets_utf8() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 ENABLE UTF8=ACCEPT\r\n")
            .read(b"* ENABLED UTF8=ACCEPT\r\nTAG1 OK enabled\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        assert!(client.enable(&[]).await.unwrap().is_empty());
        assert_eq!(client.enable(&["UTF8=ACCEPT"]).await.unwrap(), vec!["UTF8=ACCEPT"]);
        assert!(client.is_utf8());
        assert_eq!(client.escape_folder_name("Entwürfe"), "Entwürfe");
    }

    #[tokio::test]
    async fn test_server_id() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 ID] Ready\r\n")
            .write(b"TAG1 ID NIL\r\n")
            .read(b"* ID (\"name\" \"Dovecot\" \"version\" \"2.3\")\r\nTAG1 OK ID completed\r\n")
            .build();
        let (mut client, _) = client(mock).await;
        assert_eq!(client.server_id().await.unwrap(), "name=Dovecot version=2.3");
    }

    #[tokio::test]
    async fn test_server_id_unsupported() {
        let mock = Builder::new().read(b"* OK [CAPABILITY IMAP4rev1] Ready\r\n").build();
        let (mut client, _) = client(mock).await;
        assert_eq!(client.server_id().await.unwrap(), UNKNOWN_SERVER_ID);
        assert!(client.namespace().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_namespace() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 NAMESPACE] Ready\r\n")
            .write(b"TAG1 NAMESPACE\r\n")
            .read(b"* NAMESPACE ((\"\" \"/\")) NIL NIL\r\nTAG1 OK done\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let namespace = client.namespace().await.unwrap().unwrap();
        assert_eq!(namespace.personal_delimiter(), Some('/'));
    }

    #[tokio::test]
    async fn test_disable_metadata() {
        let mock = Builder::new().read(b"* OK [CAPABILITY IMAP4rev1 METADATA] Ready\r\n").build();
        let config = Config::builder("imap.example.com")
            .security(Security::None)
            .disable_metadata(true)
            .build();
        let (mut client, _) = client_with(mock, config).await;
        assert!(!client.is_supported("METADATA").await.unwrap());
    }

    #[tokio::test]
    async fn test_logout_only_when_logged_in() {
        let mock = Builder::new().read(b"* OK Ready\r\n").build();
        let (mut client, _) = client(mock).await;

        client.logout().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Connected);
        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_logout_after_preauth() {
        let mock = Builder::new()
            .read(b"* PREAUTH Ready\r\n")
            .write(b"TAG1 LOGOUT\r\n")
            .read(b"* BYE Logging out\r\nTAG1 OK LOGOUT completed\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        client.logout().await.unwrap();
        assert_eq!(client.state(), ConnectionState::LoggedOut);
        assert!(!client.is_logged_in());
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let mock = Builder::new().read(b"* OK Ready\r\n").build();
        let (mut client, _) = client(mock).await;

        let err = client.send_request("  ", &[], false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(ImapClient::<Mock>::escape_string(None).unwrap(), "NIL");
        assert_eq!(
            ImapClient::<Mock>::escape_string(Some("a \"b\"")).unwrap(),
            "\"a \\\"b\\\"\""
        );
        assert!(ImapClient::<Mock>::escape_string(Some("a\r\nb")).is_err());
    }

    #[tokio::test]
    async fn test_folder_name_round_trip() {
        let mock = Builder::new().read(b"* OK Ready\r\n").build();
        let (client, _) = client(mock).await;

        assert_eq!(client.escape_folder_name("Entwürfe"), "Entw&APw-rfe");
        assert_eq!(client.to_utf8("Entw&APw-rfe"), "Entwürfe");
        assert_eq!(client.to_utf8("broken&"), "broken&");
    }
}
