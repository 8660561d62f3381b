//! Authentication: `LOGIN` and SASL `AUTHENTICATE` exchanges.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
#[cfg(test)]
use mailroom_sasl::Scram;
use mailroom_sasl::{Mechanism, MechanismKind, detect_type, parse_oauth_error, parse_preferences};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{ConnectionState, Credentials, ImapClient};
use crate::command::Param;
use crate::connection::StartTls;
use crate::error::{Error, Result};
use crate::log::{CATEGORY, Severity};
use crate::response::ResponseCollection;
use crate::types::{Capabilities, Tag};

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + StartTls,
{
    /// Authenticates with the server.
    ///
    /// The mechanism is the first entry of the credentials' preference list
    /// the server advertises; without any overlap the `LOGIN` command is used
    /// unless the server sent `LOGINDISABLED`. A `NO` from the server becomes
    /// [`Error::LoginBadCredentials`].
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        let result = self.login_inner(credentials).await;
        let result = match result {
            Err(Error::NegativeResponse(responses)) => Err(Error::LoginBadCredentials(responses)),
            other => other,
        };
        self.logged(result)
    }

    async fn login_inner(&mut self, credentials: &Credentials) -> Result<()> {
        let preferences = parse_preferences(&credentials.sasl_mechanisms)?;
        let (login, password, impersonate) = credentials.effective();
        let login = normalize_login(login);
        if login.is_empty() || password.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "login and password must not be empty".into(),
            ));
        }
        self.logger.add_secret(password);

        let capabilities = self.capability_inner().await?;
        let kind = match detect_type(|m| capabilities.supports_auth(m), &preferences) {
            Ok(kind) => kind,
            Err(mailroom_sasl::Error::NoSupportedMechanism)
                if !capabilities.contains("LOGINDISABLED") =>
            {
                MechanismKind::Login
            }
            Err(err) => return Err(err.into()),
        };

        self.logger.write(
            &format!("Authenticating as {login} using {kind}"),
            Severity::Info,
            CATEGORY,
        );

        let responses = self
            .authenticate(kind, &login, password, &capabilities)
            .await?;

        match responses.capability_result() {
            Some(tokens) => {
                self.set_capabilities(tokens);
            }
            None => self.capabilities = None,
        }

        if let Some(user) = impersonate {
            self.execute("PROXYAUTH", &[Param::quoted(user)]).await?;
        }

        let capabilities = self.capability_inner().await?;
        if capabilities.contains("UTF8=ACCEPT") || capabilities.contains("UTF8=ONLY") {
            self.utf8 = true;
            self.execute("ENABLE", &[Param::atom("UTF8=ACCEPT")]).await?;
        }

        self.logged_in_user = Some(impersonate.map_or(login, str::to_string));
        self.state = ConnectionState::Authenticated;
        Ok(())
    }

    async fn authenticate(
        &mut self,
        kind: MechanismKind,
        login: &str,
        password: &str,
        capabilities: &Capabilities,
    ) -> Result<ResponseCollection> {
        let mut mechanism = self.new_mechanism(kind);

        match kind {
            MechanismKind::Login if !capabilities.contains("LOGINDISABLED") => {
                self.execute(
                    "LOGIN",
                    &[Param::quoted(login), Param::secret(Param::quoted(password))],
                )
                .await
            }
            MechanismKind::Login => {
                let tag = self.start_authenticate(kind).await?;
                let user = mechanism.authenticate(login, password, None);
                self.send_sasl(&user, false).await?;
                self.read_challenge(kind, &tag).await?;
                let pass = mechanism.challenge(&[])?.unwrap_or_default();
                self.send_sasl(&pass, true).await?;
                self.receive(&tag).await
            }
            MechanismKind::Plain | MechanismKind::OAuthBearer => {
                let initial = mechanism.authenticate(login, password, None);
                if capabilities.contains("SASL-IR") {
                    let tag = self.send_initial_response(kind, &initial).await?;
                    self.finish_oauth(kind, &tag).await
                } else {
                    let tag = self.start_authenticate(kind).await?;
                    self.send_sasl(&initial, true).await?;
                    self.finish_oauth(kind, &tag).await
                }
            }
            MechanismKind::XOAuth2 => {
                let initial = mechanism.authenticate(login, password, None);
                let tag = self.send_initial_response(kind, &initial).await?;
                self.finish_oauth(kind, &tag).await
            }
            MechanismKind::CramMd5 => {
                let (tag, _) = self
                    .send("AUTHENTICATE", &[Param::atom(kind.name())], false)
                    .await?;
                let challenge = self.read_challenge(kind, &tag).await?;
                mechanism.authenticate(login, password, None);
                let answer = mechanism.challenge(&challenge)?.unwrap_or_default();
                self.send_sasl(&answer, true).await?;
                self.receive(&tag).await
            }
            MechanismKind::Scram(_) => {
                let tag = self.start_authenticate(kind).await?;
                let client_first = mechanism.authenticate(login, password, None);
                self.send_sasl(&client_first, false).await?;
                let server_first = self.read_challenge(kind, &tag).await?;
                let client_final = mechanism.challenge(&server_first)?.unwrap_or_default();
                self.send_sasl(&client_final, true).await?;

                let responses = self.receive(&tag).await?;
                let server_final = match responses.continuation_value() {
                    Some(value) => decode_challenge(value)?,
                    None => decode_challenge(responses.text()).unwrap_or_default(),
                };
                if !mechanism.verify(&server_final) {
                    if responses.continuation_value().is_some() {
                        self.transport.write_raw(b"*\r\n", Some("*")).await?;
                        self.read_cycle(&tag).await?;
                    }
                    return Err(mailroom_sasl::Error::ServerSignatureMismatch.into());
                }

                if responses.continuation_value().is_some() {
                    self.send_sasl(&[], false).await?;
                    self.receive(&tag).await
                } else {
                    Ok(responses)
                }
            }
        }
    }

    #[cfg_attr(not(test), allow(clippy::unused_self))]
    fn new_mechanism(&self, kind: MechanismKind) -> Mechanism {
        #[cfg(test)]
        if let (MechanismKind::Scram(hash), Some(nonce)) = (kind, &self.scram_nonce) {
            return Mechanism::Scram(Scram::with_nonce(hash, nonce.clone()));
        }
        Mechanism::new(kind)
    }

    /// Reads a server challenge, logging it for mechanisms whose challenges
    /// carry no secret.
    async fn read_challenge(&mut self, kind: MechanismKind, tag: &Tag) -> Result<Vec<u8>> {
        let challenge = self.expect_continuation(tag).await?;
        if kind.is_challenge_response() {
            self.logger.write(
                &format!("{kind} challenge: {}", String::from_utf8_lossy(&challenge)),
                Severity::Debug,
                CATEGORY,
            );
        }
        Ok(challenge)
    }

    /// Sends `AUTHENTICATE <mech>` and waits for the first continuation.
    async fn start_authenticate(&mut self, kind: MechanismKind) -> Result<Tag> {
        let (tag, _) = self
            .send("AUTHENTICATE", &[Param::atom(kind.name())], false)
            .await?;
        self.expect_continuation(&tag).await?;
        Ok(tag)
    }

    /// Sends `AUTHENTICATE <mech> <initial response>` (SASL-IR).
    async fn send_initial_response(&mut self, kind: MechanismKind, initial: &[u8]) -> Result<Tag> {
        let encoded = STANDARD.encode(initial);
        let (tag, _) = self
            .send(
                "AUTHENTICATE",
                &[Param::atom(kind.name()), Param::secret(Param::atom(encoded))],
                false,
            )
            .await?;
        Ok(tag)
    }

    /// Reads the outcome of a single-message mechanism.
    ///
    /// OAuth servers report failures as a continuation carrying a JSON
    /// error; it is logged and acknowledged so the server can send its `NO`.
    async fn finish_oauth(&mut self, kind: MechanismKind, tag: &Tag) -> Result<ResponseCollection> {
        let responses = self.receive(tag).await?;
        let Some(value) = responses.continuation_value() else {
            return Ok(responses);
        };

        if let Ok(payload) = decode_challenge(value) {
            let message = match parse_oauth_error(&payload) {
                Ok(err) => format!(
                    "{kind} error: status={} schemes={} scope={}",
                    err.status,
                    err.schemes.as_deref().unwrap_or("-"),
                    err.scope.as_deref().unwrap_or("-"),
                ),
                Err(_) => format!("{kind} error: {}", String::from_utf8_lossy(&payload)),
            };
            self.logger.write(&message, Severity::Warning, CATEGORY);
        }

        let ack: &[u8] = if kind == MechanismKind::OAuthBearer { b"\x01" } else { b"" };
        self.send_sasl(ack, false).await?;
        self.receive(tag).await
    }

    /// Reads until the next continuation and returns its decoded payload.
    async fn expect_continuation(&mut self, tag: &Tag) -> Result<Vec<u8>> {
        let responses = self.receive(tag).await?;
        match responses.continuation_value() {
            Some(value) => decode_challenge(value),
            None => Err(Error::Login(format!(
                "server completed {tag} before the exchange finished"
            ))),
        }
    }
}

fn decode_challenge(value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .map_err(|err| Error::Login(format!("invalid base64 challenge: {err}")))
}

/// Trims a login and converts an internationalized domain to ASCII.
fn normalize_login(login: &str) -> String {
    let login = login.trim();
    match login.rsplit_once('@') {
        Some((local, domain)) if !domain.is_ascii() => match url::Host::parse(domain) {
            Ok(url::Host::Domain(ascii)) => format!("{local}@{ascii}"),
            _ => login.to_string(),
        },
        _ => login.to_string(),
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
    use std::sync::Arc;

    use super::super::tests::client;
    use super::*;
    use crate::TranscriptLogger;
    use tokio_test::io::{Builder, Mock};

    #[test]
    fn test_normalize_login() {
        assert_eq!(normalize_login("  user@example.com "), "user@example.com");
        assert_eq!(normalize_login("user@bücher.example"), "user@xn--bcher-kva.example");
        assert_eq!(normalize_login("plainuser"), "plainuser");
    }

    #[tokio::test]
    async fn test_login_command_redacts_password() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN AUTH=LOGIN] Ready\r\n")
            .write(b"TAG1 LOGIN \"user\" \"secret\"\r\n")
            .read(b"TAG1 OK [CAPABILITY IMAP4rev1 NAMESPACE] Logged in\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        client.login(&Credentials::new("user", "secret")).await.unwrap();
        assert!(client.is_logged_in());
        assert_eq!(client.logged_in_user(), Some("user"));
        assert!(client.is_supported("NAMESPACE").await.unwrap());
        assert!(!logger.contains("secret"));
        assert!(logger.contains("TAG1 LOGIN \"user\" \"********\""));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mock = Builder::new()
            .read(b"* OK Ready\r\n")
            .write(b"TAG1 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN AUTH=LOGIN\r\nTAG1 OK done\r\n")
            .write(b"TAG2 LOGIN \"user\" \"wrong\"\r\n")
            .read(b"TAG2 NO Authentication failed\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        let err = client.login(&Credentials::new("user", "wrong")).await.unwrap_err();
        assert!(matches!(err, Error::LoginBadCredentials(_)));
        assert_eq!(err.alert(), Some("Authentication failed"));
        assert!(!client.is_logged_in());
        assert!(
            logger
                .lines()
                .iter()
                .any(|l| l.severity == Severity::Notice && l.text.contains("Authentication failed"))
        );
        assert!(!logger.contains("wrong"));
    }

    #[tokio::test]
    async fn test_empty_password_rejected_before_io() {
        let mock = Builder::new().read(b"* OK Ready\r\n").build();
        let (mut client, _) = client(mock).await;

        let err = client.login(&Credentials::new("user", "  ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = client.login(&Credentials::new(" ", "pw")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_unknown_mechanism_rejected_before_io() {
        let mock = Builder::new().read(b"* OK Ready\r\n").build();
        let (mut client, _) = client(mock).await;

        let credentials = Credentials::new("user", "pw").with_mechanisms(["SCRAM-SHA-256-PLUS"]);
        let err = client.login(&credentials).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Sasl(mailroom_sasl::Error::UnsupportedMechanism(_))
        ));
    }

    #[tokio::test]
    async fn test_no_mechanism_with_login_disabled() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 LOGINDISABLED AUTH=GSSAPI] Ready\r\n")
            .build();
        let (mut client, _) = client(mock).await;

        let err = client.login(&Credentials::new("user", "pw")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Sasl(mailroom_sasl::Error::NoSupportedMechanism)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_login_when_login_disabled() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 LOGINDISABLED AUTH=LOGIN] Ready\r\n")
            .write(b"TAG1 AUTHENTICATE LOGIN\r\n")
            .read(b"+ VXNlcm5hbWU6\r\n")
            .write(b"dXNlcg==\r\n")
            .read(b"+ UGFzc3dvcmQ6\r\n")
            .write(b"c2VjcmV0\r\n")
            .read(b"TAG1 OK [CAPABILITY IMAP4rev1] Authenticated\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        client.login(&Credentials::new("user", "secret")).await.unwrap();
        assert!(client.is_logged_in());
        assert!(!logger.contains("c2VjcmV0"));
        assert!(!logger.contains("challenge:"));
    }

    #[tokio::test]
    async fn test_plain_with_sasl_ir() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] Ready\r\n")
            .write(b"TAG1 AUTHENTICATE PLAIN AHVzZXIAc2VjcmV0\r\n")
            .read(b"TAG1 OK [CAPABILITY IMAP4rev1] Authenticated\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        client
            .login(&Credentials::new("user", "secret").with_mechanisms(["PLAIN"]))
            .await
            .unwrap();
        assert!(client.is_logged_in());
        assert!(!logger.contains("AHVzZXIAc2VjcmV0"));
    }

    #[tokio::test]
    async fn test_plain_without_sasl_ir() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] Ready\r\n")
            .write(b"TAG1 AUTHENTICATE PLAIN\r\n")
            .read(b"+ \r\n")
            .write(b"AHVzZXIAc2VjcmV0\r\n")
            .read(b"TAG1 OK [CAPABILITY IMAP4rev1] Authenticated\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        client
            .login(&Credentials::new("user", "secret").with_mechanisms(["PLAIN"]))
            .await
            .unwrap();
        assert!(client.is_logged_in());
        assert!(!logger.contains("AHVzZXIAc2VjcmV0"));
    }

    #[tokio::test]
    async fn test_cram_md5() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=CRAM-MD5] Ready\r\n")
            .write(b"TAG1 AUTHENTICATE CRAM-MD5\r\n")
            .read(b"+ PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+\r\n")
            .write(b"dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw\r\n")
            .read(b"TAG1 OK [CAPABILITY IMAP4rev1] Authenticated\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        let credentials = Credentials::new("tim", "tanstaaftanstaaf").with_mechanisms(["CRAM-MD5"]);
        client.login(&credentials).await.unwrap();
        assert!(client.is_logged_in());
        assert!(logger.contains("challenge: <1896.697170952@postoffice.reston.mci.net>"));
    }

    const SCRAM_CLIENT_FIRST: &[u8] = b"biwsbj11c2VyLHI9ck9wck5HZndFYmVSV2diTkVrcU8=\r\n";
    const SCRAM_SERVER_FIRST: &[u8] = b"+ cj1yT3ByTkdmd0ViZVJXZ2JORWtxTyVodllEcFdVYTJSYVRDQWZ1eEZJbGopaE5sRiRrMCxzPVcyMlphSjBTTlk3c29Fc1VFamI2Z1E9PSxpPTQwOTY=\r\n";
    const SCRAM_CLIENT_FINAL: &str = "Yz1iaXdzLHI9ck9wck5HZndFYmVSV2diTkVrcU8laHZZRHBXVWEyUmFUQ0FmdXhGSWxqKWhObEYkazAscD1kSHpiWmFwV0lrNGpVaE4rVXRlOXl0YWc5empmTUhnc3FtbWl6N0FuZFZRPQ==";

    async fn scram_client(mock: Mock) -> (ImapClient<Mock>, Arc<TranscriptLogger>) {
        let (mut client, logger) = client(mock).await;
        client.scram_nonce = Some("rOprNGfwEbeRWgbNEkqO".to_string());
        (client, logger)
    }

    #[tokio::test]
    async fn test_scram_sha256() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=SCRAM-SHA-256] Ready\r\n")
            .write(b"TAG1 AUTHENTICATE SCRAM-SHA-256\r\n")
            .read(b"+ \r\n")
            .write(SCRAM_CLIENT_FIRST)
            .read(SCRAM_SERVER_FIRST)
            .write(format!("{SCRAM_CLIENT_FINAL}\r\n").as_bytes())
            .read(b"+ dj02cnJpVFJCaTIzV3BSUi93dHVwK21NaFVaVW4vZEI1bkxUSlJzamw5NUc0PQ==\r\n")
            .write(b"\r\n")
            .read(b"TAG1 OK [CAPABILITY IMAP4rev1] Authenticated\r\n")
            .build();
        let (mut client, logger) = scram_client(mock).await;

        let credentials = Credentials::new("user", "pencil").with_mechanisms(["SCRAM-SHA-256"]);
        client.login(&credentials).await.unwrap();
        assert!(client.is_logged_in());
        assert_eq!(client.logged_in_user(), Some("user"));
        assert!(logger.contains("SCRAM-SHA-256 challenge: r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0"));
        assert!(!logger.contains(SCRAM_CLIENT_FINAL));
        assert!(!logger.contains("pencil"));
    }

    #[tokio::test]
    async fn test_scram_server_signature_mismatch_cancels_exchange() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=SCRAM-SHA-256] Ready\r\n")
            .write(b"TAG1 AUTHENTICATE SCRAM-SHA-256\r\n")
            .read(b"+ \r\n")
            .write(SCRAM_CLIENT_FIRST)
            .read(SCRAM_SERVER_FIRST)
            .write(format!("{SCRAM_CLIENT_FINAL}\r\n").as_bytes())
            .read(b"+ dj1BQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBPQ==\r\n")
            .write(b"*\r\n")
            .read(b"TAG1 BAD Authentication cancelled\r\n")
            .write(b"TAG2 NOOP\r\n")
            .read(b"TAG2 OK done\r\n")
            .build();
        let (mut client, _) = scram_client(mock).await;

        let credentials = Credentials::new("user", "pencil").with_mechanisms(["SCRAM-SHA-256"]);
        let err = client.login(&credentials).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Sasl(mailroom_sasl::Error::ServerSignatureMismatch)
        ));
        assert!(!client.is_logged_in());
        assert!(!client.tags.is_pending("TAG1"));
        client.noop().await.unwrap();
    }

    #[tokio::test]
    async fn test_xoauth2_error_continuation() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=XOAUTH2] Ready\r\n")
            .write(b"TAG1 AUTHENTICATE XOAUTH2 dXNlcj11c2VyQGV4YW1wbGUuY29tAWF1dGg9QmVhcmVyIHRva2VuAQE=\r\n")
            .read(b"+ eyJzdGF0dXMiOiI0MDEiLCJzY2hlbWVzIjoiYmVhcmVyIiwic2NvcGUiOiJodHRwczovL21haWwuZ29vZ2xlLmNvbS8ifQ==\r\n")
            .write(b"\r\n")
            .read(b"TAG1 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        let credentials = Credentials::new("user@example.com", "token").with_mechanisms(["XOAUTH2"]);
        let err = client.login(&credentials).await.unwrap_err();
        assert!(matches!(err, Error::LoginBadCredentials(_)));
        assert!(
            logger
                .lines()
                .iter()
                .any(|l| l.severity == Severity::Warning && l.text.contains("status=401"))
        );
        assert!(!logger.contains("dXNlcj11c2VyQGV4YW1wbGUuY29tAWF1dGg9QmVhcmVyIHRva2VuAQE="));
    }

    #[tokio::test]
    async fn test_proxy_auth_and_utf8() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=LOGIN] Ready\r\n")
            .write(b"TAG1 LOGIN \"admin\" \"master\"\r\n")
            .read(b"TAG1 OK [CAPABILITY IMAP4rev1 UTF8=ACCEPT ENABLE] Logged in\r\n")
            .write(b"TAG2 PROXYAUTH \"user@example.com\"\r\n")
            .read(b"TAG2 OK Proxied\r\n")
            .write(b"TAG3 ENABLE UTF8=ACCEPT\r\n")
            .read(b"* ENABLED UTF8=ACCEPT\r\nTAG3 OK enabled\r\n")
            .build();
        let (mut client, logger) = client(mock).await;

        let credentials = Credentials::new("user@example.com", "unused").with_proxy_auth("admin", "master");
        client.login(&credentials).await.unwrap();
        assert_eq!(client.logged_in_user(), Some("user@example.com"));
        assert!(client.is_utf8());
        assert!(!logger.contains("master"));
    }
}
