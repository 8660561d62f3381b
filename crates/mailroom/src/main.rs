//! `mailroom` - diagnostic IMAP client
//!
//! Connects to a server, logs in and reports what the server offers.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailroom_imap::{
    Config, Credentials, Error, ImapClient, ImapStream, Logger, Security, TracingLogger,
    TranscriptLogger,
};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "mailroom", version, about = "Check an IMAP account from the command line")]
struct Args {
    /// Server hostname.
    #[arg(long)]
    host: String,

    /// Server port (defaults to 993 for TLS, 143 otherwise).
    #[arg(long)]
    port: Option<u16>,

    /// Transport security.
    #[arg(long, value_enum, default_value_t = SecurityArg::Tls)]
    security: SecurityArg,

    /// Login name.
    #[arg(long)]
    user: String,

    /// Password or OAuth access token.
    #[arg(long, env = "MAILROOM_PASSWORD", hide_env_values = true)]
    password: String,

    /// SASL mechanism to try, in order of preference. Repeatable.
    #[arg(long = "mechanism", value_name = "NAME")]
    mechanisms: Vec<String>,

    /// Per-read timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// List all folders.
    #[arg(long)]
    folders: bool,

    /// Show the INBOX quota.
    #[arg(long)]
    quota: bool,

    /// Print the redacted protocol transcript when done.
    #[arg(long)]
    transcript: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SecurityArg {
    /// Plaintext.
    None,
    /// Plaintext upgraded with STARTTLS, which must be offered.
    Starttls,
    /// STARTTLS when offered, plaintext otherwise.
    StarttlsIfAvailable,
    /// TLS from the first byte.
    Tls,
}

impl From<SecurityArg> for Security {
    fn from(arg: SecurityArg) -> Self {
        match arg {
            SecurityArg::None => Self::None,
            SecurityArg::Starttls => Self::StartTls,
            SecurityArg::StarttlsIfAvailable => Self::StartTlsIfAvailable,
            SecurityArg::Tls => Self::Implicit,
        }
    }
}

impl Args {
    fn config(&self) -> Config {
        let mut builder = Config::builder(&self.host)
            .security(self.security.into())
            .io_timeout(Duration::from_secs(self.timeout));
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        builder.build()
    }

    fn credentials(&self) -> Credentials {
        Credentials::new(&self.user, &self.password).with_mechanisms(self.mechanisms.iter().cloned())
    }
}

/// Labels an engine error for the user.
const fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::LoginBadCredentials(_) | Error::Login(_) | Error::Sasl(_) => "authentication error",
        _ => "connection error",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailroom=info,mailroom_imap=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let transcript = Arc::new(TranscriptLogger::new());
    let logger: Arc<dyn Logger> = if args.transcript {
        transcript.clone()
    } else {
        Arc::new(TracingLogger::new())
    };

    info!(host = %args.host, "Starting mailroom");
    let result = run(&args, logger).await;

    if args.transcript {
        for line in transcript.lines() {
            println!("[{}] {}: {}", line.severity, line.category, line.text);
        }
    }

    result.map_err(|err| anyhow::anyhow!("{}: {err}", error_kind(&err)))
}

async fn run(args: &Args, logger: Arc<dyn Logger>) -> mailroom_imap::Result<()> {
    let mut client: ImapClient<ImapStream> = ImapClient::connect(args.config(), logger).await?;

    let outcome = session(&mut client, args).await;
    client.disconnect().await;
    outcome
}

async fn session(client: &mut ImapClient<ImapStream>, args: &Args) -> mailroom_imap::Result<()> {
    client.login(&args.credentials()).await?;
    println!("Logged in as {}", client.logged_in_user().unwrap_or(&args.user));

    println!("Server ID: {}", client.server_id().await?);

    let capabilities = client.capability().await?;
    let mut names: Vec<&str> = capabilities.iter().collect();
    names.sort_unstable();
    println!("Capabilities: {}", names.join(" "));

    if let Some(namespace) = client.namespace().await? {
        for entry in &namespace.personal {
            let delimiter = entry.delimiter.map_or_else(|| "NIL".to_string(), String::from);
            println!("Personal namespace: \"{}\" {delimiter}", entry.prefix);
        }
    }

    if args.folders {
        for folder in client.folder_list("", "*").await? {
            let attributes: Vec<String> = folder.attributes.iter().map(|a| format!("{a:?}")).collect();
            println!("{} ({})", folder.name, attributes.join(" "));
        }
    }

    if args.quota {
        match client.quota_root("INBOX").await? {
            Some(root) => {
                for quota in &root.quotas {
                    for resource in &quota.resources {
                        println!(
                            "Quota \"{}\" {}: {} / {}",
                            quota.root, resource.name, resource.usage, resource.limit
                        );
                    }
                }
            }
            None => println!("Quota: not supported"),
        }
    }

    client.logout().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailroom_imap::ResponseCollection;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "mailroom",
            "--host",
            "imap.example.com",
            "--security",
            "starttls-if-available",
            "--user",
            "alice",
            "--password",
            "pw",
            "--mechanism",
            "SCRAM-SHA-256",
            "--mechanism",
            "PLAIN",
            "--folders",
        ])
        .unwrap();

        assert_eq!(args.security, SecurityArg::StarttlsIfAvailable);
        assert_eq!(args.mechanisms, vec!["SCRAM-SHA-256", "PLAIN"]);
        assert!(args.folders);
        assert!(!args.quota);

        let config = args.config();
        assert_eq!(config.security, Security::StartTlsIfAvailable);
        assert_eq!(config.port, 143);
        assert_eq!(args.credentials().sasl_mechanisms.len(), 2);
    }

    #[test]
    fn test_explicit_port() {
        let args = Args::try_parse_from([
            "mailroom", "--host", "h", "--port", "1993", "--user", "u", "--password", "p",
        ])
        .unwrap();
        let config = args.config();
        assert_eq!(config.port, 1993);
        assert_eq!(config.security, Security::Implicit);
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            error_kind(&Error::LoginBadCredentials(ResponseCollection::new())),
            "authentication error"
        );
        assert_eq!(error_kind(&Error::Login("no continuation".into())), "authentication error");
        assert_eq!(error_kind(&Error::Bye("shutting down".into())), "connection error");
        assert_eq!(error_kind(&Error::StartTlsUnsupported), "connection error");
    }
}
