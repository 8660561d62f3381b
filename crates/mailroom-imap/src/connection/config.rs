//! Connection configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-read / per-write timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext and require a STARTTLS upgrade (port 143).
    #[serde(alias = "starttls")]
    StartTls,
    /// Upgrade with STARTTLS when the server offers it (port 143).
    #[serde(alias = "starttls-if-available")]
    StartTlsIfAvailable,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    #[serde(alias = "ssl", alias = "tls")]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls | Self::StartTlsIfAvailable => 143,
            Self::Implicit => 993,
        }
    }

    /// Returns true if a STARTTLS upgrade should be attempted.
    #[must_use]
    pub const fn wants_starttls(self) -> bool {
        matches!(self, Self::StartTls | Self::StartTlsIfAvailable)
    }

    /// Returns true if the connection must fail without STARTTLS.
    #[must_use]
    pub const fn requires_starttls(self) -> bool {
        matches!(self, Self::StartTls)
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ConfigBuilder")]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout of each individual read or write.
    pub io_timeout: Duration,
    /// Hide the `METADATA` capability from callers.
    pub disable_metadata: bool,
    /// Send `SELECT` where `EXAMINE` was requested.
    pub force_select_on_examine: bool,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
///
/// Also the deserialization shape of [`Config`]: every field but `host`
/// is optional, timeouts are given in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigBuilder {
    host: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    security: Security,
    #[serde(default = "default_connect_timeout", with = "seconds")]
    connect_timeout: Duration,
    #[serde(default = "default_io_timeout", with = "seconds")]
    io_timeout: Duration,
    #[serde(default)]
    disable_metadata: bool,
    #[serde(default)]
    force_select_on_examine: bool,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            disable_metadata: false,
            force_select_on_examine: false,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Hides the `METADATA` capability.
    #[must_use]
    pub const fn disable_metadata(mut self, disable: bool) -> Self {
        self.disable_metadata = disable;
        self
    }

    /// Sends `SELECT` for read-only opens.
    #[must_use]
    pub const fn force_select_on_examine(mut self, force: bool) -> Self {
        self.force_select_on_examine = force;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            disable_metadata: self.disable_metadata,
            force_select_on_examine: self.force_select_on_examine,
        }
    }
}

impl From<ConfigBuilder> for Config {
    fn from(builder: ConfigBuilder) -> Self {
        builder.build()
    }
}

const fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

const fn default_io_timeout() -> Duration {
    DEFAULT_IO_TIMEOUT
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
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
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::StartTlsIfAvailable.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_starttls_modes() {
        assert!(Security::StartTls.wants_starttls());
        assert!(Security::StartTls.requires_starttls());
        assert!(Security::StartTlsIfAvailable.wants_starttls());
        assert!(!Security::StartTlsIfAvailable.requires_starttls());
        assert!(!Security::Implicit.wants_starttls());
        assert!(!Security::None.wants_starttls());
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.io_timeout, DEFAULT_IO_TIMEOUT);
        assert!(!config.disable_metadata);
    }

    #[test]
    fn test_builder_port_follows_security() {
        let config = Config::builder("mail.example.com")
            .security(Security::StartTls)
            .build();
        assert_eq!(config.port, 143);

        let config = Config::builder("mail.example.com")
            .security(Security::None)
            .port(1143)
            .io_timeout(Duration::from_secs(5))
            .force_select_on_examine(true)
            .build();
        assert_eq!(config.port, 1143);
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        assert!(config.force_select_on_examine);
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: Config = serde_json::from_str(r#"{"host": "imap.example.com"}"#).unwrap();
        assert_eq!(config, Config::new("imap.example.com"));
    }

    #[test]
    fn test_deserialize_full() {
        let config: Config = serde_json::from_str(
            r#"{
                "host": "imap.example.com",
                "security": "starttls",
                "connect_timeout": 10,
                "io_timeout": 20,
                "disable_metadata": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, 143);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.io_timeout, Duration::from_secs(20));
        assert!(config.disable_metadata);
    }

    #[test]
    fn test_deserialize_security_aliases() {
        let security: Security = serde_json::from_str(r#""ssl""#).unwrap();
        assert_eq!(security, Security::Implicit);
        let security: Security = serde_json::from_str(r#""start-tls-if-available""#).unwrap();
        assert_eq!(security, Security::StartTlsIfAvailable);
        let security: Security = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(security, Security::None);
    }
}
