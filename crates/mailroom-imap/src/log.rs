//! Protocol transcript logging with secret redaction.
//!
//! The client never writes credentials to a log sink directly. Every
//! secret-bearing value is registered with [`Logger::add_secret`] before it
//! hits the wire, and loggers replace registered values with
//! [`PLACEHOLDER`] in every line they emit.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Text substituted for registered secrets.
pub const PLACEHOLDER: &str = "*******";

/// Category attached to every line the IMAP client writes.
pub const CATEGORY: &str = "IMAP";

/// Severity of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Round-trip timings.
    Time,
    /// Wire traffic.
    Debug,
    /// Lifecycle events.
    Info,
    /// Expected failures such as rejected credentials.
    Notice,
    /// Unexpected but recoverable conditions.
    Warning,
    /// Failures.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Time => "TIME",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Sink for the protocol transcript.
pub trait Logger: Send + Sync {
    /// Writes one line. Implementations must redact registered secrets.
    fn write(&self, line: &str, severity: Severity, category: &str);

    /// Registers a value that must never appear verbatim in output.
    fn add_secret(&self, secret: &str);
}

/// Registered secrets and the substitution over them.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    /// Creates an empty redactor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            secrets: Vec::new(),
        }
    }

    /// Registers a secret. Empty strings are ignored.
    pub fn add(&mut self, secret: &str) {
        if secret.is_empty() || self.secrets.iter().any(|s| s == secret) {
            return;
        }
        self.secrets.push(secret.to_string());
        // Longest first, so a secret containing another is replaced whole.
        self.secrets.sort_by(|a, b| b.len().cmp(&a.len()));
    }

    /// Returns the number of registered secrets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Replaces every occurrence of a registered secret with [`PLACEHOLDER`].
    #[must_use]
    pub fn redact<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if !self.secrets.iter().any(|s| line.contains(s.as_str())) {
            return Cow::Borrowed(line);
        }

        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        while !rest.is_empty() {
            if let Some(secret) = self.secrets.iter().find(|s| rest.starts_with(s.as_str())) {
                out.push_str(PLACEHOLDER);
                rest = &rest[secret.len()..];
            } else {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    out.push(c);
                }
                rest = chars.as_str();
            }
        }
        Cow::Owned(out)
    }
}

/// Logger that forwards redacted lines to `tracing`.
#[derive(Debug, Default)]
pub struct TracingLogger {
    redactor: Mutex<Redactor>,
}

impl TracingLogger {
    /// Creates a logger with no registered secrets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Logger for TracingLogger {
    fn write(&self, line: &str, severity: Severity, category: &str) {
        let redactor = self.redactor.lock().unwrap_or_else(PoisonError::into_inner);
        let line = redactor.redact(line);
        match severity {
            Severity::Time => tracing::trace!(category, "{line}"),
            Severity::Debug => tracing::debug!(category, "{line}"),
            Severity::Info | Severity::Notice => tracing::info!(category, %severity, "{line}"),
            Severity::Warning => tracing::warn!(category, "{line}"),
            Severity::Error => tracing::error!(category, "{line}"),
        }
    }

    fn add_secret(&self, secret: &str) {
        self.redactor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(secret);
    }
}

/// One redacted transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    /// Severity the line was written with.
    pub severity: Severity,
    /// Category the line was written with.
    pub category: String,
    /// Redacted text.
    pub text: String,
}

/// Logger that keeps the redacted transcript in memory.
///
/// Useful for diagnostics output and for asserting on protocol exchanges.
#[derive(Debug, Default)]
pub struct TranscriptLogger {
    redactor: Mutex<Redactor>,
    lines: Mutex<Vec<TranscriptLine>>,
}

impl TranscriptLogger {
    /// Creates an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the transcript.
    #[must_use]
    pub fn lines(&self) -> Vec<TranscriptLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|line| line.text.contains(needle))
    }
}

impl Logger for TranscriptLogger {
    fn write(&self, line: &str, severity: Severity, category: &str) {
        let text = self
            .redactor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .redact(line)
            .into_owned();
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TranscriptLine {
                severity,
                category: category.to_string(),
                text,
            });
    }

    fn add_secret(&self, secret: &str) {
        self.redactor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(secret);
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
    use proptest::prelude::*;

    #[test]
    fn test_redact_without_secrets_borrows() {
        let redactor = Redactor::new();
        assert!(matches!(redactor.redact("TAG1 NOOP"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_redact_replaces_every_occurrence() {
        let mut redactor = Redactor::new();
        redactor.add("hunter2");
        assert_eq!(
            redactor.redact("pass=hunter2 again hunter2"),
            "pass=******* again *******"
        );
    }

    #[test]
    fn test_redact_prefers_longest_secret() {
        let mut redactor = Redactor::new();
        redactor.add("abc");
        redactor.add("abcdef");
        assert_eq!(redactor.redact("xabcdefx"), "x*******x");
    }

    #[test]
    fn test_empty_secret_ignored() {
        let mut redactor = Redactor::new();
        redactor.add("");
        redactor.add("s");
        redactor.add("s");
        assert_eq!(redactor.len(), 1);
    }

    #[test]
    fn test_redact_multibyte_text() {
        let mut redactor = Redactor::new();
        redactor.add("päss");
        assert_eq!(redactor.redact("ünïcode päss ok"), "ünïcode ******* ok");
    }

    #[test]
    fn test_transcript_logger_redacts() {
        let logger = TranscriptLogger::new();
        logger.add_secret("c2VjcmV0");
        logger.write("> c2VjcmV0", Severity::Debug, CATEGORY);
        let lines = logger.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "> *******");
        assert_eq!(lines[0].category, "IMAP");
        assert!(!logger.contains("c2VjcmV0"));
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Notice.to_string(), "NOTICE");
        assert!(Severity::Warning > Severity::Info);
    }

    proptest! {
        #[test]
        fn prop_registered_secret_never_logged(
            secret in "[a-zA-Z0-9+/=]{1,24}",
            prefix in "[ -~]{0,16}",
            suffix in "[ -~]{0,16}",
        ) {
            let logger = TranscriptLogger::new();
            logger.add_secret(&secret);
            logger.write(&format!("{prefix}{secret}{suffix}"), Severity::Debug, CATEGORY);
            prop_assert!(!logger.lines()[0].text.contains(&secret));
        }
    }
}
