//! Response codes.

use crate::response::Item;

/// Bracketed response code of a status response.
///
/// These provide additional information about command completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY: the full capability list.
    Capability(Vec<String>),
    /// CLIENTBUG: the server thinks the client misbehaved (RFC 5530).
    ClientBug,
    /// PARSE: Error parsing message.
    Parse,
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags(Vec<String>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(u32),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(u32),
    /// UNSEEN: First unseen message sequence number.
    Unseen(u32),
    /// APPENDUID: UID assigned to appended message (RFC 4315).
    AppendUid {
        /// UIDVALIDITY of the mailbox.
        uid_validity: u32,
        /// UID set of the appended messages.
        uids: String,
    },
    /// COPYUID: UIDs of copied messages (RFC 4315).
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        uid_validity: u32,
        /// Source UID set.
        source: String,
        /// Destination UID set.
        destination: String,
    },
    /// HIGHESTMODSEQ: Highest mod-sequence value (CONDSTORE).
    HighestModSeq(u64),
    /// AUTHENTICATIONFAILED (RFC 5530).
    AuthenticationFailed,
    /// AUTHORIZATIONFAILED (RFC 5530).
    AuthorizationFailed,
    /// UNAVAILABLE (RFC 5530).
    Unavailable,
    /// NONEXISTENT (RFC 5530).
    NonExistent,
    /// OVERQUOTA (RFC 5530).
    OverQuota,
    /// Any other code, with its raw arguments.
    Other {
        /// Code name as sent.
        name: String,
        /// Arguments after the name.
        arguments: Vec<Item>,
    },
}

impl ResponseCode {
    /// Builds a code from its name and arguments.
    ///
    /// Known codes with unusable arguments are kept as [`ResponseCode::Other`].
    #[must_use]
    pub fn from_parts(name: &str, arguments: Vec<Item>) -> Self {
        let upper = name.to_ascii_uppercase();
        let known = match upper.as_str() {
            "ALERT" => Some(Self::Alert),
            "CAPABILITY" => Some(Self::Capability(atoms(&arguments))),
            "CLIENTBUG" => Some(Self::ClientBug),
            "PARSE" => Some(Self::Parse),
            "PERMANENTFLAGS" => arguments
                .first()
                .and_then(Item::as_list)
                .map(|flags| Self::PermanentFlags(atoms(flags))),
            "READ-ONLY" => Some(Self::ReadOnly),
            "READ-WRITE" => Some(Self::ReadWrite),
            "TRYCREATE" => Some(Self::TryCreate),
            "UIDNEXT" => number(&arguments, 0).map(Self::UidNext),
            "UIDVALIDITY" => number(&arguments, 0).map(Self::UidValidity),
            "UNSEEN" => number(&arguments, 0).map(Self::Unseen),
            "APPENDUID" => number(&arguments, 0).zip(text(&arguments, 1)).map(
                |(uid_validity, uids)| Self::AppendUid { uid_validity, uids },
            ),
            "COPYUID" => number(&arguments, 0)
                .zip(text(&arguments, 1))
                .zip(text(&arguments, 2))
                .map(|((uid_validity, source), destination)| Self::CopyUid {
                    uid_validity,
                    source,
                    destination,
                }),
            "HIGHESTMODSEQ" => arguments
                .first()
                .and_then(Item::as_number)
                .map(Self::HighestModSeq),
            "AUTHENTICATIONFAILED" => Some(Self::AuthenticationFailed),
            "AUTHORIZATIONFAILED" => Some(Self::AuthorizationFailed),
            "UNAVAILABLE" => Some(Self::Unavailable),
            "NONEXISTENT" => Some(Self::NonExistent),
            "OVERQUOTA" => Some(Self::OverQuota),
            _ => None,
        };

        known.unwrap_or_else(|| Self::Other {
            name: name.to_string(),
            arguments,
        })
    }

    /// Returns the code name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Alert => "ALERT",
            Self::Capability(_) => "CAPABILITY",
            Self::ClientBug => "CLIENTBUG",
            Self::Parse => "PARSE",
            Self::PermanentFlags(_) => "PERMANENTFLAGS",
            Self::ReadOnly => "READ-ONLY",
            Self::ReadWrite => "READ-WRITE",
            Self::TryCreate => "TRYCREATE",
            Self::UidNext(_) => "UIDNEXT",
            Self::UidValidity(_) => "UIDVALIDITY",
            Self::Unseen(_) => "UNSEEN",
            Self::AppendUid { .. } => "APPENDUID",
            Self::CopyUid { .. } => "COPYUID",
            Self::HighestModSeq(_) => "HIGHESTMODSEQ",
            Self::AuthenticationFailed => "AUTHENTICATIONFAILED",
            Self::AuthorizationFailed => "AUTHORIZATIONFAILED",
            Self::Unavailable => "UNAVAILABLE",
            Self::NonExistent => "NONEXISTENT",
            Self::OverQuota => "OVERQUOTA",
            Self::Other { name, .. } => name,
        }
    }
}

fn atoms(items: &[Item]) -> Vec<String> {
    items.iter().filter_map(Item::to_text).collect()
}

fn number(items: &[Item], index: usize) -> Option<u32> {
    items
        .get(index)
        .and_then(Item::as_number)
        .and_then(|n| u32::try_from(n).ok())
}

fn text(items: &[Item], index: usize) -> Option<String> {
    items.get(index).and_then(Item::to_text)
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

    fn atom(s: &str) -> Item {
        Item::Atom(s.to_string())
    }

    #[test]
    fn test_simple_codes() {
        assert_eq!(ResponseCode::from_parts("alert", vec![]), ResponseCode::Alert);
        assert_eq!(
            ResponseCode::from_parts("READ-ONLY", vec![]),
            ResponseCode::ReadOnly
        );
        assert_eq!(
            ResponseCode::from_parts("CLIENTBUG", vec![]),
            ResponseCode::ClientBug
        );
    }

    #[test]
    fn test_numeric_codes() {
        assert_eq!(
            ResponseCode::from_parts("UIDVALIDITY", vec![atom("3857529045")]),
            ResponseCode::UidValidity(3857529045)
        );
        assert_eq!(
            ResponseCode::from_parts("HIGHESTMODSEQ", vec![atom("715194045007")]),
            ResponseCode::HighestModSeq(715194045007)
        );
    }

    #[test]
    fn test_malformed_known_code_becomes_other() {
        let code = ResponseCode::from_parts("UIDNEXT", vec![atom("abc")]);
        assert_eq!(code.name(), "UIDNEXT");
        assert!(matches!(code, ResponseCode::Other { .. }));
    }

    #[test]
    fn test_copyuid() {
        let code = ResponseCode::from_parts(
            "COPYUID",
            vec![atom("38505"), atom("304,319:320"), atom("3956:3958")],
        );
        assert_eq!(
            code,
            ResponseCode::CopyUid {
                uid_validity: 38505,
                source: "304,319:320".into(),
                destination: "3956:3958".into(),
            }
        );
    }

    #[test]
    fn test_permanent_flags() {
        let code = ResponseCode::from_parts(
            "PERMANENTFLAGS",
            vec![Item::List(vec![atom("\\Deleted"), atom("\\*")])],
        );
        assert_eq!(
            code,
            ResponseCode::PermanentFlags(vec!["\\Deleted".into(), "\\*".into()])
        );
    }

    #[test]
    fn test_unknown_code_keeps_arguments() {
        let code = ResponseCode::from_parts("X-GM-THRID", vec![atom("1")]);
        assert_eq!(code.name(), "X-GM-THRID");
        if let ResponseCode::Other { arguments, .. } = code {
            assert_eq!(arguments, vec![atom("1")]);
        } else {
            panic!("expected Other");
        }
    }
}
