//! Mailbox types.

use crate::command::utf7;
use crate::response::{Item, Response, ResponseCollection};

use super::ResponseCode;

/// One folder from a LIST or LSUB response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Decoded name.
    pub name: String,
    /// Name as sent by the server (modified UTF-7 unless UTF8 was enabled).
    pub raw_name: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Mailbox attributes.
    pub attributes: Vec<MailboxAttribute>,
}

impl Folder {
    /// Builds a folder from `* LIST` / `* LSUB` data.
    ///
    /// Names that fail to decode as modified UTF-7 are kept verbatim.
    #[must_use]
    pub fn from_response(response: &Response, utf8: bool) -> Option<Self> {
        let [attributes, delimiter, name, ..] = response.data() else {
            return None;
        };

        let attributes = attributes
            .as_list()?
            .iter()
            .filter_map(Item::as_str)
            .map(MailboxAttribute::parse)
            .collect();
        let delimiter = delimiter.as_str().and_then(|d| d.chars().next());
        let raw_name = name.to_text()?;
        let name = if utf8 {
            raw_name.clone()
        } else {
            utf7::decode(&raw_name).unwrap_or_else(|| raw_name.clone())
        };

        Some(Self {
            name,
            raw_name,
            delimiter,
            attributes,
        })
    }

    /// Returns true unless the folder is `\Noselect` or `\NonExistent`.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| matches!(a, MailboxAttribute::NoSelect | MailboxAttribute::NonExistent))
    }

    /// Returns true if the folder carries `attribute`.
    #[must_use]
    pub fn has_attribute(&self, attribute: &MailboxAttribute) -> bool {
        self.attributes.contains(attribute)
    }
}

/// Mailbox attributes from LIST response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// Mailbox cannot be selected.
    NoSelect,
    /// Mailbox cannot have children.
    NoInferiors,
    /// Mailbox does not exist (RFC 5258).
    NonExistent,
    /// Mailbox has no children.
    HasNoChildren,
    /// Mailbox has children.
    HasChildren,
    /// Mailbox is marked for attention.
    Marked,
    /// Mailbox is not marked.
    Unmarked,
    // SPECIAL-USE mailbox attributes (RFC 6154)
    /// All messages (virtual mailbox).
    All,
    /// Mailbox is the archive folder.
    Archive,
    /// Mailbox is the drafts folder.
    Drafts,
    /// Flagged/starred messages (virtual mailbox).
    Flagged,
    /// Mailbox is the junk/spam folder.
    Junk,
    /// Mailbox is the sent folder.
    Sent,
    /// Mailbox is the trash folder.
    Trash,
    /// Important messages (RFC 8457).
    Important,
    /// Mailbox is subscribed.
    Subscribed,
    /// Unknown attribute.
    Unknown(String),
}

impl MailboxAttribute {
    /// Parses a mailbox attribute string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NOINFERIORS" => Self::NoInferiors,
            "\\NONEXISTENT" => Self::NonExistent,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\ALL" => Self::All,
            "\\ARCHIVE" => Self::Archive,
            "\\DRAFTS" => Self::Drafts,
            "\\FLAGGED" => Self::Flagged,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            "\\IMPORTANT" => Self::Important,
            "\\SUBSCRIBED" => Self::Subscribed,
            _ => Self::Unknown(s.to_string()),
        }
    }
}

/// Counters from a `STATUS` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderStatus {
    /// Number of messages.
    pub messages: Option<u32>,
    /// Number of recent messages.
    pub recent: Option<u32>,
    /// Next UID to be assigned.
    pub uid_next: Option<u32>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Number of unseen messages.
    pub unseen: Option<u32>,
    /// Highest mod-sequence (CONDSTORE).
    pub highest_mod_seq: Option<u64>,
    /// Total size in octets (RFC 8438).
    pub size: Option<u64>,
}

impl FolderStatus {
    /// Reads the attribute list of `* STATUS <name> (<attr> <n> ...)`.
    #[must_use]
    pub fn from_response(response: &Response) -> Option<Self> {
        let attributes = response.data().get(1)?.as_list()?;
        let mut status = Self::default();

        for pair in attributes.chunks_exact(2) {
            let (Some(name), Some(value)) = (pair[0].as_str(), pair[1].as_number()) else {
                continue;
            };
            let small = u32::try_from(value).ok();
            match name.to_ascii_uppercase().as_str() {
                "MESSAGES" => status.messages = small,
                "RECENT" => status.recent = small,
                "UIDNEXT" => status.uid_next = small,
                "UIDVALIDITY" => status.uid_validity = small,
                "UNSEEN" => status.unseen = small,
                "HIGHESTMODSEQ" => status.highest_mod_seq = Some(value),
                "SIZE" => status.size = Some(value),
                _ => {}
            }
        }

        Some(status)
    }
}

/// The folder opened by SELECT or EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedFolder {
    /// Folder name as given by the caller.
    pub name: String,
    /// Whether the server opened the folder read-only.
    pub read_only: bool,
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// First unseen message sequence number.
    pub unseen: Option<u32>,
    /// Next UID to be assigned.
    pub uid_next: Option<u32>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Flags defined for this mailbox.
    pub flags: Vec<String>,
    /// Flags that can be permanently stored.
    pub permanent_flags: Vec<String>,
    /// Highest mod-sequence (if CONDSTORE enabled).
    pub highest_mod_seq: Option<u64>,
}

impl SelectedFolder {
    /// Collects the folder state from a SELECT/EXAMINE cycle.
    ///
    /// `read_only` is the mode that was requested; a `[READ-ONLY]` or
    /// `[READ-WRITE]` code on the tagged response overrides it.
    #[must_use]
    pub fn from_responses(name: &str, read_only: bool, responses: &ResponseCollection) -> Self {
        let mut folder = Self {
            name: name.to_string(),
            read_only,
            ..Self::default()
        };

        for response in responses {
            if let Some(number) = response.number() {
                match response.keyword().to_ascii_uppercase().as_str() {
                    "EXISTS" => folder.exists = number,
                    "RECENT" => folder.recent = number,
                    _ => {}
                }
                continue;
            }

            if response.is_untagged_keyword("FLAGS") {
                if let Some(flags) = response.items.first().and_then(Item::as_list) {
                    folder.flags = flags.iter().filter_map(Item::to_text).collect();
                }
                continue;
            }

            match &response.code {
                Some(ResponseCode::Unseen(n)) => folder.unseen = Some(*n),
                Some(ResponseCode::UidNext(n)) => folder.uid_next = Some(*n),
                Some(ResponseCode::UidValidity(n)) => folder.uid_validity = Some(*n),
                Some(ResponseCode::HighestModSeq(n)) => folder.highest_mod_seq = Some(*n),
                Some(ResponseCode::PermanentFlags(flags)) => {
                    folder.permanent_flags.clone_from(flags);
                }
                Some(ResponseCode::ReadOnly) => folder.read_only = true,
                Some(ResponseCode::ReadWrite) => folder.read_only = false,
                _ => {}
            }
        }

        folder
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
    use crate::parser::ResponseParser;

    fn parse(line: &[u8]) -> Response {
        ResponseParser::parse(line).unwrap()
    }

    mod folder_tests {
        use super::*;

        #[test]
        fn from_list_response() {
            let response = parse(b"* LIST (\\HasNoChildren \\Sent) \"/\" \"Sent Items\"\r\n");
            let folder = Folder::from_response(&response, false).unwrap();
            assert_eq!(folder.name, "Sent Items");
            assert_eq!(folder.delimiter, Some('/'));
            assert!(folder.has_attribute(&MailboxAttribute::Sent));
            assert!(folder.is_selectable());
        }

        #[test]
        fn decodes_modified_utf7() {
            let response = parse(b"* LIST () \".\" Entw&APw-rfe\r\n");
            let folder = Folder::from_response(&response, false).unwrap();
            assert_eq!(folder.name, "Entwürfe");
            assert_eq!(folder.raw_name, "Entw&APw-rfe");

            let folder = Folder::from_response(&response, true).unwrap();
            assert_eq!(folder.name, "Entw&APw-rfe");
        }

        #[test]
        fn nil_delimiter_and_noselect() {
            let response = parse(b"* LIST (\\Noselect) NIL \"\"\r\n");
            let folder = Folder::from_response(&response, false).unwrap();
            assert_eq!(folder.delimiter, None);
            assert!(!folder.is_selectable());
        }

        #[test]
        fn literal_name() {
            let response = parse(b"* LSUB () \"/\" {8}\r\nMy \"Box\"\r\n");
            let folder = Folder::from_response(&response, false).unwrap();
            assert_eq!(folder.name, "My \"Box\"");
        }

        #[test]
        fn too_few_items() {
            let response = parse(b"* LIST (\\Noselect)\r\n");
            assert!(Folder::from_response(&response, false).is_none());
        }
    }

    mod folder_status_tests {
        use super::*;

        #[test]
        fn from_status_response() {
            let response =
                parse(b"* STATUS INBOX (MESSAGES 231 UIDNEXT 44292 UNSEEN 3 HIGHESTMODSEQ 7011231777)\r\n");
            let status = FolderStatus::from_response(&response).unwrap();
            assert_eq!(status.messages, Some(231));
            assert_eq!(status.uid_next, Some(44292));
            assert_eq!(status.unseen, Some(3));
            assert_eq!(status.highest_mod_seq, Some(7011231777));
            assert_eq!(status.recent, None);
        }

        #[test]
        fn missing_attribute_list() {
            let response = parse(b"* STATUS INBOX\r\n");
            assert!(FolderStatus::from_response(&response).is_none());
        }
    }

    mod selected_folder_tests {
        use super::*;

        #[test]
        fn from_select_cycle() {
            let responses: ResponseCollection = [
                &b"* 172 EXISTS\r\n"[..],
                b"* 1 RECENT\r\n",
                b"* OK [UNSEEN 12] Message 12 is first unseen\r\n",
                b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n",
                b"* OK [UIDNEXT 4392] Predicted next UID\r\n",
                b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n",
                b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n",
                b"TAG3 OK [READ-WRITE] SELECT completed\r\n",
            ]
            .iter()
            .map(|line| parse(line))
            .collect();

            let folder = SelectedFolder::from_responses("INBOX", false, &responses);
            assert_eq!(folder.name, "INBOX");
            assert_eq!(folder.exists, 172);
            assert_eq!(folder.recent, 1);
            assert_eq!(folder.unseen, Some(12));
            assert_eq!(folder.uid_validity, Some(3857529045));
            assert_eq!(folder.uid_next, Some(4392));
            assert_eq!(folder.flags.len(), 5);
            assert_eq!(folder.permanent_flags, vec!["\\Deleted", "\\Seen", "\\*"]);
            assert!(!folder.read_only);
        }

        #[test]
        fn read_only_code_wins() {
            let responses: ResponseCollection = [&b"* 0 EXISTS\r\n"[..], b"TAG4 OK [READ-ONLY] done\r\n"]
                .iter()
                .map(|line| parse(line))
                .collect();

            let folder = SelectedFolder::from_responses("Archive", false, &responses);
            assert!(folder.read_only);
            assert_eq!(folder.exists, 0);
        }
    }

    mod mailbox_attribute_tests {
        use super::*;

        #[test]
        fn parse_known() {
            assert_eq!(MailboxAttribute::parse("\\NOSELECT"), MailboxAttribute::NoSelect);
            assert_eq!(
                MailboxAttribute::parse("\\HasChildren"),
                MailboxAttribute::HasChildren
            );
            assert_eq!(MailboxAttribute::parse("\\Spam"), MailboxAttribute::Junk);
            assert_eq!(
                MailboxAttribute::parse("\\NonExistent"),
                MailboxAttribute::NonExistent
            );
        }

        #[test]
        fn parse_unknown() {
            let attr = MailboxAttribute::parse("\\Custom");
            assert_eq!(attr, MailboxAttribute::Unknown("\\Custom".to_string()));
        }
    }
}
