//! Core IMAP types.
//!
//! Protocol-level values (tags, statuses, response codes, capabilities) and
//! the typed results the client builds from server data.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod fetch;
mod flags;
mod mailbox;
mod metadata;
mod namespace;
mod quota;
mod response_code;
mod sequence;
mod status;

pub use capability::Capabilities;
pub use fetch::FetchResponse;
pub use flags::Flag;
pub use mailbox::{Folder, FolderStatus, MailboxAttribute, SelectedFolder};
pub use metadata::MetadataEntry;
pub use namespace::{Namespace, NamespaceEntry};
pub use quota::{Quota, QuotaResource, QuotaRoot};
pub use response_code::ResponseCode;
pub use sequence::SequenceSet;
pub use status::{Status, Tag};
