//! QUOTA response types (RFC 2087).

use crate::response::{Item, Response, ResponseCollection};

/// Usage and limit of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaResource {
    /// Resource name, e.g. `STORAGE` (in KiB) or `MESSAGE`.
    pub name: String,
    /// Current usage.
    pub usage: u64,
    /// Limit.
    pub limit: u64,
}

/// Resource limits of one quota root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    /// Quota root name.
    pub root: String,
    /// Limited resources.
    pub resources: Vec<QuotaResource>,
}

impl Quota {
    /// Builds a quota from `* QUOTA <root> (<name> <usage> <limit> ...)`.
    #[must_use]
    pub fn from_response(response: &Response) -> Option<Self> {
        let [root, resources, ..] = response.data() else {
            return None;
        };

        let resources = resources
            .as_list()?
            .chunks_exact(3)
            .filter_map(|triple| {
                Some(QuotaResource {
                    name: triple[0].as_str()?.to_string(),
                    usage: triple[1].as_number()?,
                    limit: triple[2].as_number()?,
                })
            })
            .collect();

        Some(Self {
            root: root.to_text()?,
            resources,
        })
    }

    /// Returns the resource called `name`, ignoring case.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&QuotaResource> {
        self.resources
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

/// Result of `GETQUOTAROOT`: the roots of a mailbox and their quotas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaRoot {
    /// Mailbox the roots were requested for.
    pub mailbox: String,
    /// Quota root names.
    pub roots: Vec<String>,
    /// Quotas reported alongside.
    pub quotas: Vec<Quota>,
}

impl QuotaRoot {
    /// Collects `QUOTAROOT` and `QUOTA` data from a command cycle.
    #[must_use]
    pub fn from_responses(mailbox: &str, responses: &ResponseCollection) -> Self {
        let roots = responses
            .untagged("QUOTAROOT")
            .flat_map(|r| r.data().iter().skip(1).filter_map(Item::to_text))
            .collect();
        let quotas = responses
            .untagged("QUOTA")
            .filter_map(Quota::from_response)
            .collect();

        Self {
            mailbox: mailbox.to_string(),
            roots,
            quotas,
        }
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

    #[test]
    fn test_quota_root_cycle() {
        let responses: ResponseCollection = [
            &b"* QUOTAROOT INBOX \"\"\r\n"[..],
            b"* QUOTA \"\" (STORAGE 10 512 MESSAGE 3 1000)\r\n",
            b"TAG5 OK Getquota completed\r\n",
        ]
        .iter()
        .map(|line| ResponseParser::parse(line).unwrap())
        .collect();

        let quota_root = QuotaRoot::from_responses("INBOX", &responses);
        assert_eq!(quota_root.roots, vec![""]);
        assert_eq!(quota_root.quotas.len(), 1);

        let storage = quota_root.quotas[0].resource("storage").unwrap();
        assert_eq!(storage.usage, 10);
        assert_eq!(storage.limit, 512);
        assert_eq!(quota_root.quotas[0].resource("MESSAGE").unwrap().limit, 1000);
    }

    #[test]
    fn test_quota_root_without_quota() {
        let responses: ResponseCollection = [&b"* QUOTAROOT INBOX\r\n"[..], b"TAG5 OK done\r\n"]
            .iter()
            .map(|line| ResponseParser::parse(line).unwrap())
            .collect();

        let quota_root = QuotaRoot::from_responses("INBOX", &responses);
        assert!(quota_root.roots.is_empty());
        assert!(quota_root.quotas.is_empty());
    }

    #[test]
    fn test_quota_skips_bad_triples() {
        let response = ResponseParser::parse(b"* QUOTA user (STORAGE x 512)\r\n").unwrap();
        let quota = Quota::from_response(&response).unwrap();
        assert_eq!(quota.root, "user");
        assert!(quota.resources.is_empty());
    }
}
