//! Sequence sets for message ranges.

use std::fmt;

/// Set of message sequence numbers or UIDs.
///
/// Whether the numbers are UIDs is decided by the command that sends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSet {
    /// Single number.
    Single(u32),
    /// Inclusive range.
    Range(u32, u32),
    /// From a number to the end of the mailbox (`n:*`).
    RangeFrom(u32),
    /// The last message (`*`).
    All,
    /// Several specifications joined by commas.
    Set(Vec<Self>),
}

impl SequenceSet {
    /// Creates a set of one number. Zero is not a valid message number.
    #[must_use]
    pub const fn single(n: u32) -> Option<Self> {
        if n == 0 { None } else { Some(Self::Single(n)) }
    }

    /// Creates an inclusive range.
    #[must_use]
    pub const fn range(start: u32, end: u32) -> Option<Self> {
        if start == 0 || end == 0 {
            None
        } else {
            Some(Self::Range(start, end))
        }
    }

    /// Creates a set listing every number; `None` if empty or containing zero.
    #[must_use]
    pub fn from_numbers(numbers: &[u32]) -> Option<Self> {
        match numbers {
            [] => None,
            [n] => Self::single(*n),
            _ => numbers
                .iter()
                .map(|&n| Self::single(n))
                .collect::<Option<Vec<_>>>()
                .map(Self::Set),
        }
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::All => f.write_str("*"),
            Self::Set(items) => {
                let s: Vec<_> = items.iter().map(ToString::to_string).collect();
                f.write_str(&s.join(","))
            }
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

    #[test]
    fn test_zero_is_rejected() {
        assert!(SequenceSet::single(0).is_none());
        assert!(SequenceSet::range(0, 5).is_none());
        assert!(SequenceSet::from_numbers(&[1, 0]).is_none());
        assert!(SequenceSet::from_numbers(&[]).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(SequenceSet::single(1).unwrap().to_string(), "1");
        assert_eq!(SequenceSet::range(1, 10).unwrap().to_string(), "1:10");
        assert_eq!(SequenceSet::RangeFrom(5).to_string(), "5:*");
        assert_eq!(SequenceSet::All.to_string(), "*");
        assert_eq!(
            SequenceSet::from_numbers(&[3, 7, 9]).unwrap().to_string(),
            "3,7,9"
        );
        assert_eq!(
            SequenceSet::Set(vec![SequenceSet::Range(1, 3), SequenceSet::Single(8)]).to_string(),
            "1:3,8"
        );
    }
}
