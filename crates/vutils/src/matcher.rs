//! Record matching over heterogeneous lookup lists
//!
//! Volume lookups match against bare names, MAC lookups against one
//! `{domain: [macs]}` entry per domain. Both go through [`find_record`].

use serde::{Deserialize, Serialize};

/// A single candidate in a lookup list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRecord {
    /// A bare value, e.g. a storage volume name
    Scalar(String),
    /// A named entry with its values, e.g. a domain and its MAC addresses
    Entry {
        /// Entry key (domain name)
        name: String,
        /// Values held by the entry, in document order
        values: Vec<String>,
    },
}

impl MatchRecord {
    /// Whether `key` selects this record.
    ///
    /// Entries match on their name or on any of their values; scalars
    /// match by equality.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            MatchRecord::Scalar(value) => value == key,
            MatchRecord::Entry { name, values } => name == key || values.iter().any(|v| v == key),
        }
    }

    /// The record's name: the scalar itself, or the entry key.
    pub fn name(&self) -> &str {
        match self {
            MatchRecord::Scalar(value) => value,
            MatchRecord::Entry { name, .. } => name,
        }
    }

    /// First value of an entry; scalars have none.
    pub fn first_value(&self) -> Option<&str> {
        match self {
            MatchRecord::Scalar(_) => None,
            MatchRecord::Entry { values, .. } => values.first().map(String::as_str),
        }
    }
}

/// Which record wins when several match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Scan the whole list; the last matching record wins
    #[default]
    Last,
    /// Stop at the first matching record
    First,
}

/// Find the record selected by `key`.
pub fn find_record<'a>(
    key: &str,
    records: &'a [MatchRecord],
    policy: MatchPolicy,
) -> Option<&'a MatchRecord> {
    let mut matching = records.iter().filter(|r| r.matches(key));
    match policy {
        MatchPolicy::Last => matching.last(),
        MatchPolicy::First => matching.next(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, values: &[&str]) -> MatchRecord {
        MatchRecord::Entry {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn test_value_match_last_wins() {
        let records = vec![entry("a", &["x"]), entry("b", &["x"])];
        let found = find_record("x", &records, MatchPolicy::Last).unwrap();
        assert_eq!(found.name(), "b");
    }

    #[test]
    fn test_value_match_first_policy() {
        let records = vec![entry("a", &["x"]), entry("b", &["x"])];
        let found = find_record("x", &records, MatchPolicy::First).unwrap();
        assert_eq!(found.name(), "a");
    }

    #[test]
    fn test_key_match() {
        let records = vec![entry("a", &["x"]), entry("b", &["x"])];
        assert_eq!(find_record("a", &records, MatchPolicy::Last), Some(&records[0]));
    }

    #[test]
    fn test_name_and_value_collide() {
        // "b" is both the second entry's name and a MAC held by the third
        let records = vec![entry("a", &[]), entry("b", &["m1"]), entry("c", &["b"])];
        assert_eq!(
            find_record("b", &records, MatchPolicy::Last).map(MatchRecord::name),
            Some("c")
        );
        assert_eq!(
            find_record("b", &records, MatchPolicy::First).map(MatchRecord::name),
            Some("b")
        );
    }

    #[test]
    fn test_scalars() {
        let records = vec![
            MatchRecord::Scalar("v1".into()),
            MatchRecord::Scalar("v2".into()),
        ];
        assert_eq!(
            find_record("v2", &records, MatchPolicy::Last).map(MatchRecord::name),
            Some("v2")
        );
        assert_eq!(find_record("v3", &records, MatchPolicy::Last), None);
        assert_eq!(find_record("v", &records, MatchPolicy::First), None);
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(find_record("x", &[], MatchPolicy::Last), None);
        assert_eq!(find_record("x", &[], MatchPolicy::First), None);
    }

    #[test]
    fn test_first_value() {
        assert_eq!(entry("a", &["m1", "m2"]).first_value(), Some("m1"));
        assert_eq!(entry("a", &[]).first_value(), None);
        assert_eq!(MatchRecord::Scalar("v".into()).first_value(), None);
    }
}
