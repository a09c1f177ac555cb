//! Lookup index deciding create-vs-update during an import run.
//!
//! Built once from the existing donor set, then mutated in place as the run
//! creates donors so later rows in the same file match them. Colliding keys
//! keep the most recently inserted donor (last-write-wins, matching the
//! source system; see DESIGN.md).

use crate::import::normalize::normalize_text;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MatchingIndex {
    by_key: HashMap<String, String>,
}

/// Case-insensitive key: `first|last` when both names are present, otherwise
/// `org|<organization>`. Rows with neither produce no key.
pub fn match_key(
    first_name: Option<&str>,
    last_name: Option<&str>,
    organization_name: Option<&str>,
) -> Option<String> {
    let norm = |s: &str| normalize_text(s).to_lowercase();
    match (first_name, last_name) {
        (Some(first), Some(last)) if !first.trim().is_empty() && !last.trim().is_empty() => {
            Some(format!("{}|{}", norm(first), norm(last)))
        }
        _ => match organization_name {
            Some(org) if !org.trim().is_empty() => Some(format!("org|{}", norm(org))),
            _ => None,
        },
    }
}

impl MatchingIndex {
    pub fn build<'a, I>(donors: I) -> MatchingIndex
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>, Option<&'a str>, Option<&'a str>)>,
    {
        let mut index = MatchingIndex::default();
        for (id, first, last, org) in donors {
            if let Some(key) = match_key(first, last, org) {
                index.by_key.insert(key, id.to_string());
            }
        }
        index
    }

    pub fn lookup(
        &self,
        first_name: Option<&str>,
        last_name: Option<&str>,
        organization_name: Option<&str>,
    ) -> Option<&str> {
        let key = match_key(first_name, last_name, organization_name)?;
        self.by_key.get(&key).map(|s| s.as_str())
    }

    pub fn insert(&mut self, key: String, donor_id: String) {
        self.by_key.insert(key, donor_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_pair_beats_organization() {
        let key = match_key(Some("Mei"), Some("Lee"), Some("Acme Corp")).unwrap();
        assert_eq!(key, "mei|lee");
    }

    #[test]
    fn organization_used_when_names_incomplete() {
        assert_eq!(
            match_key(Some("Mei"), None, Some("Acme Corp")).as_deref(),
            Some("org|acme corp")
        );
        assert_eq!(match_key(None, None, None), None);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let index = MatchingIndex::build([("d1", Some("Mei"), Some("Lee"), None)]);
        assert_eq!(index.lookup(Some("MEI"), Some("lee"), None), Some("d1"));
        assert_eq!(index.lookup(Some("Mei"), Some("Chen"), None), None);
    }

    #[test]
    fn collisions_keep_most_recent_insert() {
        let index = MatchingIndex::build([
            ("d1", None, None, Some("Acme Corp")),
            ("d2", None, None, Some("ACME CORP")),
        ]);
        assert_eq!(index.lookup(None, None, Some("acme corp")), Some("d2"));
    }

    #[test]
    fn mid_run_inserts_are_visible() {
        let mut index = MatchingIndex::default();
        let key = match_key(None, None, Some("Acme Corp")).unwrap();
        index.insert(key, "new-donor".to_string());
        assert_eq!(index.lookup(None, None, Some("Acme Corp")), Some("new-donor"));
    }
}
