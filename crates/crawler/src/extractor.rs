//! Reference extraction
//!
//! Turns raw document text into the ordered, deduplicated list of arXiv
//! identifiers it cites. Two notations are recognized: `arXiv:2001.08361`
//! and the abstract-path form `abs/2001.08361`, each with an optional
//! version suffix.

use citeforge_common::{PublicationId, VersionPolicy};
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:arXiv:|abs/)(\d{4}\.\d{4,5}(?:v\d+)?)").expect("valid citation pattern")
    })
}

/// Extract cited identifiers in first-seen order.
///
/// Pure: no I/O, never fails, and equal inputs give equal outputs. Ids that
/// normalize to the same key under `policy` appear once.
pub fn extract_references(text: &str, policy: VersionPolicy) -> Vec<PublicationId> {
    let mut seen = HashSet::new();

    citation_pattern()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| PublicationId::parse(m.as_str(), policy).ok())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(found: &[PublicationId]) -> Vec<&str> {
        found.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn test_both_notations() {
        let text = "See arXiv:2001.08361 and https://arxiv.org/abs/1706.03762 for details.";
        let found = extract_references(text, VersionPolicy::Collapse);
        assert_eq!(ids(&found), vec!["2001.08361", "1706.03762"]);
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let text = "arXiv:1111.22222 arXiv:1706.03762 abs/1111.22222 arXiv:1706.03762";
        let found = extract_references(text, VersionPolicy::Collapse);
        assert_eq!(ids(&found), vec!["1111.22222", "1706.03762"]);
    }

    #[test]
    fn test_versions_follow_policy() {
        let text = "arXiv:1706.03762v5 and later arXiv:1706.03762v7";

        let collapsed = extract_references(text, VersionPolicy::Collapse);
        assert_eq!(ids(&collapsed), vec!["1706.03762"]);

        let preserved = extract_references(text, VersionPolicy::Preserve);
        assert_eq!(ids(&preserved), vec!["1706.03762v5", "1706.03762v7"]);
    }

    #[test]
    fn test_no_matches() {
        assert!(extract_references("", VersionPolicy::Collapse).is_empty());
        assert!(extract_references("doi:10.1000/182 and 1706.03762 bare", VersionPolicy::Collapse).is_empty());
    }

    #[test]
    fn test_short_numbers_ignored() {
        // Three-digit sequence numbers are not arXiv identifiers
        assert!(extract_references("arXiv:1706.037", VersionPolicy::Collapse).is_empty());
    }

    proptest! {
        #[test]
        fn prop_extraction_is_deterministic(text in ".{0,400}") {
            let first = extract_references(&text, VersionPolicy::Collapse);
            let second = extract_references(&text, VersionPolicy::Collapse);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_output_has_no_duplicates(
            picks in proptest::collection::vec((1000u32..9999, 10000u32..99999, any::<bool>()), 0..30)
        ) {
            let text: String = picks
                .iter()
                .map(|(yymm, seq, abs)| {
                    if *abs { format!("abs/{}.{} ", yymm, seq) } else { format!("arXiv:{}.{} ", yymm, seq) }
                })
                .collect();

            let found = extract_references(&text, VersionPolicy::Collapse);
            let unique: HashSet<_> = found.iter().collect();
            prop_assert_eq!(unique.len(), found.len());

            let distinct: HashSet<_> = picks.iter().map(|(a, b, _)| (a, b)).collect();
            prop_assert_eq!(found.len(), distinct.len());
        }
    }
}
