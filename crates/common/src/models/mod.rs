//! Core domain types: publication identifiers, records and citation edges

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How versioned identifiers (`2001.08361v3`) map onto graph nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// Strip the `vN` suffix so every version is the same node
    #[default]
    Collapse,
    /// Keep the suffix; each version is a distinct node
    Preserve,
}

/// Normalized publication identifier
///
/// Only constructed through [`PublicationId::parse`], so two ids compare
/// equal exactly when they normalize to the same key under one policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicationId(String);

impl PublicationId {
    /// Normalize a raw identifier.
    ///
    /// Accepts bare ids (`1706.03762`), prefixed ids (`arXiv:1706.03762`),
    /// and abstract or PDF locators (`https://arxiv.org/abs/1706.03762v5`).
    pub fn parse(raw: &str, policy: VersionPolicy) -> Result<Self> {
        let mut id = raw.trim();

        for prefix in ["arXiv:", "arxiv:", "abs/", "pdf/"] {
            if let Some(rest) = id.strip_prefix(prefix) {
                id = rest;
            }
        }
        for marker in ["/abs/", "/pdf/"] {
            if let Some(pos) = id.find(marker) {
                id = &id[pos + marker.len()..];
            }
        }
        id = id.strip_suffix(".pdf").unwrap_or(id);

        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(AppError::InvalidIdentifier {
                raw: raw.to_string(),
            });
        }

        let id = match policy {
            VersionPolicy::Collapse => strip_version(id),
            VersionPolicy::Preserve => id,
        };

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `1706.03762v5` -> `1706.03762`; anything without a numeric `vN` tail is unchanged
fn strip_version(id: &str) -> &str {
    let Some(pos) = id.rfind('v') else {
        return id;
    };
    let (base, suffix) = id.split_at(pos);
    let digits = &suffix[1..];
    let base_ends_with_digit = base.bytes().last().is_some_and(|b| b.is_ascii_digit());

    if base_ends_with_digit && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        base
    } else {
        id
    }
}

impl fmt::Display for PublicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PublicationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Descriptive record of a publication, as returned by the metadata provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub title: String,

    /// Author names in byline order; may be empty
    pub authors: Vec<String>,

    /// Absent when the provider has no usable date
    pub year: Option<i32>,

    /// Canonical locator (abstract page)
    pub link: String,
}

impl PublicationRecord {
    /// Locator of the PDF rendition, derived from the abstract link
    pub fn pdf_link(&self) -> Option<String> {
        if self.link.contains("/abs/") {
            Some(self.link.replacen("/abs/", "/pdf/", 1))
        } else {
            None
        }
    }
}

/// Parse the year from a timestamp such as `2017-10-31T12:24:26Z`
pub fn year_from_timestamp(timestamp: &str) -> Option<i32> {
    let year: i32 = timestamp.trim().get(..4)?.parse().ok()?;
    (year > 0).then_some(year)
}

/// Directed citation: `from` cites `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationEdge {
    pub from: PublicationId,
    pub to: PublicationId,
}

impl CitationEdge {
    pub fn new(from: PublicationId, to: PublicationId) -> Self {
        Self { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        let policy = VersionPolicy::Preserve;
        for raw in [
            "1706.03762",
            " arXiv:1706.03762 ",
            "abs/1706.03762",
            "http://arxiv.org/abs/1706.03762",
            "https://arxiv.org/pdf/1706.03762.pdf",
        ] {
            assert_eq!(PublicationId::parse(raw, policy).unwrap().as_str(), "1706.03762");
        }
    }

    #[test]
    fn test_version_policy() {
        let collapsed = PublicationId::parse("http://arxiv.org/abs/1710.11431v3", VersionPolicy::Collapse).unwrap();
        assert_eq!(collapsed.as_str(), "1710.11431");

        let preserved = PublicationId::parse("1710.11431v3", VersionPolicy::Preserve).unwrap();
        assert_eq!(preserved.as_str(), "1710.11431v3");
        assert_ne!(collapsed, preserved);
    }

    #[test]
    fn test_collapse_leaves_non_versions_alone() {
        let policy = VersionPolicy::Collapse;
        assert_eq!(PublicationId::parse("hep-th/9901001", policy).unwrap().as_str(), "hep-th/9901001");
        assert_eq!(PublicationId::parse("cs.dev", policy).unwrap().as_str(), "cs.dev");
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(PublicationId::parse("", VersionPolicy::Collapse).is_err());
        assert!(PublicationId::parse("arXiv:", VersionPolicy::Collapse).is_err());
        assert!(PublicationId::parse("1706 03762", VersionPolicy::Collapse).is_err());
    }

    #[test]
    fn test_year_from_timestamp() {
        assert_eq!(year_from_timestamp("2017-10-31T12:24:26Z"), Some(2017));
        assert_eq!(year_from_timestamp("0000-00-00T00:00:00Z"), None);
        assert_eq!(year_from_timestamp("n/a"), None);
    }

    #[test]
    fn test_pdf_link() {
        let record = PublicationRecord {
            title: "Attention Is All You Need".into(),
            authors: vec!["Ashish Vaswani".into()],
            year: Some(2017),
            link: "http://arxiv.org/abs/1706.03762v7".into(),
        };
        assert_eq!(record.pdf_link().as_deref(), Some("http://arxiv.org/pdf/1706.03762v7"));
    }
}
