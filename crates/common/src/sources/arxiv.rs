//! arXiv Atom API metadata provider

use super::MetadataProvider;
use crate::config::ArxivConfig;
use crate::errors::{AppError, Result, SourceError};
use crate::models::{year_from_timestamp, PublicationId, PublicationRecord};
use crate::UNKNOWN_TITLE;
use async_trait::async_trait;
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Metadata provider backed by `export.arxiv.org/api/query`
pub struct ArxivMetadataProvider {
    client: reqwest::Client,
    api_base: String,
}

impl ArxivMetadataProvider {
    /// Create a provider; per-call timeouts are applied by the caller
    pub fn new(config: &ArxivConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MetadataProvider for ArxivMetadataProvider {
    async fn get_metadata(
        &self,
        id: &PublicationId,
    ) -> std::result::Result<PublicationRecord, SourceError> {
        let url = format!("{}/query", self.api_base);

        let response = self
            .client
            .get(&url)
            .query(&[("id_list", id.as_str()), ("max_results", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::from_status(status, "arXiv query API"));
        }

        let body = response.text().await?;
        debug!(id = %id, bytes = body.len(), "Received Atom feed");

        parse_atom_entry(&body)
    }

    fn name(&self) -> &str {
        "arxiv"
    }
}

fn entry_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid entry pattern"))
}

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").expect("valid title pattern"))
}

fn author_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("valid author pattern")
    })
}

fn published_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<published>(.*?)</published>").expect("valid published pattern")
    })
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<id>(.*?)</id>").expect("valid id pattern"))
}

/// Parse the first `<entry>` of an arXiv Atom feed.
///
/// An empty feed, or arXiv's error entry for an unknown id, is `NotFound`.
pub fn parse_atom_entry(feed: &str) -> std::result::Result<PublicationRecord, SourceError> {
    if !feed.contains("<feed") {
        return Err(SourceError::Malformed {
            message: "response is not an Atom feed".to_string(),
        });
    }

    let entry = entry_pattern()
        .captures(feed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or(SourceError::NotFound)?;

    let link = capture_text(id_pattern(), entry).unwrap_or_default();
    if link.contains("/api/errors") {
        return Err(SourceError::NotFound);
    }

    let title = capture_text(title_pattern(), entry)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let authors = author_pattern()
        .captures_iter(entry)
        .filter_map(|c| c.get(1))
        .map(|m| normalize_text(m.as_str()))
        .filter(|name| !name.is_empty())
        .collect();

    let year = capture_text(published_pattern(), entry).and_then(|p| year_from_timestamp(&p));

    Ok(PublicationRecord {
        title,
        authors,
        year,
        link,
    })
}

fn capture_text(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| normalize_text(m.as_str()))
}

/// Collapse whitespace (titles wrap across lines in the feed) and decode entities
fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=&amp;id_list=1710.11431</title>
  <id>http://arxiv.org/api/cHxbiOdZaP56ODnBPIenZhzg5f8</id>
  <entry>
    <id>http://arxiv.org/abs/1710.11431v3</id>
    <published>2017-10-31T12:24:26Z</published>
    <title>Physics-guided Neural Networks (PGNN): An Application in Lake
  Temperature Modeling</title>
    <author>
      <name>Arka Daw</name>
    </author>
    <author>
      <name>Anuj Karpatne</name>
    </author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_entry() {
        let record = parse_atom_entry(FEED).unwrap();
        assert_eq!(
            record.title,
            "Physics-guided Neural Networks (PGNN): An Application in Lake Temperature Modeling"
        );
        assert_eq!(record.authors, vec!["Arka Daw", "Anuj Karpatne"]);
        assert_eq!(record.year, Some(2017));
        assert_eq!(record.link, "http://arxiv.org/abs/1710.11431v3");
    }

    #[test]
    fn test_empty_feed_is_not_found() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>ArXiv Query</title></feed>"#;
        assert_eq!(parse_atom_entry(feed), Err(SourceError::NotFound));
    }

    #[test]
    fn test_error_entry_is_not_found() {
        let feed = r#"<feed><entry><id>http://arxiv.org/api/errors#incorrect_id_format_for_x</id><title>Error</title></entry></feed>"#;
        assert_eq!(parse_atom_entry(feed), Err(SourceError::NotFound));
    }

    #[test]
    fn test_non_feed_is_malformed() {
        let err = parse_atom_entry("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let feed = r#"<feed><entry><id>http://arxiv.org/abs/1805.08355v1</id></entry></feed>"#;
        let record = parse_atom_entry(feed).unwrap();
        assert_eq!(record.title, UNKNOWN_TITLE);
        assert!(record.authors.is_empty());
        assert_eq!(record.year, None);
    }
}
