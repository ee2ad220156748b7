//! PDF document source
//!
//! Downloads the PDF rendition of a publication and extracts its text with
//! lopdf. Parsing runs on the blocking pool.

use async_trait::async_trait;
use citeforge_common::config::ArxivConfig;
use citeforge_common::errors::{AppError, SourceError};
use citeforge_common::{DocumentSource, PublicationId};
use tracing::{debug, warn};

pub struct ArxivPdfSource {
    client: reqwest::Client,
    pdf_base: String,
}

impl ArxivPdfSource {
    pub fn new(config: &ArxivConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            pdf_base: config.pdf_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DocumentSource for ArxivPdfSource {
    async fn get_text(&self, id: &PublicationId) -> Result<String, SourceError> {
        let url = format!("{}/{}", self.pdf_base, id);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::from_status(status, "arXiv PDF download"));
        }

        let bytes = response.bytes().await?;
        debug!(id = %id, bytes = bytes.len(), "Downloaded PDF");

        tokio::task::spawn_blocking(move || extract_text_from_pdf_bytes(&bytes))
            .await
            .map_err(|e| SourceError::Transient {
                message: format!("PDF extraction task failed: {}", e),
            })?
    }

    fn name(&self) -> &str {
        "arxiv-pdf"
    }
}

/// Extract text content from an in-memory PDF
pub fn extract_text_from_pdf_bytes(bytes: &[u8]) -> Result<String, SourceError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| SourceError::Malformed {
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (page_num, page_id) in pages {
        match doc.get_page_content(page_id) {
            Ok(content) => {
                text.push_str(&extract_text_from_content(&content));
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to read page content, skipping");
            }
        }
    }

    let cleaned = clean_text(&text);
    if cleaned.is_empty() {
        return Err(SourceError::Malformed {
            message: "No text content extracted from PDF".to_string(),
        });
    }

    debug!(
        original_len = text.len(),
        cleaned_len = cleaned.len(),
        "Text extraction complete"
    );
    Ok(cleaned)
}

/// Collect the strings shown between BT and ET operators
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content_str.lines() {
        let trimmed = line.trim();

        match trimmed {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                text.push(' ');
            }
            _ if in_text_block => {
                if let Some(shown) = shown_text(trimmed) {
                    text.push_str(&shown);
                }
            }
            _ => {}
        }
    }

    text
}

/// Text of a `Tj`, `'`, `"` or `TJ` operator line
fn shown_text(line: &str) -> Option<String> {
    if !(line.ends_with("Tj") || line.ends_with("TJ") || line.ends_with('\'') || line.ends_with('"')) {
        return None;
    }

    let mut result = String::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut escaped = false;

    for ch in line.chars() {
        if depth > 0 {
            if escaped {
                current.push('\\');
                current.push(ch);
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                '(' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        result.push_str(&decode_pdf_string(&current));
                        current.clear();
                    } else {
                        current.push(ch);
                    }
                }
                _ => current.push(ch),
            }
        } else if ch == '(' {
            depth = 1;
        }
    }

    (!result.is_empty()).then_some(result)
}

fn decode_pdf_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(c) => result.push(c),
            None => {}
        }
    }

    result
}

/// Collapse whitespace and drop byte-order marks
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Hello   World\n\n\u{FEFF}Test"), "Hello World Test");
    }

    #[test]
    fn test_shown_text_operators() {
        assert_eq!(shown_text("(See arXiv:1706.03762) Tj").as_deref(), Some("See arXiv:1706.03762"));
        assert_eq!(shown_text("[(abs/) -20 (2001.08361)] TJ").as_deref(), Some("abs/2001.08361"));
        assert_eq!(shown_text("1 0 0 1 72 712 Tm"), None);
    }

    #[test]
    fn test_escaped_parentheses() {
        assert_eq!(shown_text(r"(f\(x\) = 1) Tj").as_deref(), Some("f(x) = 1"));
    }

    #[test]
    fn test_content_stream_blocks() {
        let content = b"BT\n/F1 12 Tf\n(Refs: arXiv:1805.08355) Tj\nET\n(outside) Tj\n";
        assert_eq!(clean_text(&extract_text_from_content(content)), "Refs: arXiv:1805.08355");
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = extract_text_from_pdf_bytes(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
