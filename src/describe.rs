//! Post descriptions for records that have none.
//!
//! The pipeline treats description generation as an opaque supplier: it hands
//! over the exported markup and gets back plain text. The built-in
//! [`ExcerptSupplier`] uses the document's first real paragraph; other
//! suppliers (e.g. a language model) plug in behind the same trait.

use scraper::{Html, Selector};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescribeError {
    #[error("markup is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("no text to describe")]
    NoText,
    #[error("description supplier failed: {0}")]
    Supplier(String),
}

/// Produces a plain-text description from exported markup.
pub trait DescriptionSupplier: Sync {
    fn describe(&self, markup: &[u8]) -> Result<String, DescribeError>;
}

/// First non-empty paragraph that is not the document title or subtitle,
/// truncated at a word boundary.
#[derive(Debug, Clone)]
pub struct ExcerptSupplier {
    pub max_chars: usize,
}

impl Default for ExcerptSupplier {
    fn default() -> Self {
        Self { max_chars: 300 }
    }
}

impl DescriptionSupplier for ExcerptSupplier {
    fn describe(&self, markup: &[u8]) -> Result<String, DescribeError> {
        let html = Html::parse_document(std::str::from_utf8(markup)?);
        let Ok(paragraphs) = Selector::parse("body p") else {
            return Err(DescribeError::NoText);
        };

        html.select(&paragraphs)
            .filter(|p| !matches!(p.value().attr("class"), Some("title" | "subtitle")))
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .find(|text| !text.is_empty())
            .map(|text| truncate_words(&text, self.max_chars))
            .ok_or(DescribeError::NoText)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters, cutting at the last space and
/// appending `...` when anything was dropped.
fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    let cut = match cut.rfind(' ') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}...", cut.trim_end_matches([',', ';', ':', '.']))
}
