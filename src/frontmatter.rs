//! Frontmatter composition.
//!
//! A rewritten document is written as a metadata header followed by the
//! markup, untouched. The header format depends on the static-site generator
//! reading the output:
//!
//! | Format | Delimiters | Read by |
//! |--------|------------|---------|
//! | `yaml` | `---` … `---` | Jekyll, Hugo, Eleventy |
//! | `toml` | `+++` … `+++` | Hugo, Zola |
//! | `json` | bare object   | Hugo |
//!
//! ```text
//! ---
//! layout: post
//! doc_id: 1a2b3c
//! title: Hello
//! date: 2024-03-01T09:30:00Z
//! last_modified_at: 2024-03-02T10:00:00Z
//! description: ''
//! published: true
//! ---
//! <html>...
//! ```

use crate::types::MetadataRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontmatterFormat {
    #[default]
    Yaml,
    Toml,
    Json,
}

#[derive(Serialize)]
struct Header<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    layout: Option<&'a str>,
    #[serde(flatten)]
    record: &'a MetadataRecord,
}

/// Serialize `record` as a header and prepend it to `content`.
pub fn compose(
    record: &MetadataRecord,
    layout: Option<&str>,
    format: FrontmatterFormat,
    content: &[u8],
) -> Result<Vec<u8>, FrontmatterError> {
    let header = Header { layout, record };
    let block = match format {
        FrontmatterFormat::Yaml => format!("---\n{}---\n", serde_yaml::to_string(&header)?),
        FrontmatterFormat::Toml => format!("+++\n{}+++\n", toml::to_string(&header)?),
        FrontmatterFormat::Json => format!("{}\n", serde_json::to_string_pretty(&header)?),
    };

    let mut out = Vec::with_capacity(block.len() + content.len());
    out.extend_from_slice(block.as_bytes());
    out.extend_from_slice(content);
    Ok(out)
}
