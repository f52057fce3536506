//! Shared types used across the pipeline.
//!
//! Descriptors come from the document listing, records are what the index
//! store persists and the frontmatter composer serializes, and bundles are the
//! unpacked contents of one export archive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A document as reported by the listing. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescriptor {
    pub id: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
}

/// Per-document metadata, keyed by document identifier.
///
/// Field names under `serde` are the frontmatter names downstream static-site
/// tooling reads; keep them stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(rename = "doc_id")]
    pub id: String,
    pub title: String,
    /// Creation date; doubles as the publication date.
    #[serde(rename = "date", default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(
        rename = "last_modified_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    /// Visibility flag. Hidden documents are left out of the site.
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

impl MetadataRecord {
    /// An empty record for `id`, as if nothing but the key were known.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            created: None,
            modified: None,
            description: String::new(),
            published: true,
        }
    }

    /// The listing's view of a document: identifier, title and timestamps.
    pub fn from_descriptor(descriptor: &DocumentDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            title: descriptor.name.clone(),
            created: Some(descriptor.created_time),
            modified: Some(descriptor.modified_time),
            description: String::new(),
            published: true,
        }
    }
}

/// What an export archive entry is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Markup,
    Asset,
    Unsupported,
}

const MARKUP_EXTENSIONS: &[&str] = &["html", "htm"];
const ASSET_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp"];

/// One named payload extracted from an export archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// Path inside the archive, e.g. `images/image1.png`.
    pub name: String,
    pub content: Vec<u8>,
}

impl BundleEntry {
    /// Classify by file extension (case-insensitive).
    pub fn kind(&self) -> EntryKind {
        let ext = Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some(e) if MARKUP_EXTENSIONS.contains(&e) => EntryKind::Markup,
            Some(e) if ASSET_EXTENSIONS.contains(&e) => EntryKind::Asset,
            _ => EntryKind::Unsupported,
        }
    }
}

/// The unpacked export of one document, in archive order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedBundle {
    pub id: String,
    pub entries: Vec<BundleEntry>,
}

/// A record together with its rewritten, frontmatter-prefixed markup.
#[derive(Debug, Clone)]
pub struct RewrittenDocument {
    pub record: MetadataRecord,
    pub content: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(name: &str) -> BundleEntry {
        BundleEntry {
            name: name.to_string(),
            content: Vec::new(),
        }
    }

    #[test]
    fn classifies_markup_assets_and_others() {
        assert_eq!(entry("MyDoc.html").kind(), EntryKind::Markup);
        assert_eq!(entry("images/image1.png").kind(), EntryKind::Asset);
        assert_eq!(entry("images/photo.JPG").kind(), EntryKind::Asset);
        assert_eq!(entry("notes.txt").kind(), EntryKind::Unsupported);
        assert_eq!(entry("README").kind(), EntryKind::Unsupported);
    }

    #[test]
    fn record_from_descriptor_takes_listing_fields() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let modified = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        let record = MetadataRecord::from_descriptor(&DocumentDescriptor {
            id: "abc".into(),
            name: "Hello".into(),
            created_time: created,
            modified_time: modified,
        });

        assert_eq!(record.id, "abc");
        assert_eq!(record.title, "Hello");
        assert_eq!(record.created, Some(created));
        assert_eq!(record.modified, Some(modified));
        assert!(record.description.is_empty());
        assert!(record.published);
    }
}
