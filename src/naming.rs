//! Centralized output naming.
//!
//! Every file the pipeline writes gets its name here, so the markup rewriter
//! and the asset writer always agree on where an image lives.
//!
//! ## Assets
//!
//! Exported documents reference images by a path relative to the archive
//! (`images/image1.png`). Assets from every document share one flat output
//! directory, so the document identifier is folded into the name:
//!
//! - `("123", "images/image1.png")` → `123-image1.png`
//! - `("123", "images/image1.png")` with prefix `assets` → `assets/123-image1.png`
//!
//! Two assets of the *same* document with the same base name collide; the
//! last one written wins.
//!
//! ## Posts
//!
//! Posts follow the Jekyll convention `YYYY-MM-DD-title.html`, e.g.
//! `2024-03-01-Hello-World.html`.

use crate::types::MetadataRecord;

const POST_DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_SLUG_LEN: usize = 80;

/// Flat output path for an asset of document `doc_id`.
///
/// Returns `{prefix/}{doc_id}-{base name of asset_path}`. Pure and total.
pub fn normalized_asset_path(prefix: &str, doc_id: &str, asset_path: &str) -> String {
    let base = base_name(asset_path);
    let prefix = prefix.trim_end_matches('/');

    let mut out = String::with_capacity(prefix.len() + doc_id.len() + base.len() + 2);
    if !prefix.is_empty() {
        out.push_str(prefix);
        out.push('/');
    }
    out.push_str(doc_id);
    out.push('-');
    out.push_str(base);
    out
}

/// Last path element, ignoring trailing slashes.
///
/// - `"images/pic.png"` → `"pic.png"`
/// - `"pic.png"` → `"pic.png"`
/// - `"images/"` → `"images"`
fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// File name for a rewritten post: `{YYYY-MM-DD-}{slug}.html`.
///
/// The date prefix is dropped when the record has no creation date; the
/// document identifier stands in for a title that sanitizes to nothing.
pub fn post_file_name(record: &MetadataRecord) -> String {
    let mut name = String::new();
    if let Some(created) = record.created {
        name.push_str(&created.format(POST_DATE_FORMAT).to_string());
        name.push('-');
    }

    let slug = sanitize_slug(&record.title);
    if slug.is_empty() {
        name.push_str(&record.id);
    } else {
        name.push_str(&slug);
    }
    name.push_str(".html");
    name
}

/// Sanitize a title for use in file names and URLs.
///
/// - Replaces non-alphanumeric characters (except dashes) with dashes
/// - Collapses consecutive dashes into one
/// - Strips leading and trailing dashes
/// - Truncates to `MAX_SLUG_LEN` characters (breaks at last dash before limit)
pub fn sanitize_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut prev_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }

    let trimmed = slug.trim_matches('-');
    if trimmed.len() <= MAX_SLUG_LEN {
        return trimmed.to_string();
    }
    // ASCII only at this point, so byte slicing is safe.
    let truncated = &trimmed[..MAX_SLUG_LEN];
    match truncated.rfind('-') {
        Some(pos) => truncated[..pos].to_string(),
        None => truncated.to_string(),
    }
}
