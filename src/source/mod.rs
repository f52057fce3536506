//! Document listing and export boundary.
//!
//! A [`DocumentSource`] lists the documents of a folder one page at a time
//! and exports a single document as a zip archive. [`list_documents`] drains
//! the pagination and [`unpack_archive`] turns an export into an
//! [`ExportedBundle`]. Everything above this module sees only descriptors and
//! bundles.

mod local;

use crate::types::{BundleEntry, DocumentDescriptor, ExportedBundle};
use std::collections::HashSet;
use std::io::{Cursor, Read};
use thiserror::Error;

pub use local::LocalFolderSource;

/// Upper bound on one archive entry once inflated.
const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Archive entry {name} exceeds {limit} bytes")]
    EntryTooLarge { name: String, limit: u64 },
    #[error("Listing error: {0}")]
    Listing(String),
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPage {
    pub documents: Vec<DocumentDescriptor>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

pub trait DocumentSource {
    /// One page of the documents in `folder_id`, starting at `page_token`
    /// (`None` for the first page).
    fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, SourceError>;

    /// Zip-packaged markup export of document `id`.
    fn export(&self, id: &str) -> Result<Vec<u8>, SourceError>;
}

/// Every document in `folder_id`, across all pages, in listing order.
pub fn list_documents<S: DocumentSource + ?Sized>(
    source: &S,
    folder_id: &str,
) -> Result<Vec<DocumentDescriptor>, SourceError> {
    let mut documents = Vec::new();
    let mut seen = HashSet::new();
    let mut token: Option<String> = None;
    loop {
        let page = source.list_page(folder_id, token.as_deref())?;
        tracing::debug!(count = page.documents.len(), "listed page");
        documents.extend(page.documents);
        match page.next_page_token {
            Some(next) if !seen.insert(next.clone()) => {
                return Err(SourceError::Listing(format!(
                    "page token {next} repeated"
                )));
            }
            Some(next) => token = Some(next),
            None => return Ok(documents),
        }
    }
}

/// Extract every file of a zip archive, in archive order. Directory entries
/// are skipped.
pub fn unpack_archive(id: &str, bytes: &[u8]) -> Result<ExportedBundle, SourceError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut content = Vec::with_capacity(file.size().min(MAX_ENTRY_BYTES) as usize);
        file.take(MAX_ENTRY_BYTES + 1).read_to_end(&mut content)?;
        if content.len() as u64 > MAX_ENTRY_BYTES {
            return Err(SourceError::EntryTooLarge {
                name,
                limit: MAX_ENTRY_BYTES,
            });
        }
        entries.push(BundleEntry { name, content });
    }
    Ok(ExportedBundle {
        id: id.to_string(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MemorySource, SourceOp, descriptor, zip_archive};

    #[test]
    fn pagination_drains_every_page() {
        let source = MemorySource::paged(vec![
            vec![descriptor("a", "A"), descriptor("b", "B")],
            vec![descriptor("c", "C")],
            vec![],
            vec![descriptor("d", "D")],
        ]);
        let docs = list_documents(&source, "folder").unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(
            source.get_operations(),
            vec![
                SourceOp::List(None),
                SourceOp::List(Some("1".into())),
                SourceOp::List(Some("2".into())),
                SourceOp::List(Some("3".into())),
            ]
        );
    }

    #[test]
    fn empty_folder_lists_nothing() {
        let source = MemorySource::paged(vec![]);
        assert!(list_documents(&source, "folder").unwrap().is_empty());
    }

    #[test]
    fn listing_failure_propagates() {
        let source = MemorySource::paged(vec![vec![descriptor("a", "A")]]);
        source.fail_next("quota");
        assert!(matches!(
            list_documents(&source, "folder"),
            Err(SourceError::Listing(_))
        ));
    }

    #[test]
    fn unpack_keeps_archive_order_and_skips_directories() {
        let bytes = zip_archive(&[
            ("doc.html", b"<html></html>".as_slice()),
            ("images/", b"".as_slice()),
            ("images/a.png", b"\x89PNG".as_slice()),
        ]);
        let bundle = unpack_archive("abc", &bytes).unwrap();
        assert_eq!(bundle.id, "abc");
        let names: Vec<_> = bundle.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["doc.html", "images/a.png"]);
        assert_eq!(bundle.entries[1].content, b"\x89PNG");
    }

    #[test]
    fn garbage_is_not_an_archive() {
        assert!(matches!(
            unpack_archive("x", b"not a zip"),
            Err(SourceError::Zip(_))
        ));
    }

    /// Hands out `tokens` in order as next-page tokens, one page per call.
    struct CyclingSource {
        tokens: Vec<&'static str>,
        calls: std::sync::Mutex<usize>,
    }

    impl DocumentSource for CyclingSource {
        fn list_page(&self, _: &str, _: Option<&str>) -> Result<DocumentPage, SourceError> {
            let mut calls = self.calls.lock().unwrap();
            let next = self.tokens.get(*calls).map(|t| t.to_string());
            *calls += 1;
            Ok(DocumentPage {
                documents: vec![descriptor(&format!("doc{calls}"), "Doc")],
                next_page_token: next,
            })
        }

        fn export(&self, id: &str) -> Result<Vec<u8>, SourceError> {
            Err(SourceError::NotFound(id.to_string()))
        }
    }

    #[test]
    fn token_cycle_is_rejected() {
        let source = CyclingSource {
            tokens: vec!["a", "b", "a", "b"],
            calls: std::sync::Mutex::new(0),
        };
        let result = list_documents(&source, "folder");
        assert!(matches!(result, Err(SourceError::Listing(msg)) if msg.contains("page token a")));
        assert_eq!(*source.calls.lock().unwrap(), 3);
    }

    #[test]
    fn distinct_tokens_are_followed() {
        let source = CyclingSource {
            tokens: vec!["a", "b"],
            calls: std::sync::Mutex::new(0),
        };
        assert_eq!(list_documents(&source, "folder").unwrap().len(), 3);
    }
}
