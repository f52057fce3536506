//! Documents exported ahead of time into a local directory.
//!
//! ```text
//! folder/
//! ├── 1a2b3c.zip     # export archive; the stem is the document id
//! ├── 1a2b3c.txt     # optional: display name
//! └── 4d5e6f.zip
//! ```
//!
//! Timestamps come from file metadata: creation time where the filesystem
//! records one, modification time otherwise. Page tokens are offsets into
//! the id-sorted listing.

use super::{DocumentPage, DocumentSource, SourceError};
use crate::types::DocumentDescriptor;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

const ARCHIVE_EXTENSION: &str = "zip";

#[derive(Debug)]
pub struct LocalFolderSource {
    page_size: usize,
    /// Archive path per listed id; export only serves listed documents.
    archives: Mutex<HashMap<String, PathBuf>>,
}

impl LocalFolderSource {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            archives: Mutex::new(HashMap::new()),
        }
    }

    fn archives_in(folder: &Path) -> Result<Vec<PathBuf>, SourceError> {
        if !folder.is_dir() {
            return Err(SourceError::NotFound(folder.display().to_string()));
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| SourceError::Listing(e.to_string()))?;
            let is_archive = entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION));
            if is_archive {
                paths.push(entry.into_path());
            }
        }
        Ok(paths)
    }

    fn describe(path: &Path) -> Result<DocumentDescriptor, SourceError> {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = std::fs::read_to_string(path.with_extension("txt"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| id.clone());

        let meta = std::fs::metadata(path)?;
        let modified: DateTime<Utc> = meta.modified()?.into();
        let created: DateTime<Utc> = meta.created().map(Into::into).unwrap_or(modified);

        Ok(DocumentDescriptor {
            id,
            name,
            created_time: created,
            modified_time: modified,
        })
    }
}

impl DocumentSource for LocalFolderSource {
    fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, SourceError> {
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| SourceError::Listing(format!("invalid page token '{token}'")))?,
            None => 0,
        };

        let paths = Self::archives_in(Path::new(folder_id))?;
        let end = (offset + self.page_size).min(paths.len());
        let page = paths.get(offset..end).unwrap_or_default();

        let documents = page
            .iter()
            .map(|p| Self::describe(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut archives = self
            .archives
            .lock()
            .map_err(|_| SourceError::Listing("archive table poisoned".into()))?;
        for (doc, path) in documents.iter().zip(page) {
            archives.insert(doc.id.clone(), path.clone());
        }

        Ok(DocumentPage {
            documents,
            next_page_token: (end < paths.len()).then(|| end.to_string()),
        })
    }

    fn export(&self, id: &str) -> Result<Vec<u8>, SourceError> {
        let path = self
            .archives
            .lock()
            .map_err(|_| SourceError::Listing("archive table poisoned".into()))?
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        Ok(std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::list_documents;
    use crate::test_helpers::zip_archive;
    use std::fs;
    use tempfile::TempDir;

    fn folder_with(ids: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for id in ids {
            let markup = format!("{id}.html");
            fs::write(
                tmp.path().join(format!("{id}.zip")),
                zip_archive(&[(markup.as_str(), b"<p>x</p>".as_slice())]),
            )
            .unwrap();
        }
        tmp
    }

    #[test]
    fn lists_archives_sorted_with_sidecar_names() {
        let tmp = folder_with(&["b", "a"]);
        fs::write(tmp.path().join("a.txt"), "  First post \n").unwrap();
        fs::write(tmp.path().join("notes.md"), "ignored").unwrap();

        let source = LocalFolderSource::new(100);
        let docs = list_documents(&source, tmp.path().to_str().unwrap()).unwrap();
        let pairs: Vec<_> = docs.iter().map(|d| (d.id.as_str(), d.name.as_str())).collect();
        assert_eq!(pairs, vec![("a", "First post"), ("b", "b")]);
    }

    #[test]
    fn pages_by_page_size() {
        let tmp = folder_with(&["a", "b", "c"]);
        let folder = tmp.path().to_str().unwrap();
        let source = LocalFolderSource::new(2);

        let first = source.list_page(folder, None).unwrap();
        assert_eq!(first.documents.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let second = source.list_page(folder, Some("2")).unwrap();
        assert_eq!(second.documents.len(), 1);
        assert_eq!(second.documents[0].id, "c");
        assert_eq!(second.next_page_token, None);
    }

    #[test]
    fn bad_page_token_rejected() {
        let tmp = folder_with(&["a"]);
        let source = LocalFolderSource::new(10);
        assert!(matches!(
            source.list_page(tmp.path().to_str().unwrap(), Some("next")),
            Err(SourceError::Listing(_))
        ));
    }

    #[test]
    fn export_serves_listed_documents_only() {
        let tmp = folder_with(&["a"]);
        let source = LocalFolderSource::new(10);
        assert!(matches!(source.export("a"), Err(SourceError::NotFound(_))));

        list_documents(&source, tmp.path().to_str().unwrap()).unwrap();
        let bytes = source.export("a").unwrap();
        assert_eq!(bytes, fs::read(tmp.path().join("a.zip")).unwrap());
    }

    #[test]
    fn missing_folder_is_not_found() {
        let source = LocalFolderSource::new(10);
        assert!(matches!(
            source.list_page("/nonexistent/docblog", None),
            Err(SourceError::NotFound(_))
        ));
    }
}
