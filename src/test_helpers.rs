//! Shared test utilities for the docblog test suite.
//!
//! In-memory stand-ins for the two external collaborators, plus builders for
//! descriptors and export archives. The doubles record every call so tests
//! can assert on the conversation with the service, not just its outcome.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let grid = MemoryGrid::new();
//! let source = MemorySource::paged(vec![vec![descriptor("abc", "Hello")]])
//!     .with_archive("abc", zip_archive(&[("abc.html", b"<p>hi</p>".as_slice())]));
//!
//! let summary = run(&source, &grid, None, &settings, None).unwrap();
//! assert!(matches!(grid.get_operations().last(), Some(GridOp::Replace { .. })));
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};

use crate::grid::{GridData, GridError, GridHandle, GridService, GridSpec, Row};
use crate::source::{DocumentPage, DocumentSource, SourceError};
use crate::types::DocumentDescriptor;

// =========================================================================
// Builders
// =========================================================================

/// A descriptor created 2024-03-01 and modified 2024-03-02.
pub fn descriptor(id: &str, name: &str) -> DocumentDescriptor {
    DocumentDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        created_time: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        modified_time: Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap(),
    }
}

/// Zip the given entries in order. Names ending in `/` become directories.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content).unwrap();
            }
        }
        zip.finish().unwrap();
    }
    buf
}

// =========================================================================
// Grid double
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum GridOp {
    Find { folder: String, name: String },
    Create { folder: String, name: String },
    Read(GridHandle),
    Replace {
        handle: GridHandle,
        row_count: usize,
        column_count: usize,
    },
}

/// Grid service over a vector of `(folder, data)` pairs.
/// Uses Mutex (not RefCell) so it is Sync like the real services.
#[derive(Default)]
pub struct MemoryGrid {
    grids: Mutex<Vec<(String, GridData)>>,
    operations: Mutex<Vec<GridOp>>,
    failure: Mutex<Option<String>>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grid directly, bypassing `create_grid`.
    pub fn insert(&self, folder: &str, name: &str, rows: Vec<Row>) -> GridHandle {
        let mut grids = self.grids.lock().unwrap();
        grids.push((
            folder.to_string(),
            GridData {
                name: name.to_string(),
                rows,
                ..Default::default()
            },
        ));
        GridHandle((grids.len() - 1).to_string())
    }

    /// Make the next call fail with a service error.
    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn data(&self, handle: &GridHandle) -> GridData {
        let index: usize = handle.0.parse().unwrap();
        self.grids.lock().unwrap()[index].1.clone()
    }

    pub fn grid_count(&self) -> usize {
        self.grids.lock().unwrap().len()
    }

    pub fn get_operations(&self) -> Vec<GridOp> {
        self.operations.lock().unwrap().clone()
    }

    fn record(&self, op: GridOp) -> Result<(), GridError> {
        self.operations.lock().unwrap().push(op);
        match self.failure.lock().unwrap().take() {
            Some(message) => Err(GridError::Service(message)),
            None => Ok(()),
        }
    }

    fn index_of(handle: &GridHandle) -> Result<usize, GridError> {
        handle
            .0
            .parse()
            .map_err(|_| GridError::NotFound(handle.0.clone()))
    }
}

impl GridService for MemoryGrid {
    fn find_grids(&self, folder_id: &str, name: &str) -> Result<Vec<GridHandle>, GridError> {
        self.record(GridOp::Find {
            folder: folder_id.to_string(),
            name: name.to_string(),
        })?;
        Ok(self
            .grids
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(_, (folder, data))| folder == folder_id && data.name == name)
            .map(|(i, _)| GridHandle(i.to_string()))
            .collect())
    }

    fn create_grid(&self, folder_id: &str, spec: &GridSpec) -> Result<GridHandle, GridError> {
        self.record(GridOp::Create {
            folder: folder_id.to_string(),
            name: spec.name.clone(),
        })?;
        let mut grids = self.grids.lock().unwrap();
        grids.push((
            folder_id.to_string(),
            GridData {
                name: spec.name.clone(),
                sheet_title: spec.sheet_title.clone(),
                column_widths: spec.column_widths.clone(),
                rows: vec![spec.header.clone()],
            },
        ));
        Ok(GridHandle((grids.len() - 1).to_string()))
    }

    fn read_grid(&self, handle: &GridHandle) -> Result<GridData, GridError> {
        self.record(GridOp::Read(handle.clone()))?;
        let index = Self::index_of(handle)?;
        self.grids
            .lock()
            .unwrap()
            .get(index)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| GridError::NotFound(handle.0.clone()))
    }

    fn replace_grid_contents(
        &self,
        handle: &GridHandle,
        row_count: usize,
        column_count: usize,
        rows: Vec<Row>,
    ) -> Result<(), GridError> {
        self.record(GridOp::Replace {
            handle: handle.clone(),
            row_count,
            column_count,
        })?;
        let index = Self::index_of(handle)?;
        let mut grids = self.grids.lock().unwrap();
        let (_, data) = grids
            .get_mut(index)
            .ok_or_else(|| GridError::NotFound(handle.0.clone()))?;
        let header = data.rows.first().cloned().unwrap_or_default();
        data.rows = std::iter::once(header)
            .chain(rows)
            .chain(std::iter::repeat_with(Row::new))
            .take(row_count)
            .collect();
        Ok(())
    }
}

// =========================================================================
// Source double
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SourceOp {
    List(Option<String>),
    Export(String),
}

/// Document source serving fixed pages; page tokens are page indexes.
#[derive(Default)]
pub struct MemorySource {
    pages: Vec<Vec<DocumentDescriptor>>,
    archives: HashMap<String, Vec<u8>>,
    operations: Mutex<Vec<SourceOp>>,
    failure: Mutex<Option<String>>,
}

impl MemorySource {
    pub fn paged(pages: Vec<Vec<DocumentDescriptor>>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn with_archive(mut self, id: &str, archive: Vec<u8>) -> Self {
        self.archives.insert(id.to_string(), archive);
        self
    }

    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn get_operations(&self) -> Vec<SourceOp> {
        self.operations.lock().unwrap().clone()
    }

    fn record(&self, op: SourceOp) -> Result<(), SourceError> {
        self.operations.lock().unwrap().push(op);
        match self.failure.lock().unwrap().take() {
            Some(message) => Err(SourceError::Listing(message)),
            None => Ok(()),
        }
    }
}

impl DocumentSource for MemorySource {
    fn list_page(
        &self,
        _folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, SourceError> {
        self.record(SourceOp::List(page_token.map(String::from)))?;
        let index: usize = page_token.map_or(0, |t| t.parse().unwrap());
        let next = index + 1;
        Ok(DocumentPage {
            documents: self.pages.get(index).cloned().unwrap_or_default(),
            next_page_token: (next < self.pages.len()).then(|| next.to_string()),
        })
    }

    fn export(&self, id: &str) -> Result<Vec<u8>, SourceError> {
        self.record(SourceOp::Export(id.to_string()))?;
        self.archives
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }
}
