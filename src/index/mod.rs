//! Metadata index store.
//!
//! The index is a grid document in the source folder with one header row and
//! one data row per document. Operators edit it by hand to override titles,
//! dates and descriptions or to hide a post; every run reads it, reconciles it
//! with the live document listing, and writes the reconciled set back.
//!
//! ```text
//! open ──► read_all ──► merge_all(listing, index) ──► ... ──► write_all
//! ```
//!
//! ## Failure Semantics
//!
//! Grid transport errors, an ambiguous index (two grids with the index name)
//! and a header without an `Id` column abort the run before anything is
//! written. Malformed rows do not: [`IndexStore::read_all`]
//! returns every record it could decode together with a list of
//! [`RowError`]s, and a row with a bad date still yields a record with the
//! remaining fields.
//!
//! ## Merge Precedence
//!
//! | Field | Winner |
//! |-------|--------|
//! | id | listing |
//! | title | index if non-blank, else listing |
//! | date, last modified | index if set, else listing |
//! | description | index if non-blank, else listing |
//! | published | hidden if the index says so |
//!
//! Documents only in the listing pass through. Documents only in the index
//! are dropped, and disappear from the grid on the next [`IndexStore::write_all`].

pub mod schema;

use crate::grid::{Cell, GridData, GridError, GridHandle, GridService, GridSpec, Row};
use crate::types::{DocumentDescriptor, MetadataRecord};
use schema::{CellError, ColumnLayout};
use std::collections::HashMap;
use thiserror::Error;

pub use schema::document_url;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
    #[error("Ambiguous index: {count} grids named '{name}' in folder {folder}")]
    Ambiguous {
        folder: String,
        name: String,
        count: usize,
    },
    #[error("Index grid {grid} has no 'Id' column in its header row")]
    HeaderMismatch { grid: String },
}

/// A row that could not be fully decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based grid row number; the header is row 1.
    pub row: usize,
    /// Identifier of the row, when it had one.
    pub id: Option<String>,
    pub kind: RowErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowErrorKind {
    #[error(transparent)]
    Cell(#[from] CellError),
    #[error("duplicate of row {0}")]
    Duplicate(usize),
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "row {} ({id}): {}", self.row, self.kind),
            None => write!(f, "row {}: {}", self.row, self.kind),
        }
    }
}

/// Everything [`IndexStore::read_all`] recovered from the grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSnapshot {
    pub records: Vec<MetadataRecord>,
    pub errors: Vec<RowError>,
    /// False when the header row does not name the expected columns.
    pub header_ok: bool,
}

#[derive(Debug, Clone)]
pub struct IndexSettings {
    /// Grid document name to look for and create.
    pub name: String,
    pub sheet_title: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            name: "index".to_string(),
            sheet_title: "Docblog configuration".to_string(),
        }
    }
}

/// Handle on the index grid of one folder.
pub struct IndexStore<'a, G: GridService + ?Sized> {
    grid: &'a G,
    handle: GridHandle,
}

impl<'a, G: GridService + ?Sized> IndexStore<'a, G> {
    /// Find the folder's index grid, creating it with the canonical header
    /// when there is none.
    pub fn open(grid: &'a G, folder_id: &str, settings: &IndexSettings) -> Result<Self, IndexError> {
        if let Some(store) = Self::find(grid, folder_id, settings)? {
            return Ok(store);
        }
        let spec = GridSpec {
            name: settings.name.clone(),
            sheet_title: settings.sheet_title.clone(),
            header: schema::header_row(),
            column_widths: schema::column_widths(),
        };
        let handle = grid.create_grid(folder_id, &spec)?;
        tracing::info!(folder = folder_id, grid = %handle.0, "created index grid");
        Ok(Self { grid, handle })
    }

    /// Find the folder's index grid without creating one.
    pub fn find(
        grid: &'a G,
        folder_id: &str,
        settings: &IndexSettings,
    ) -> Result<Option<Self>, IndexError> {
        let mut found = grid.find_grids(folder_id, &settings.name)?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(Some(Self {
                grid,
                handle: found.remove(0),
            })),
            count => Err(IndexError::Ambiguous {
                folder: folder_id.to_string(),
                name: settings.name.clone(),
                count,
            }),
        }
    }

    pub fn handle(&self) -> &GridHandle {
        &self.handle
    }

    /// Decode every data row.
    ///
    /// Blank rows are skipped silently. Rows without an identifier and
    /// repeated identifiers produce no record; rows with bad cells produce a
    /// partial one. Either way the problem lands in `errors`.
    pub fn read_all(&self) -> Result<IndexSnapshot, IndexError> {
        let data = self.grid.read_grid(&self.handle)?;
        let layout = self.layout(&data)?;

        let header_ok = data.header().is_some_and(|h| schema::header_matches(h));
        if !header_ok {
            tracing::warn!(
                grid = %self.handle.0,
                missing = ?layout.missing(),
                "index header does not match the expected columns"
            );
        }

        let mut snapshot = IndexSnapshot {
            header_ok,
            ..Default::default()
        };
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (i, row) in data.data_rows().iter().enumerate() {
            let row_number = i + 2;
            if row.iter().all(|cell| cell.is_empty()) {
                continue;
            }

            let (record, cell_errors) = match schema::decode_row_in(row, &layout) {
                Ok(decoded) => decoded,
                Err(e) => {
                    snapshot.errors.push(RowError {
                        row: row_number,
                        id: None,
                        kind: e.into(),
                    });
                    continue;
                }
            };

            snapshot
                .errors
                .extend(cell_errors.into_iter().map(|e| RowError {
                    row: row_number,
                    id: Some(record.id.clone()),
                    kind: e.into(),
                }));

            if let Some(&first) = seen.get(&record.id) {
                snapshot.errors.push(RowError {
                    row: row_number,
                    id: Some(record.id.clone()),
                    kind: RowErrorKind::Duplicate(first),
                });
                continue;
            }
            seen.insert(record.id.clone(), row_number);
            snapshot.records.push(record);
        }

        tracing::debug!(
            records = snapshot.records.len(),
            errors = snapshot.errors.len(),
            "read index"
        );
        Ok(snapshot)
    }

    /// Replace the grid's data rows with `records`, in order.
    ///
    /// Rows keep the grid's own column layout. Cells in columns the index
    /// does not know are carried over from the previous row with the same
    /// identifier.
    pub fn write_all(&self, records: &[MetadataRecord]) -> Result<(), IndexError> {
        let data = self.grid.read_grid(&self.handle)?;
        let layout = self.layout(&data)?;

        let mut previous: HashMap<String, &Row> = HashMap::new();
        for row in data.data_rows() {
            if let Ok((record, _)) = schema::decode_row_in(row, &layout) {
                previous.entry(record.id).or_insert(row);
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut row = schema::encode_row_in(record, &layout);
                if let Some(old) = previous.get(&record.id) {
                    for (position, cell) in row.iter_mut().enumerate() {
                        if !layout.is_known(position)
                            && let Some(kept) = old.get(position)
                        {
                            *cell = kept.clone();
                        }
                    }
                }
                row
            })
            .collect();
        self.grid
            .replace_grid_contents(&self.handle, records.len() + 1, layout.width(), rows)?;
        tracing::debug!(records = records.len(), "wrote index");
        Ok(())
    }

    /// Column layout from the grid's header. A grid with no header (or a
    /// blank one) is read as canonical.
    fn layout(&self, data: &GridData) -> Result<ColumnLayout, IndexError> {
        match data.header() {
            Some(header) if !header.iter().all(Cell::is_empty) => ColumnLayout::from_header(header)
                .ok_or_else(|| IndexError::HeaderMismatch {
                    grid: self.handle.0.clone(),
                }),
            _ => Ok(ColumnLayout::canonical()),
        }
    }
}

/// Reconcile the listing's view of a document with its index row.
pub fn merge(listing: &MetadataRecord, index: Option<&MetadataRecord>) -> MetadataRecord {
    let Some(index) = index else {
        return listing.clone();
    };
    MetadataRecord {
        id: listing.id.clone(),
        title: prefer(&index.title, &listing.title),
        created: index.created.or(listing.created),
        modified: index.modified.or(listing.modified),
        description: prefer(&index.description, &listing.description),
        published: index.published && listing.published,
    }
}

/// Merge the whole listing against the index, in listing order.
pub fn merge_all(listing: &[DocumentDescriptor], index: &[MetadataRecord]) -> Vec<MetadataRecord> {
    let by_id: HashMap<&str, &MetadataRecord> =
        index.iter().map(|r| (r.id.as_str(), r)).collect();
    listing
        .iter()
        .map(|d| merge(&MetadataRecord::from_descriptor(d), by_id.get(d.id.as_str()).copied()))
        .collect()
}

/// First value that is not blank, as written.
fn prefer(primary: &str, fallback: &str) -> String {
    if primary.trim().is_empty() {
        fallback.to_string()
    } else {
        primary.to_string()
    }
}
