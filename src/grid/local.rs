//! Grids stored as `*.grid.json` files.
//!
//! The folder identifier is a directory path. Each grid is one JSON file in
//! that directory holding a serialized [`GridData`]; grids are found by the
//! `name` recorded inside the file, not by file name, so two grids with the
//! same name can coexist just as they can in a hosted drive.

use super::{Cell, GridData, GridError, GridHandle, GridService, GridSpec, Row};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const GRID_SUFFIX: &str = ".grid.json";
const DEFAULT_COLUMN_WIDTH: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct JsonGridService;

impl JsonGridService {
    pub fn new() -> Self {
        Self
    }

    fn path(handle: &GridHandle) -> &Path {
        Path::new(&handle.0)
    }

    fn load(path: &Path) -> Result<GridData, GridError> {
        if !path.exists() {
            return Err(GridError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write through a sibling temp file so a crash never leaves half a grid.
    fn store(path: &Path, data: &GridData) -> Result<(), GridError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(data)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// First free `{stem}.grid.json`, `{stem}-2.grid.json`, ...
    fn free_path(folder: &Path, name: &str) -> PathBuf {
        let stem = crate::naming::sanitize_slug(name);
        let stem = if stem.is_empty() { "grid".to_string() } else { stem };
        let mut candidate = folder.join(format!("{stem}{GRID_SUFFIX}"));
        let mut n = 2;
        while candidate.exists() {
            candidate = folder.join(format!("{stem}-{n}{GRID_SUFFIX}"));
            n += 1;
        }
        candidate
    }
}

impl GridService for JsonGridService {
    fn find_grids(&self, folder_id: &str, name: &str) -> Result<Vec<GridHandle>, GridError> {
        let folder = Path::new(folder_id);
        if !folder.is_dir() {
            return Err(GridError::NotFound(folder_id.to_string()));
        }

        let mut handles = Vec::new();
        for entry in WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| GridError::Service(e.to_string()))?;
            let is_grid = entry.file_type().is_file()
                && entry.file_name().to_string_lossy().ends_with(GRID_SUFFIX);
            if !is_grid {
                continue;
            }
            match Self::load(entry.path()) {
                Ok(data) if data.name == name => {
                    handles.push(GridHandle(entry.path().display().to_string()));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "unreadable grid file");
                }
            }
        }
        Ok(handles)
    }

    fn create_grid(&self, folder_id: &str, spec: &GridSpec) -> Result<GridHandle, GridError> {
        let folder = Path::new(folder_id);
        fs::create_dir_all(folder)?;
        let path = Self::free_path(folder, &spec.name);
        let data = GridData {
            name: spec.name.clone(),
            sheet_title: spec.sheet_title.clone(),
            column_widths: spec.column_widths.clone(),
            rows: vec![spec.header.clone()],
        };
        Self::store(&path, &data)?;
        Ok(GridHandle(path.display().to_string()))
    }

    fn read_grid(&self, handle: &GridHandle) -> Result<GridData, GridError> {
        Self::load(Self::path(handle))
    }

    fn replace_grid_contents(
        &self,
        handle: &GridHandle,
        row_count: usize,
        column_count: usize,
        rows: Vec<Row>,
    ) -> Result<(), GridError> {
        let path = Self::path(handle);
        let mut data = Self::load(path)?;

        let header = data.rows.first().cloned().unwrap_or_default();
        data.rows = std::iter::once(header)
            .chain(rows)
            .chain(std::iter::repeat_with(Row::new))
            .take(row_count)
            .map(|mut row| {
                row.resize_with(column_count, Cell::empty);
                row
            })
            .collect();
        data.column_widths.resize(column_count, DEFAULT_COLUMN_WIDTH);

        Self::store(path, &data)
    }
}
