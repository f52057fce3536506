//! Spreadsheet-like grid boundary.
//!
//! The metadata index lives in a grid document hosted next to the posts. This
//! module models what crosses that boundary (typed cells with formatting,
//! column widths, whole-grid reads and writes) and the [`GridService`] trait
//! every transport implements. The index store only ever talks to the trait.
//!
//! The bundled [`JsonGridService`] keeps grids as JSON files in a local
//! folder, which is enough to run the pipeline end to end without a hosted
//! spreadsheet service.

mod local;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::JsonGridService;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Grid not found: {0}")]
    NotFound(String),
    #[error("Grid service error: {0}")]
    Service(String),
}

/// Opaque reference to one grid document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridHandle(pub String);

/// Typed cell value, as entered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Formula(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    #[default]
    General,
    Left,
    Center,
    Right,
}

/// Rendering hints attached to a cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFormat {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub wrap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Number format pattern, e.g. `yyyy-mm-dd` for dates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_pattern: Option<String>,
    #[serde(skip_serializing_if = "is_general")]
    pub align: HorizontalAlign,
}

fn is_general(align: &HorizontalAlign) -> bool {
    *align == HorizontalAlign::General
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "is_default_format")]
    pub format: CellFormat,
}

fn is_default_format(format: &CellFormat) -> bool {
    *format == CellFormat::default()
}

impl Cell {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: CellValue::Text(value.into()),
            format: CellFormat::default(),
        }
    }

    pub fn number(value: f64) -> Self {
        Self {
            value: CellValue::Number(value),
            format: CellFormat::default(),
        }
    }

    pub fn bool(value: bool) -> Self {
        Self {
            value: CellValue::Bool(value),
            format: CellFormat::default(),
        }
    }

    pub fn formula(value: impl Into<String>) -> Self {
        Self {
            value: CellValue::Formula(value.into()),
            format: CellFormat::default(),
        }
    }

    pub fn with_format(mut self, format: CellFormat) -> Self {
        self.format = format;
        self
    }

    pub fn is_empty(&self) -> bool {
        match &self.value {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The value as a reader of the grid would see it.
    ///
    /// `HYPERLINK` formulas display their label; other formulas display
    /// their source text.
    pub fn display(&self) -> String {
        match &self.value {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::Formula(f) => hyperlink_label(f).unwrap_or_else(|| f.clone()),
        }
    }
}

/// Build a `=HYPERLINK("url", "label")` formula.
pub fn hyperlink_formula(url: &str, label: &str) -> String {
    format!(
        "=HYPERLINK(\"{}\", \"{}\")",
        url.replace('"', "\"\""),
        label.replace('"', "\"\"")
    )
}

/// Label of a `HYPERLINK` formula, or the URL when no label is given.
fn hyperlink_label(formula: &str) -> Option<String> {
    let body = formula.trim().strip_prefix('=')?.trim_start();
    let open = body.find('(')?;
    if !body[..open].trim().eq_ignore_ascii_case("HYPERLINK") {
        return None;
    }
    let args = formula_string_args(&body[open + 1..]);
    args.get(1).or_else(|| args.first()).cloned()
}

/// Quoted string arguments of a formula call, with `""` unescaped.
fn formula_string_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = args.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                let mut value = String::new();
                while let Some(c) = chars.next() {
                    if c == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            value.push('"');
                        } else {
                            break;
                        }
                    } else {
                        value.push(c);
                    }
                }
                out.push(value);
            }
            ')' => break,
            _ => {}
        }
    }
    out
}

pub type Row = Vec<Cell>;

/// Everything needed to create a new grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    /// Document name, used to find the grid again.
    pub name: String,
    /// Title of the (single) sheet.
    pub sheet_title: String,
    pub header: Row,
    pub column_widths: Vec<u32>,
}

/// Full contents of a grid: the header row first, then data rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridData {
    pub name: String,
    pub sheet_title: String,
    pub column_widths: Vec<u32>,
    pub rows: Vec<Row>,
}

impl GridData {
    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn data_rows(&self) -> &[Row] {
        self.rows.get(1..).unwrap_or_default()
    }
}

/// Transport for grid documents kept in a folder.
pub trait GridService {
    /// All grids in `folder_id` named `name`.
    fn find_grids(&self, folder_id: &str, name: &str) -> Result<Vec<GridHandle>, GridError>;

    /// Create a grid with a header row and column widths inside `folder_id`.
    fn create_grid(&self, folder_id: &str, spec: &GridSpec) -> Result<GridHandle, GridError>;

    fn read_grid(&self, handle: &GridHandle) -> Result<GridData, GridError>;

    /// Resize the grid to `row_count` × `column_count` and overwrite every row
    /// after the header with `rows`.
    fn replace_grid_contents(
        &self,
        handle: &GridHandle,
        row_count: usize,
        column_count: usize,
        rows: Vec<Row>,
    ) -> Result<(), GridError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyperlink_displays_label() {
        let cell = Cell::formula(hyperlink_formula("https://x/d/abc", "abc"));
        assert_eq!(cell.display(), "abc");
    }

    #[test]
    fn hyperlink_label_unescapes_quotes() {
        let cell = Cell::formula(hyperlink_formula("https://x", "say \"hi\""));
        assert_eq!(cell.display(), "say \"hi\"");
    }

    #[test]
    fn hyperlink_without_label_displays_url() {
        let cell = Cell::formula("=hyperlink(\"https://x\")");
        assert_eq!(cell.display(), "https://x");
    }

    #[test]
    fn other_formula_displays_source() {
        let cell = Cell::formula("=SUM(A1:A2)");
        assert_eq!(cell.display(), "=SUM(A1:A2)");
    }

    #[test]
    fn scalar_display() {
        assert_eq!(Cell::number(45000.5).display(), "45000.5");
        assert_eq!(Cell::bool(false).display(), "FALSE");
        assert_eq!(Cell::empty().display(), "");
    }

    #[test]
    fn blank_text_is_empty() {
        assert!(Cell::text("  ").is_empty());
        assert!(!Cell::bool(false).is_empty());
    }

    #[test]
    fn data_rows_skip_header() {
        let data = GridData {
            rows: vec![vec![Cell::text("Id")], vec![Cell::text("a")]],
            ..Default::default()
        };
        assert_eq!(data.header().unwrap()[0].display(), "Id");
        assert_eq!(data.data_rows().len(), 1);
        assert!(GridData::default().data_rows().is_empty());
    }

    #[test]
    fn cell_json_shape() {
        let json = serde_json::to_string(&Cell::text("x")).unwrap();
        assert_eq!(json, r#"{"value":{"type":"text","value":"x"}}"#);
        let back: Cell = serde_json::from_str(r#"{"value":{"type":"empty"}}"#).unwrap();
        assert_eq!(back, Cell::empty());
    }
}
