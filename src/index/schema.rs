//! Column schema of the index grid.
//!
//! The order, header names, pixel widths and cell codecs of every column live
//! in [`COLUMNS`], which both the read and the write path walk; adding or
//! reordering a column is a change to that table alone.
//!
//! A grid's own header decides where each column sits ([`ColumnLayout`]), so
//! an operator may reorder columns, and a grid created before a column existed
//! is still read and written in its own shape. A header without an `Id`
//! column is refused outright.
//!
//! | # | Header | Width | Cell |
//! |---|--------|-------|------|
//! | A | Id | 350 | `=HYPERLINK(url, id)` |
//! | B | Name | 300 | text |
//! | C | Date | 100 | serial date, `yyyy-mm-dd` |
//! | D | Last modified | 100 | serial date, `yyyy-mm-dd` |
//! | E | Published | 90 | boolean |
//! | F | Description | 800 | text, wrapped |
//!
//! ## Dates
//!
//! Dates are written as the grid's native serial number: fractional days
//! since 1899-12-30T00:00:00Z, kept to the millisecond. A text cell in a date
//! column is rejected rather than guessed at, so a row typed by hand in some
//! locale format shows up as a row error instead of a silently wrong date.

use crate::grid::{Cell, CellFormat, CellValue, HorizontalAlign, Row, hyperlink_formula};
use crate::types::MetadataRecord;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Serial number of 1970-01-01.
const UNIX_EPOCH_SERIAL: f64 = 25_569.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;
const DATE_PATTERN: &str = "yyyy-mm-dd";
const DOCUMENT_URL_BASE: &str = "https://docs.google.com/document/d/";

/// What is wrong with one cell of a data row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CellError {
    #[error("row has no identifier")]
    MissingId,
    #[error("missing cell for column '{0}'")]
    Missing(&'static str),
    #[error("column '{column}': '{value}' is not a serial date")]
    InvalidDate { column: &'static str, value: String },
    #[error("column '{column}': '{value}' is not a boolean")]
    InvalidBool { column: &'static str, value: String },
}

type Encode = fn(&MetadataRecord) -> Cell;
type Decode = fn(&'static str, &Cell, &mut MetadataRecord) -> Result<(), CellError>;

pub struct Column {
    pub name: &'static str,
    pub width: u32,
    pub encode: Encode,
    pub decode: Decode,
}

pub const COLUMNS: &[Column] = &[
    Column {
        name: "Id",
        width: 350,
        encode: encode_id,
        decode: decode_id,
    },
    Column {
        name: "Name",
        width: 300,
        encode: |r| Cell::text(&r.title),
        decode: |_, cell, r| {
            r.title = cell.display();
            Ok(())
        },
    },
    Column {
        name: "Date",
        width: 100,
        encode: |r| encode_date(r.created),
        decode: |column, cell, r| {
            r.created = decode_date(column, cell)?;
            Ok(())
        },
    },
    Column {
        name: "Last modified",
        width: 100,
        encode: |r| encode_date(r.modified),
        decode: |column, cell, r| {
            r.modified = decode_date(column, cell)?;
            Ok(())
        },
    },
    Column {
        name: "Published",
        width: 90,
        encode: |r| {
            Cell::bool(r.published).with_format(CellFormat {
                align: HorizontalAlign::Center,
                ..Default::default()
            })
        },
        decode: decode_published,
    },
    Column {
        name: "Description",
        width: 800,
        encode: |r| {
            Cell::text(&r.description).with_format(CellFormat {
                wrap: true,
                ..Default::default()
            })
        },
        decode: |_, cell, r| {
            r.description = cell.display();
            Ok(())
        },
    },
];

/// Canonical URL of a document, linked from the identifier cell.
pub fn document_url(id: &str) -> String {
    format!("{DOCUMENT_URL_BASE}{id}")
}

/// Bold header row, one cell per column.
pub fn header_row() -> Row {
    COLUMNS
        .iter()
        .map(|c| {
            Cell::text(c.name).with_format(CellFormat {
                bold: true,
                ..Default::default()
            })
        })
        .collect()
}

pub fn column_widths() -> Vec<u32> {
    COLUMNS.iter().map(|c| c.width).collect()
}

/// True when the displayed header names match the schema, in order.
/// Extra trailing columns are tolerated.
pub fn header_matches(row: &[Cell]) -> bool {
    row.len() >= COLUMNS.len()
        && COLUMNS
            .iter()
            .zip(row)
            .all(|(column, cell)| cell.display().trim().eq_ignore_ascii_case(column.name))
}

/// Where each of [`COLUMNS`] sits in one grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    positions: Vec<Option<usize>>,
    width: usize,
}

impl ColumnLayout {
    /// The layout of a grid created with [`header_row`].
    pub fn canonical() -> Self {
        Self {
            positions: (0..COLUMNS.len()).map(Some).collect(),
            width: COLUMNS.len(),
        }
    }

    /// Match header cells to columns by name, ignoring case.
    ///
    /// `None` when no header cell names the identifier column.
    pub fn from_header(header: &[Cell]) -> Option<Self> {
        let names: Vec<String> = header.iter().map(|c| c.display().trim().to_string()).collect();
        let positions: Vec<Option<usize>> = COLUMNS
            .iter()
            .map(|column| names.iter().position(|n| n.eq_ignore_ascii_case(column.name)))
            .collect();
        positions.first().copied().flatten()?;
        Some(Self {
            positions,
            width: header.len(),
        })
    }

    /// Cells per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Headers of the columns this grid does not have.
    pub fn missing(&self) -> Vec<&'static str> {
        COLUMNS
            .iter()
            .zip(&self.positions)
            .filter(|(_, position)| position.is_none())
            .map(|(column, _)| column.name)
            .collect()
    }

    /// True when `position` holds one of [`COLUMNS`]; other cells belong to
    /// the operator.
    pub fn is_known(&self, position: usize) -> bool {
        self.positions.contains(&Some(position))
    }
}

pub fn encode_row(record: &MetadataRecord) -> Row {
    encode_row_in(record, &ColumnLayout::canonical())
}

/// Encode `record` into a row shaped like `layout`; cells of unknown columns
/// are left empty.
pub fn encode_row_in(record: &MetadataRecord, layout: &ColumnLayout) -> Row {
    let mut row = vec![Cell::empty(); layout.width];
    for (column, position) in COLUMNS.iter().zip(&layout.positions) {
        if let Some(position) = *position
            && let Some(cell) = row.get_mut(position)
        {
            *cell = (column.encode)(record);
        }
    }
    row
}

/// Decode a data row.
///
/// `Err` means the row has no usable identifier and produced no record.
/// Otherwise the record holds every field that decoded, and the error list
/// names the cells that did not.
pub fn decode_row(row: &[Cell]) -> Result<(MetadataRecord, Vec<CellError>), CellError> {
    decode_row_in(row, &ColumnLayout::canonical())
}

/// [`decode_row`] for a row shaped like `layout`. Columns the grid lacks keep
/// their [`MetadataRecord::new`] value.
pub fn decode_row_in(
    row: &[Cell],
    layout: &ColumnLayout,
) -> Result<(MetadataRecord, Vec<CellError>), CellError> {
    let mut record = MetadataRecord::new(String::new());
    let id_cell = layout
        .positions
        .first()
        .copied()
        .flatten()
        .and_then(|position| row.get(position));
    let (Some(id_column), Some(id_cell)) = (COLUMNS.first(), id_cell) else {
        return Err(CellError::MissingId);
    };
    (id_column.decode)(id_column.name, id_cell, &mut record)?;

    let mut errors = Vec::new();
    for (column, position) in COLUMNS.iter().zip(&layout.positions).skip(1) {
        let Some(position) = *position else {
            continue;
        };
        match row.get(position) {
            Some(cell) => {
                if let Err(e) = (column.decode)(column.name, cell, &mut record) {
                    errors.push(e);
                }
            }
            None => errors.push(CellError::Missing(column.name)),
        }
    }
    Ok((record, errors))
}

fn encode_id(record: &MetadataRecord) -> Cell {
    Cell::formula(hyperlink_formula(&document_url(&record.id), &record.id)).with_format(
        CellFormat {
            link: Some(document_url(&record.id)),
            ..Default::default()
        },
    )
}

fn decode_id(_: &'static str, cell: &Cell, record: &mut MetadataRecord) -> Result<(), CellError> {
    let id = cell.display().trim().to_string();
    if id.is_empty() {
        return Err(CellError::MissingId);
    }
    record.id = id;
    Ok(())
}

fn encode_date(date: Option<DateTime<Utc>>) -> Cell {
    match date {
        Some(date) => Cell::number(to_serial(date)).with_format(CellFormat {
            number_pattern: Some(DATE_PATTERN.to_string()),
            ..Default::default()
        }),
        None => Cell::empty(),
    }
}

fn decode_date(column: &'static str, cell: &Cell) -> Result<Option<DateTime<Utc>>, CellError> {
    if cell.is_empty() {
        return Ok(None);
    }
    let invalid = || CellError::InvalidDate {
        column,
        value: cell.display(),
    };
    match cell.value {
        CellValue::Number(serial) => from_serial(serial).map(Some).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// An empty cell means published; only an explicit false hides.
fn decode_published(
    column: &'static str,
    cell: &Cell,
    record: &mut MetadataRecord,
) -> Result<(), CellError> {
    record.published = match &cell.value {
        CellValue::Empty => true,
        CellValue::Bool(b) => *b,
        CellValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => {
                return Err(CellError::InvalidBool {
                    column,
                    value: s.clone(),
                });
            }
        },
        CellValue::Number(n) => *n != 0.0,
        CellValue::Formula(f) => {
            return Err(CellError::InvalidBool {
                column,
                value: f.clone(),
            });
        }
    };
    Ok(())
}

pub fn to_serial(date: DateTime<Utc>) -> f64 {
    date.timestamp_millis() as f64 / MILLIS_PER_DAY + UNIX_EPOCH_SERIAL
}

pub fn from_serial(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() {
        return None;
    }
    let millis = ((serial - UNIX_EPOCH_SERIAL) * MILLIS_PER_DAY).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}
