//! In-memory tabular data.
//!
//! A [`Table`] is what a catalog resource turns into after download: an ordered
//! list of column names and the rows beneath them. Cells are kept as the raw
//! strings found in the source so that a cached table is byte-for-byte what was
//! fetched.

pub mod io_csv;

use serde::{Deserialize, Serialize};

pub use io_csv::{from_csv_slice, from_csv_str, to_csv_string};

/// A rectangular table of string cells.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableParts")]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Unchecked form used while deserializing.
#[derive(Deserialize)]
struct TableParts {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TryFrom<TableParts> for Table {
    type Error = String;

    fn try_from(parts: TableParts) -> Result<Self, Self::Error> {
        let columns = parts.headers.len();
        Table::new(parts.headers, parts.rows)
            .ok_or_else(|| format!("table rows must each have {columns} cells"))
    }
}

impl Table {
    /// Creates a table from headers and rows.
    ///
    /// Returns `None` if any row has a different number of cells than there
    /// are headers.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Option<Self> {
        if rows.iter().any(|row| row.len() != headers.len()) {
            return None;
        }
        Some(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows (the header row is not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Position of the first column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Iterates over the cells of the column named `name`.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[index].as_str()))
    }

    /// The cell at `row` in the column named `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|cells| cells[index].as_str())
    }
}
