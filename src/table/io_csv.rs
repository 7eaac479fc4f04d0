//! CSV reader and writer for [`Table`].
//!
//! The first record is always treated as the header row. Records must all have
//! the same number of fields as the header; ragged files are rejected by the
//! underlying `csv` reader rather than padded.

use std::io::Read;

use super::Table;
use crate::error::DatasetError;

/// Reads a table from CSV bytes.
///
/// `source` names where the bytes came from (usually the resource URL) and is
/// only used in error messages.
pub fn from_csv_slice(bytes: &[u8], source: &str) -> Result<Table, DatasetError> {
    from_csv_reader(bytes, source)
}

/// Reads a table from a CSV string.
///
/// Useful for testing without I/O.
pub fn from_csv_str(csv_str: &str) -> Result<Table, DatasetError> {
    from_csv_slice(csv_str.as_bytes(), "<string>")
}

fn from_csv_reader<R: Read>(reader: R, source: &str) -> Result<Table, DatasetError> {
    let parse_err = |source_err: csv::Error| DatasetError::CsvParse {
        url: source.to_string(),
        source: source_err,
    };

    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(parse_err)?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    // The csv reader enforces equal record lengths, so this cannot fail for
    // anything it accepted.
    Table::new(headers, rows).ok_or_else(|| {
        DatasetError::InvalidArgument(format!("CSV from {source} is not rectangular"))
    })
}

/// Writes a table to a CSV string, header row first.
pub fn to_csv_string(table: &Table) -> Result<String, DatasetError> {
    let mut csv_writer = csv::Writer::from_writer(Vec::new());
    csv_writer
        .write_record(table.headers())
        .map_err(|source| DatasetError::CsvWrite { source })?;
    for row in table.rows() {
        csv_writer
            .write_record(row)
            .map_err(|source| DatasetError::CsvWrite { source })?;
    }

    let bytes = csv_writer
        .into_inner()
        .map_err(|e| DatasetError::Io(e.into_error()))?;

    String::from_utf8(bytes)
        .map_err(|e| DatasetError::InvalidArgument(format!("Invalid UTF-8 in CSV output: {e}")))
}
