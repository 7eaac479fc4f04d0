//! Snapshot inspection.
//!
//! This module summarizes a loaded [`Snapshot`]: its size, when it was
//! fetched, and how well populated each column is.

mod report;

pub use report::{ColumnFill, ColumnsSection, InspectReport, SummarySection};

use std::collections::HashSet;

use crate::dataset::Snapshot;

/// Options for snapshot inspection.
#[derive(Clone, Debug)]
pub struct InspectOptions {
    /// Number of columns to list in the fill table.
    pub top_columns: usize,
    /// Width of fill bars (in characters).
    pub bar_width: usize,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            top_columns: 20,
            bar_width: 20,
        }
    }
}

/// Inspect a snapshot and produce a report.
///
/// `source` describes where the snapshot came from (a dataset identifier or a
/// cache file path) and is shown in the report header.
pub fn inspect_snapshot(
    snapshot: &Snapshot,
    source: impl Into<String>,
    opts: &InspectOptions,
) -> InspectReport {
    let table = &snapshot.table;

    let summary = SummarySection {
        source: source.into(),
        rows: table.len(),
        columns: table.column_count(),
        last_updated: snapshot.last_updated,
    };

    let mut fills: Vec<ColumnFill> = table
        .headers()
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let mut distinct: HashSet<&str> = HashSet::new();
            let mut filled = 0;
            for row in table.rows() {
                let cell = row[index].trim();
                if !cell.is_empty() {
                    filled += 1;
                    distinct.insert(cell);
                }
            }
            ColumnFill {
                name: name.clone(),
                filled,
                distinct: distinct.len(),
            }
        })
        .collect();

    let total_columns = fills.len();
    fills.truncate(opts.top_columns);

    InspectReport {
        summary,
        columns: ColumnsSection {
            total_columns,
            rows: table.len(),
            entries: fills,
        },
        bar_width: opts.bar_width,
    }
}
