//! Inspect report types and terminal formatting.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

const BOX_WIDTH: usize = 59;

/// The result of inspecting a snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct InspectReport {
    /// Size and age of the snapshot.
    pub summary: SummarySection,
    /// Per-column fill statistics.
    pub columns: ColumnsSection,
    /// Display options for formatting.
    #[serde(skip)]
    pub(crate) bar_width: usize,
}

/// Size and age of the snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct SummarySection {
    /// Dataset identifier or cache path.
    pub source: String,
    /// Number of data rows.
    pub rows: usize,
    /// Number of columns.
    pub columns: usize,
    /// Local time the table was fetched.
    pub last_updated: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct ColumnsSection {
    pub total_columns: usize,
    pub rows: usize,
    /// Columns in table order, capped at the requested count.
    pub entries: Vec<ColumnFill>,
}

/// How many cells of one column hold a value.
#[derive(Clone, Debug, Serialize)]
pub struct ColumnFill {
    pub name: String,
    /// Cells that are non-empty after trimming whitespace.
    pub filled: usize,
    /// Distinct non-empty values.
    pub distinct: usize,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "╭─────────────────────────────────────────────────────────────╮")?;
        writeln!(f, "│                  Dataset Snapshot Report                    │")?;
        writeln!(f, "╰─────────────────────────────────────────────────────────────╯")?;
        writeln!(f)?;

        self.fmt_summary(f)?;
        writeln!(f)?;
        self.fmt_columns(f)?;

        Ok(())
    }
}

impl InspectReport {
    fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;

        open_box(f, "Summary")?;
        boxed(f, &format!("  Source:        {}", truncate_label(&s.source, 40)))?;
        boxed(f, &format!("  Rows:          {:>8}", format_number(s.rows)))?;
        boxed(f, &format!("  Columns:       {:>8}", format_number(s.columns)))?;
        boxed(
            f,
            &format!("  Last updated:  {}", s.last_updated.format("%Y-%m-%d %H:%M:%S")),
        )?;
        close_box(f)
    }

    fn fmt_columns(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.columns;

        let header = if c.total_columns > c.entries.len() {
            format!("Columns (first {} of {})", c.entries.len(), c.total_columns)
        } else {
            format!("Columns ({})", c.total_columns)
        };
        open_box(f, &header)?;

        if c.entries.is_empty() {
            boxed(f, "  No columns found.")?;
        } else {
            for entry in &c.entries {
                let bar = render_bar(entry.filled, c.rows, self.bar_width);
                boxed(
                    f,
                    &format!(
                        "  {:<16} {:>7} {:>6}  {}",
                        truncate_label(&entry.name, 16),
                        format_number(entry.distinct),
                        fmt_percent(entry.filled, c.rows),
                        bar
                    ),
                )?;
            }
        }

        close_box(f)
    }
}

fn open_box(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    let fill = BOX_WIDTH.saturating_sub(title.chars().count() + 2);
    writeln!(f, "┌─ {} {}┐", title, "─".repeat(fill))?;
    boxed(f, "")
}

fn close_box(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    boxed(f, "")?;
    writeln!(f, "└{}┘", "─".repeat(BOX_WIDTH))
}

fn boxed(f: &mut fmt::Formatter<'_>, content: &str) -> fmt::Result {
    let padding = BOX_WIDTH.saturating_sub(content.chars().count());
    writeln!(f, "│{}{}│", content, " ".repeat(padding))
}

/// Format a number with thousands separators.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a percentage, handling zero denominators.
fn fmt_percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", (numerator as f64 / denominator as f64) * 100.0)
    }
}

/// Render a horizontal bar using Unicode block characters.
fn render_bar(count: usize, max_count: usize, width: usize) -> String {
    if max_count == 0 || width == 0 {
        return String::new();
    }

    let filled = ((count * width) / max_count).min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

/// Truncate a label to fit in the display column.
fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() <= max_len {
        label.to_string()
    } else {
        let kept: String = label.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
