//! Text rendering of query results.
//!
//! [`format_results`] turns a [`ResultSet`] into one pipe-separated text
//! block with a header, a dashed separator and at most `max_rows` data
//! lines; [`chunk`] then splits that block for size-limited transports.
//! Search hits are rendered one per message by [`format_record`].

mod chunk;
mod record;

pub use chunk::{chunk, escape_html, Chunk, Markup, OutputChunker, DEFAULT_CHUNK_LENGTH};
pub use record::{format_record, EMPTY_RECORD, SNIPPET_LENGTH};

use crate::db::ResultSet;

/// Returned instead of a table when the statement produced no columns.
pub const NO_RESULTS: &str = "(no results)";

const CELL_SEPARATOR: &str = " | ";

/// Renders a result set with at most `max_rows` data lines.
///
/// When rows were cut, a final `... N rows omitted ...` line states how many.
pub fn format_results(result: &ResultSet, max_rows: usize) -> String {
    if result.columns.is_empty() {
        return NO_RESULTS.to_string();
    }

    let header = result
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(CELL_SEPARATOR);
    let separator = "-".repeat(header.chars().count());

    let mut lines = Vec::with_capacity(result.rows.len().min(max_rows) + 3);
    lines.push(header);
    lines.push(separator);

    for row in result.rows.iter().take(max_rows) {
        let cells: Vec<String> = row.iter().map(|v| v.to_display_string()).collect();
        lines.push(cells.join(CELL_SEPARATOR));
    }

    if result.rows.len() > max_rows {
        lines.push(omitted_marker(result.rows.len() - max_rows));
    }

    lines.join("\n")
}

fn omitted_marker(count: usize) -> String {
    format!("... {count} rows omitted ...")
}
