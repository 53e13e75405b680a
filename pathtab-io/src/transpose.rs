//! Pivot a finalized table so each header becomes a row

use crate::header::{plain_headers, Header};
use pathtab_format::{Cell, FlattenedRow};

/// Column holding the original header names
pub const HEADER_COLUMN: &str = "header";

/// Label of transposed column `k` (1-indexed)
pub fn row_label(k: usize) -> String {
    format!("row{}", k)
}

/// Transpose `rows` under `headers`
///
/// The result has columns `header, row1..rowN` in that order, and one row per
/// original header in its finalized order. Callers escape the new headers
/// again; nothing from the untransposed header pass is reused.
pub fn transpose(headers: &[Header], rows: &[FlattenedRow]) -> (Vec<Header>, Vec<FlattenedRow>) {
    let columns = plain_headers(
        std::iter::once(HEADER_COLUMN.to_string()).chain((1..=rows.len()).map(row_label)),
    );

    let pivoted = headers
        .iter()
        .map(|header| {
            let mut row = FlattenedRow::new();
            row.insert(HEADER_COLUMN.to_string(), Cell::Text(header.raw.clone()));
            for (k, source) in rows.iter().enumerate() {
                if let Some(cell) = source.get(&header.raw) {
                    row.insert(row_label(k + 1), cell.clone());
                }
            }
            row
        })
        .collect();

    (columns, pivoted)
}
