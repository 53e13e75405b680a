//! Flattened rows and tabular datasets

use crate::node::Cell;
use std::collections::{BTreeMap, BTreeSet};

/// Header (path key or property name) to cell
pub type FlattenedRow = BTreeMap<String, Cell>;

/// Flattened headers plus rows
///
/// Headers are deduplicated here; their display order is decided at render time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularDataset {
    /// Every header observed or configured as always-included
    pub headers: BTreeSet<String>,
    /// One row per top-level element
    pub rows: Vec<FlattenedRow>,
}

impl TabularDataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row, registering its keys as headers
    pub fn push_row(&mut self, row: FlattenedRow) {
        for key in row.keys() {
            if !self.headers.contains(key) {
                self.headers.insert(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Register headers that must appear even if no row populates them
    pub fn include_headers<I, S>(&mut self, headers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers.extend(headers.into_iter().map(Into::into));
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (`row`, `header`), if present
    pub fn cell(&self, row: usize, header: &str) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_collects_headers() {
        let mut dataset = TabularDataset::new();
        let mut row = FlattenedRow::new();
        row.insert("id".to_string(), Cell::from("1"));
        row.insert("tags[0]".to_string(), Cell::from("a"));
        dataset.push_row(row);

        let mut second = FlattenedRow::new();
        second.insert("id".to_string(), Cell::from("2"));
        dataset.push_row(second);

        dataset.include_headers(["extra"]);

        let headers: Vec<_> = dataset.headers.iter().cloned().collect();
        assert_eq!(headers, vec!["extra", "id", "tags[0]"]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.cell(1, "id"), Some(&Cell::from("2")));
        assert_eq!(dataset.cell(1, "tags[0]"), None);
    }
}
