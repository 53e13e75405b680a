//! In-memory workbook model
//!
//! A [`Workbook`] is owned by the render call that created it and handed to the
//! caller by value. Its sheets are released when it is dropped, on every exit
//! path, so there is no separate close step to forget.

use crate::cell::CellStyle;
use crate::header::Header;
use pathtab_format::{Cell, FlattenedRow, Limits, Result};

/// Workbook cell value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CellValue {
    /// No value
    #[default]
    Empty,
    /// Literal text
    Text(String),
    /// Spreadsheet formula, including the leading `=`
    Formula(String),
}

impl CellValue {
    /// Text of the cell, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(text) | CellValue::Formula(text) => Some(text),
        }
    }
}

/// One grid of cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Empty sheet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the cell at (`row`, `column`), growing the grid as needed
    pub fn set(&mut self, row: usize, column: usize, value: CellValue) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= column {
            cells.resize(column + 1, CellValue::Empty);
        }
        cells[column] = value;
    }

    /// Cell at (`row`, `column`); cells never set are empty
    pub fn get(&self, row: usize, column: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY)
    }

    /// Number of rows in use
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Widest row
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Collection of sheets
#[derive(Debug, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Empty workbook
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet and return it
    pub fn add_sheet(&mut self, name: impl Into<String>) -> &mut Sheet {
        self.sheets.push(Sheet::new(name));
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    /// Sheet at `index`
    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    /// All sheets
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }
}

impl Drop for Workbook {
    fn drop(&mut self) {
        if !self.sheets.is_empty() {
            tracing::debug!(sheets = self.sheets.len(), "releasing workbook");
        }
        self.sheets.clear();
    }
}

/// Build a one-sheet workbook
///
/// Headers go in row 0 with data from row 1; transposed, headers go down
/// column 0 with data from column 1. Cell text counts against the output limit.
pub fn build_workbook(
    headers: &[Header],
    rows: &[FlattenedRow],
    style: &CellStyle,
    transpose: bool,
    limits: &Limits,
) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("Sheet1");
    let mut layout = Layout {
        transpose,
        limits,
        written: 0,
    };

    for (column, header) in headers.iter().enumerate() {
        layout.place(sheet, 0, column, CellValue::Text(header.display.clone()))?;
    }
    for (index, row) in rows.iter().enumerate() {
        for (column, header) in headers.iter().enumerate() {
            let value = cell_value(row.get(&header.raw), style)?;
            if value != CellValue::Empty {
                layout.place(sheet, index + 1, column, value)?;
            }
        }
    }
    Ok(workbook)
}

struct Layout<'l> {
    transpose: bool,
    limits: &'l Limits,
    written: usize,
}

impl Layout<'_> {
    /// `line` is the record index (0 for headers), `position` the field index
    fn place(&mut self, sheet: &mut Sheet, line: usize, position: usize, value: CellValue) -> Result<()> {
        self.written += value.as_str().map_or(0, str::len);
        self.limits.check_output(self.written)?;
        if self.transpose {
            sheet.set(position, line, value);
        } else {
            sheet.set(line, position, value);
        }
        Ok(())
    }
}

fn cell_value(cell: Option<&Cell>, style: &CellStyle) -> Result<CellValue> {
    Ok(match cell {
        None | Some(Cell::Null) => CellValue::Empty,
        Some(Cell::Formula(text)) => CellValue::Formula(text.clone()),
        Some(cell @ Cell::Text(text)) => {
            let rendered = style.cell(Some(cell))?;
            if text.starts_with('=') && rendered == *text {
                CellValue::Formula(rendered)
            } else {
                CellValue::Text(rendered)
            }
        }
    })
}
