//! Cell and header text per emission target

use crate::csv::quote_field;
use pathtab_format::escape::html_escape;
use pathtab_format::{Cell, FormulaPolicy, QuoteMode, Result};

/// Escaping context of a text target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Delimited text with this delimiter
    Csv(char),
    /// HTML markup
    Html,
    /// No escaping (flattened JSON, workbook)
    Plain,
}

/// Quoting and formula settings shared by every cell of one render
#[derive(Debug, Clone, Copy)]
pub struct CellStyle {
    /// Escaping context
    pub target: Target,
    /// Quoting mode
    pub quoting: QuoteMode,
    /// Treatment of `=`-prefixed text
    pub formulas: FormulaPolicy,
}

impl CellStyle {
    /// Display text of a header
    ///
    /// CSV headers are quoted only when needed, even under [`QuoteMode::Always`].
    pub fn header(&self, raw: &str) -> Result<String> {
        Ok(match (self.quoting, self.target) {
            (QuoteMode::Never, _) | (_, Target::Plain) => raw.to_string(),
            (_, Target::Csv(delimiter)) => quote_field(raw, delimiter, QuoteMode::Escape)?,
            (_, Target::Html) => html_escape(raw),
        })
    }

    /// Text of a cell; absent cells render like nulls
    ///
    /// Formula cells produced by the flattener are always emitted verbatim.
    /// Other text beginning with `=` is verbatim only under
    /// [`FormulaPolicy::Passthrough`]; otherwise it is prefixed with `'`.
    ///
    /// # Errors
    ///
    /// Fails only when the CSV delimiter is not a single byte.
    pub fn cell(&self, cell: Option<&Cell>) -> Result<String> {
        match cell {
            None | Some(Cell::Null) => Ok(match self.target {
                Target::Html => "&nbsp;".to_string(),
                _ => String::new(),
            }),
            Some(Cell::Formula(text)) => Ok(text.clone()),
            Some(Cell::Text(text)) if text.starts_with('=') => match self.formulas {
                FormulaPolicy::Passthrough => Ok(text.clone()),
                FormulaPolicy::Neutralize => self.text(&format!("'{}", text)),
            },
            Some(Cell::Text(text)) => self.text(text),
        }
    }

    fn text(&self, text: &str) -> Result<String> {
        match (self.quoting, self.target) {
            (QuoteMode::Always, Target::Csv(delimiter)) => {
                quote_field(text, delimiter, QuoteMode::Always)
            }
            (QuoteMode::Always, _) => quote_field(text, ',', QuoteMode::Always),
            (QuoteMode::Never, _) | (QuoteMode::Escape, Target::Plain) => Ok(text.to_string()),
            (QuoteMode::Escape, Target::Csv(delimiter)) => {
                quote_field(text, delimiter, QuoteMode::Escape)
            }
            (QuoteMode::Escape, Target::Html) => Ok(html_escape(text)),
        }
    }
}
