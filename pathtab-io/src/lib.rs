//! pathtab I/O - Tabular rendering
//!
//! This crate turns values into tables:
//!
//! - Header finalization (escaping, sorting, pinning)
//! - Transposition
//! - CSV, HTML, and HTML-email text
//! - Flattened-JSON envelopes
//! - In-memory workbooks
//! - Data selection by JSON Pointer and skip-row expressions

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cell;
pub mod csv;
pub mod expression;
pub mod flat_json;
pub mod header;
pub mod html;
pub mod pointer;
pub mod renderer;
pub mod sink;
pub mod transpose;
pub mod workbook;

// Re-export commonly used types
pub use pathtab_codec::{Mapper, MapperCache, MapperConfig};
pub use pathtab_format::{
    FormulaPolicy, Limits, OutputMode, PathTabError, QuoteMode, RenderConfig, RenderConfigBuilder,
    Result, TabularDataset,
};

// Re-export our own types
pub use expression::{ExpressionEvaluator, SimpleExpression};
pub use renderer::{Phase, RenderOutput, TabularRenderer};
pub use workbook::{CellValue, Sheet, Workbook};

use serde::Serialize;
use std::io::Write;

/// Render `value` as text with a plain mapper
pub fn render_to_string<T: Serialize + ?Sized>(value: &T, config: &RenderConfig) -> Result<String> {
    TabularRenderer::new(config).render_to_string(value)
}

/// Render `value` as text into `writer` with a plain mapper, returning the bytes written
pub fn render_to_writer<T: Serialize + ?Sized, W: Write>(
    value: &T,
    config: &RenderConfig,
    writer: W,
) -> Result<usize> {
    TabularRenderer::new(config).render_to_writer(value, writer)
}
