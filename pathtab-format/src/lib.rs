//! pathtab format - Core primitives for path-key flattening
//!
//! This crate provides the building blocks shared by the codec and renderer,
//! with no codec or I/O logic of its own. It includes:
//!
//! - Error types
//! - Output and traversal limits
//! - The path-key grammar (`a.b[2].c`, `a[*]`, `"literal.key"`)
//! - Node kinds and the flattened cell model
//! - Render configuration and skip rules
//! - CSV/HTML escaping
//! - Tabular datasets

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod escape;
pub mod limits;
pub mod node;
pub mod path_key;

// Re-export commonly used types
pub use config::{
    FormulaPolicy, OutputMode, QuoteMode, RenderConfig, RenderConfigBuilder, SkipRules,
    REGEX_PREFIX,
};
pub use dataset::{FlattenedRow, TabularDataset};
pub use error::{PathTabError, Result};
pub use limits::Limits;
pub use node::{Cell, NodeKind};
pub use path_key::{PathKey, PathSegment, PathStep, SegmentIndex, DEFAULT_SEPARATOR};
