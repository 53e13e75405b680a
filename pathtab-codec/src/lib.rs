//! pathtab codec - Flatten and reconstruct engines
//!
//! This crate provides the engines that move values between nested trees and
//! path-keyed rows:
//!
//! - Node classification (scalar, sequence, mapping, bean)
//! - Fail-open conversion of values into generic trees
//! - Flattening values into tabular datasets
//! - Reconstructing trees from path-keyed entries
//! - Mappers, their declarative configuration, and the resolution cache
//! - Declared-type hints for set-like sequences and per-type filters

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod classify;
pub mod flatten;
pub mod mapper;
pub mod reconstruct;
pub mod tree;
pub mod type_hint;

// Re-export commonly used types
pub use pathtab_format::{
    Cell, FlattenedRow, Limits, NodeKind, PathTabError, RenderConfig, Result, TabularDataset,
};

// Re-export our own types
pub use classify::{probe_kind, NodeClassifier, ScalarRule};
pub use flatten::Flattener;
pub use mapper::{
    CapabilityRegistry, DateMode, FieldFilter, Mapper, MapperCache, MapperConfig,
    MapperConfigBuilder, MapperModule, OutputFormat,
};
pub use reconstruct::{
    reconstruct, reconstruct_into, reconstruct_row, reconstruct_with_separator, Reconstructor,
};
pub use tree::lenient_tree;
pub use type_hint::{Described, TypeHint};

use serde::Serialize;

/// Flatten `value` with a mapper resolved from `mapper_config` through the global cache
///
/// # Errors
///
/// Fails if the mapper configuration names an unknown graph or the row limit
/// is passed.
pub fn flatten<T: Serialize + ?Sized>(
    value: &T,
    config: &RenderConfig,
    mapper_config: &MapperConfig,
) -> Result<TabularDataset> {
    let mapper = MapperCache::global().resolve(mapper_config)?;
    Flattener::new(config, &mapper).flatten(value)
}
