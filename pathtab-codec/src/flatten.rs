//! Flatten: nested trees to path-keyed rows
//!
//! A sequence root yields one row per element, anything else a single row.
//! Each row is built depth first: scalars are written under their path key,
//! sequences extend the path with an index, and mappings with a property name.

use crate::mapper::Mapper;
use pathtab_format::path_key::{join_index, join_property};
use pathtab_format::{Cell, FlattenedRow, NodeKind, RenderConfig, Result, TabularDataset};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Flattens values into a [`TabularDataset`] under one render configuration
#[derive(Debug, Clone, Copy)]
pub struct Flattener<'a> {
    config: &'a RenderConfig,
    mapper: &'a Mapper,
}

impl<'a> Flattener<'a> {
    /// Flattener using `mapper` for tree conversion and scalar rules
    pub fn new(config: &'a RenderConfig, mapper: &'a Mapper) -> Self {
        Self { config, mapper }
    }

    /// Flatten a typed value
    ///
    /// Parts of the value that fail to serialize are logged and left out; the
    /// rest still produces rows. A root that cannot be serialized at all
    /// contributes no rows, and the configured always-include headers are still
    /// present.
    ///
    /// # Errors
    ///
    /// Returns [`PathTabError::LimitExceeded`](pathtab_format::PathTabError::LimitExceeded)
    /// when the row limit is passed.
    pub fn flatten<T: Serialize + ?Sized>(&self, root: &T) -> Result<TabularDataset> {
        let probed = self.mapper.classifier().classify_root(root);
        match self.mapper.to_tree(root) {
            Ok(tree) => self.flatten_root(probed, tree, |_| true),
            Err(e) => {
                warn!(
                    type_name = std::any::type_name::<T>(),
                    kind = %probed,
                    error = %e,
                    "value could not be decomposed, contributing no rows"
                );
                Ok(self.empty_dataset())
            }
        }
    }

    /// Flatten each item of a collection, converting items one at a time
    ///
    /// An item that fails to convert is logged and produces an empty row, so the
    /// other rows keep their positions.
    pub fn flatten_items<'v, T, I>(&self, items: I) -> Result<TabularDataset>
    where
        T: Serialize + ?Sized + 'v,
        I: IntoIterator<Item = &'v T>,
    {
        let classifier = self.mapper.classifier();
        let mut dataset = self.empty_dataset();
        for (position, item) in items.into_iter().enumerate() {
            let probed = classifier.classify_root(item);
            let row = match self.mapper.to_tree(item) {
                Ok(tree) => self.flatten_node(classifier.classify_converted(probed, &tree), &tree),
                Err(e) => {
                    warn!(
                        type_name = std::any::type_name::<T>(),
                        kind = %probed,
                        position,
                        error = %e,
                        "item could not be decomposed, contributing an empty row"
                    );
                    FlattenedRow::new()
                }
            };
            self.push_row(&mut dataset, row)?;
        }
        Ok(dataset)
    }

    /// Flatten a tree
    pub fn flatten_tree(&self, tree: Value) -> Result<TabularDataset> {
        self.flatten_with(tree, |_| true)
    }

    /// Flatten a tree, keeping only the root elements for which `keep` is true
    pub fn flatten_with<F>(&self, tree: Value, keep: F) -> Result<TabularDataset>
    where
        F: FnMut(&Value) -> bool,
    {
        let kind = self.mapper.classifier().classify(&tree);
        self.flatten_root(kind, tree, keep)
    }

    /// Flatten a root tree whose source value probed as `probed`
    ///
    /// A sequence root yields one row per element kept by `keep`; any other
    /// root is a single row.
    pub fn flatten_root<F>(&self, probed: NodeKind, tree: Value, mut keep: F) -> Result<TabularDataset>
    where
        F: FnMut(&Value) -> bool,
    {
        let kind = self.mapper.classifier().classify_converted(probed, &tree);
        let mut dataset = self.empty_dataset();
        match (kind, tree) {
            (NodeKind::Sequence, Value::Array(items)) => {
                for item in items {
                    if keep(&item) {
                        let row = self.flatten_element(&item);
                        self.push_row(&mut dataset, row)?;
                    }
                }
            }
            (kind, root) => {
                if keep(&root) {
                    let row = self.flatten_node(kind, &root);
                    self.push_row(&mut dataset, row)?;
                }
            }
        }
        debug!(
            root = %kind,
            rows = dataset.row_count(),
            headers = dataset.headers.len(),
            "flattened dataset"
        );
        Ok(dataset)
    }

    /// Path-keyed row for one root element
    pub fn flatten_element(&self, element: &Value) -> FlattenedRow {
        self.flatten_node(self.mapper.classifier().classify(element), element)
    }

    fn flatten_node(&self, kind: NodeKind, element: &Value) -> FlattenedRow {
        let mut row = FlattenedRow::new();
        let column = self.config.scalar_column();
        match kind {
            NodeKind::Scalar => self.write_scalar(column, column, element, &mut row),
            _ => self.descend(kind, element, "", "", 0, &mut row),
        }
        row
    }

    fn empty_dataset(&self) -> TabularDataset {
        let mut dataset = TabularDataset::new();
        dataset.include_headers(self.config.always_include().iter().cloned());
        dataset
    }

    fn push_row(&self, dataset: &mut TabularDataset, row: FlattenedRow) -> Result<()> {
        self.config.limits().check_rows(dataset.row_count() + 1)?;
        dataset.push_row(row);
        Ok(())
    }

    fn walk(&self, node: &Value, path: &str, leaf: &str, depth: usize, row: &mut FlattenedRow) {
        let kind = self.mapper.classifier().classify(node);
        self.descend(kind, node, path, leaf, depth, row);
    }

    fn descend(
        &self,
        kind: NodeKind,
        node: &Value,
        path: &str,
        leaf: &str,
        depth: usize,
        row: &mut FlattenedRow,
    ) {
        if depth > self.config.limits().max_depth {
            warn!(path, max_depth = self.config.limits().max_depth, "nesting too deep, skipping subtree");
            return;
        }

        match (kind, node) {
            (NodeKind::Sequence, Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let child = join_index(path, index, self.config.chaining_list_sep());
                    self.walk(item, &child, leaf, depth + 1, row);
                }
            }
            (NodeKind::Mapping | NodeKind::Bean, Value::Object(map)) => {
                let rules = self.config.skip_rules();
                for (name, value) in map {
                    if rules.skips_property(name) {
                        continue;
                    }
                    let child = join_property(path, name, self.config.chaining_separator());
                    self.walk(value, &child, name, depth + 1, row);
                }
            }
            _ => self.write_scalar(path, leaf, node, row),
        }
    }

    fn write_scalar(&self, path: &str, leaf: &str, node: &Value, row: &mut FlattenedRow) {
        if self.config.skip_rules().skips_path(path) {
            return;
        }
        let include = self.config.include_properties();
        if !include.is_empty() && !include.contains(leaf) {
            return;
        }

        let cell = match self.mapper.classifier().stringify(node) {
            Cell::Text(text) if self.config.numeric_as_formula().contains(leaf) && is_numeric(&text) => {
                Cell::Formula(format!("=\"{}\"", text))
            }
            cell => cell,
        };
        row.insert(path.to_string(), cell);
    }
}

/// Optional `-`, digits, optional `.digits`
fn is_numeric(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    digits(whole) && fraction.map_or(true, digits)
}
