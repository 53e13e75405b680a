//! Mappers: configured codec capabilities
//!
//! A [`Mapper`] turns any `Serialize` value into a generic tree (and text), with
//! its formatting toggles and field filters applied. Mappers are resolved from a
//! declarative [`MapperConfig`] through the [`MapperCache`], which memoizes them
//! per configuration and registry version.

pub mod cache;
pub mod config;
pub mod filter;
mod format;
pub mod registry;

pub use cache::MapperCache;
pub use config::{MapperConfig, MapperConfigBuilder};
pub use filter::{FieldFilter, FieldPredicate, InclusionPredicates, ANY_TYPE};
pub use registry::{CapabilityRegistry, MapperModule, RegistrySnapshot};

use crate::classify::{NodeClassifier, ScalarRule};
use crate::tree::lenient_tree;
use crate::type_hint::{short_type_name, TypeHint};
use chrono::{DateTime, NaiveDate};
use format::KeyFormatter;
use pathtab_format::escape::html_escape;
use pathtab_format::{PathTabError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::ser::{CompactFormatter, PrettyFormatter};
use serde_json::{Map, Number, Value};
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Key under which type metadata is written
pub const TYPE_METADATA_KEY: &str = "@type";

/// Text format produced by [`Mapper::encode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// JSON text
    #[default]
    Json,
    /// YAML text
    Yaml,
}

/// Treatment of date-like string leaves (RFC 3339 timestamps or `YYYY-MM-DD`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateMode {
    /// Leave as serialized
    #[default]
    Unchanged,
    /// Replace with epoch milliseconds
    Timestamps,
    /// Keep as strings, reformatted with the pattern when one is given
    Text(Option<String>),
}

/// Configured codec capability
#[derive(Clone)]
pub struct Mapper {
    format: OutputFormat,
    include_type_metadata: bool,
    pretty: bool,
    quote_field_names: bool,
    order_keys: bool,
    html_encode_strings: bool,
    dates: DateMode,
    significant_figures: Option<u32>,
    filter: Option<FieldFilter>,
    modules: Vec<Arc<dyn MapperModule>>,
    scalar_rules: Vec<Arc<dyn ScalarRule>>,
    version: u64,
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("format", &self.format)
            .field("include_type_metadata", &self.include_type_metadata)
            .field("pretty", &self.pretty)
            .field("quote_field_names", &self.quote_field_names)
            .field("order_keys", &self.order_keys)
            .field("html_encode_strings", &self.html_encode_strings)
            .field("dates", &self.dates)
            .field("significant_figures", &self.significant_figures)
            .field("filter", &self.filter)
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("scalar_rules", &self.scalar_rules.len())
            .field("version", &self.version)
            .finish()
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(OutputFormat::Json)
    }
}

impl Mapper {
    /// Plain mapper with no registry capabilities attached (version 0)
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            include_type_metadata: false,
            pretty: false,
            quote_field_names: true,
            order_keys: false,
            html_encode_strings: false,
            dates: DateMode::Unchanged,
            significant_figures: None,
            filter: None,
            modules: Vec::new(),
            scalar_rules: Vec::new(),
            version: 0,
        }
    }

    /// Output format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Whether root objects carry an `@type` entry
    pub fn include_type_metadata(&self) -> bool {
        self.include_type_metadata
    }

    /// Whether text output is indented
    pub fn pretty(&self) -> bool {
        self.pretty
    }

    /// Whether JSON object keys are quoted
    pub fn quote_field_names(&self) -> bool {
        self.quote_field_names
    }

    /// Whether object keys are sorted
    pub fn order_keys(&self) -> bool {
        self.order_keys
    }

    /// Whether string leaves are HTML-encoded
    pub fn html_encode_strings(&self) -> bool {
        self.html_encode_strings
    }

    /// Date handling
    pub fn date_mode(&self) -> &DateMode {
        &self.dates
    }

    /// Significant-figure limit for floating point leaves
    pub fn significant_figures(&self) -> Option<u32> {
        self.significant_figures
    }

    /// Active field filter
    pub fn filter(&self) -> Option<&FieldFilter> {
        self.filter.as_ref()
    }

    /// Registry version this mapper was built against
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Set type metadata
    pub fn set_include_type_metadata(&mut self, enabled: bool) {
        self.include_type_metadata = enabled;
    }

    /// Set indentation
    pub fn set_pretty(&mut self, enabled: bool) {
        self.pretty = enabled;
    }

    /// Set key quoting
    pub fn set_quote_field_names(&mut self, enabled: bool) {
        self.quote_field_names = enabled;
    }

    /// Set key ordering
    pub fn set_order_keys(&mut self, enabled: bool) {
        self.order_keys = enabled;
    }

    /// Set HTML encoding of strings
    pub fn set_html_encode_strings(&mut self, enabled: bool) {
        self.html_encode_strings = enabled;
    }

    /// Set date handling
    pub fn set_date_mode(&mut self, mode: DateMode) {
        self.dates = mode;
    }

    /// Set the significant-figure limit
    pub fn set_significant_figures(&mut self, digits: Option<u32>) {
        self.significant_figures = digits;
    }

    /// Merge `filter` with any filter already present
    pub fn merge_filter(&mut self, filter: FieldFilter) {
        match &mut self.filter {
            Some(existing) => existing.merge(filter),
            None => self.filter = Some(filter),
        }
    }

    /// Adopt the modules, scalar rules, and version of a registry snapshot
    pub fn attach(&mut self, snapshot: &RegistrySnapshot<'_>) {
        self.modules = snapshot.modules().to_vec();
        self.scalar_rules = snapshot.scalar_rules().to_vec();
        self.version = snapshot.version();
    }

    /// Classifier backed by this mapper's scalar rules
    pub fn classifier(&self) -> NodeClassifier<'_> {
        NodeClassifier::new(&self.scalar_rules)
    }

    /// Generic tree for `value`
    ///
    /// Fields, entries, and elements that fail to serialize are logged and left
    /// out (see [`lenient_tree`]).
    pub fn to_tree<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value> {
        self.to_tree_hinted(value, None)
    }

    /// Generic tree for `value`, using `hint` for declared types
    pub fn to_tree_hinted<T: Serialize + ?Sized>(
        &self,
        value: &T,
        hint: Option<&TypeHint>,
    ) -> Result<Value> {
        let mut tree = lenient_tree(value)?;
        let root_type = hint
            .and_then(TypeHint::type_name)
            .or_else(|| rust_type_name::<T>());

        for module in &self.modules {
            module.transform(&mut tree);
        }

        if let Some(filter) = &self.filter {
            filter.apply(&mut tree, root_type, hint);
        }

        self.transform_leaves(&mut tree);

        if self.order_keys {
            sort_keys(&mut tree);
        }

        if self.include_type_metadata {
            if let (Some(type_name), Value::Object(map)) = (root_type, &mut tree) {
                let mut tagged = Map::with_capacity(map.len() + 1);
                tagged.insert(TYPE_METADATA_KEY.to_string(), Value::String(type_name.to_string()));
                tagged.extend(std::mem::take(map));
                *map = tagged;
            }
        }

        Ok(tree)
    }

    /// Typed value from a tree
    pub fn from_tree<T: DeserializeOwned>(&self, tree: Value) -> Result<T> {
        Ok(serde_json::from_value(tree)?)
    }

    /// Text encoding of `value` in this mapper's format
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let tree = self.to_tree(value)?;
        match self.format {
            OutputFormat::Json => {
                let mut buf = Vec::new();
                if self.pretty {
                    let formatter = KeyFormatter::new(PrettyFormatter::new(), self.quote_field_names);
                    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                    tree.serialize(&mut ser)?;
                } else {
                    let formatter = KeyFormatter::new(CompactFormatter, self.quote_field_names);
                    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                    tree.serialize(&mut ser)?;
                }
                String::from_utf8(buf).map_err(|e| PathTabError::Internal(e.to_string()))
            }
            OutputFormat::Yaml => Ok(serde_yaml::to_string(&tree)?),
        }
    }

    /// Typed value from text in this mapper's format
    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::from_str(text)?),
            OutputFormat::Yaml => Ok(serde_yaml::from_str(text)?),
        }
    }

    fn transform_leaves(&self, node: &mut Value) {
        match node {
            Value::Object(map) => map.values_mut().for_each(|v| self.transform_leaves(v)),
            Value::Array(items) => items.iter_mut().for_each(|v| self.transform_leaves(v)),
            Value::Number(n) => {
                if let Some(digits) = self.significant_figures {
                    if let Some(rounded) = round_number(n, digits) {
                        *n = rounded;
                    }
                }
            }
            Value::String(_) => {
                if self.dates != DateMode::Unchanged {
                    if let Some(replacement) = convert_date(node, &self.dates) {
                        *node = replacement;
                    }
                }
                if self.html_encode_strings {
                    if let Value::String(s) = node {
                        *s = html_escape(s);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Short Rust type name, or `None` for untyped JSON trees
fn rust_type_name<T: ?Sized>() -> Option<&'static str> {
    let full = std::any::type_name::<T>();
    if full == std::any::type_name::<Value>() || full == std::any::type_name::<Map<String, Value>>() {
        return None;
    }
    Some(short_type_name(full))
}

fn sort_keys(node: &mut Value) {
    match node {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, mut value) in entries {
                sort_keys(&mut value);
                map.insert(key, value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sort_keys),
        _ => {}
    }
}

fn round_number(n: &Number, digits: u32) -> Option<Number> {
    if n.is_i64() || n.is_u64() || digits == 0 {
        return None;
    }
    let x = n.as_f64()?;
    if x == 0.0 || !x.is_finite() {
        return None;
    }
    let formatted = format!("{:.*e}", (digits - 1) as usize, x);
    let rounded: f64 = formatted.parse().ok()?;
    Number::from_f64(rounded)
}

fn convert_date(node: &Value, mode: &DateMode) -> Option<Value> {
    let text = node.as_str()?;
    let parsed = match DateTime::parse_from_rfc3339(text) {
        Ok(dt) => dt,
        Err(_) => {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset()
        }
    };
    match mode {
        DateMode::Unchanged | DateMode::Text(None) => None,
        DateMode::Timestamps => Some(Value::from(parsed.timestamp_millis())),
        DateMode::Text(Some(pattern)) => {
            let mut out = String::new();
            match write!(out, "{}", parsed.format(pattern)) {
                Ok(()) => Some(Value::String(out)),
                Err(_) => {
                    tracing::warn!(%pattern, "date pattern could not format value, leaving it unchanged");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Invoice {
        number: String,
        total: f64,
        issued: String,
    }

    fn invoice() -> Invoice {
        Invoice {
            number: "<A-1>".to_string(),
            total: 1234.5678,
            issued: "2024-03-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn plain_tree_matches_serde() {
        let mapper = Mapper::default();
        let tree = mapper.to_tree(&invoice()).unwrap();
        assert_eq!(tree, serde_json::to_value(invoice()).unwrap());
    }

    #[test]
    fn type_metadata_is_first_key() {
        let mut mapper = Mapper::default();
        mapper.set_include_type_metadata(true);
        let tree = mapper.to_tree(&invoice()).unwrap();
        let keys: Vec<_> = tree.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys[0], TYPE_METADATA_KEY);
        assert_eq!(tree[TYPE_METADATA_KEY], "Invoice");

        let untyped = mapper.to_tree(&json!({"a": 1})).unwrap();
        assert!(untyped.get(TYPE_METADATA_KEY).is_none());
    }

    #[test]
    fn leaf_transforms() {
        let mut mapper = Mapper::default();
        mapper.set_html_encode_strings(true);
        mapper.set_significant_figures(Some(3));
        mapper.set_date_mode(DateMode::Timestamps);
        let tree = mapper.to_tree(&invoice()).unwrap();
        assert_eq!(tree["number"], "&lt;A-1&gt;");
        assert_eq!(tree["total"], json!(1230.0));
        assert_eq!(tree["issued"], json!(1_709_287_200_000i64));
    }

    #[test]
    fn date_pattern_reformats() {
        let mut mapper = Mapper::default();
        mapper.set_date_mode(DateMode::Text(Some("%d/%m/%Y".to_string())));
        let tree = mapper
            .to_tree(&json!({"a": "2024-03-01T10:00:00Z", "b": "2024-12-25", "c": "soon"}))
            .unwrap();
        assert_eq!(tree, json!({"a": "01/03/2024", "b": "25/12/2024", "c": "soon"}));
    }

    #[test]
    fn integers_are_not_rounded() {
        let mut mapper = Mapper::default();
        mapper.set_significant_figures(Some(1));
        let tree = mapper.to_tree(&json!({"n": 123456})).unwrap();
        assert_eq!(tree["n"], json!(123456));
    }

    #[test]
    fn order_keys_sorts_recursively() {
        let mut mapper = Mapper::default();
        mapper.set_order_keys(true);
        let text = mapper
            .encode(&json!({"b": 1, "a": {"d": 1, "c": 2}}))
            .unwrap();
        assert_eq!(text, r#"{"a":{"c":2,"d":1},"b":1}"#);
    }

    #[test]
    fn encode_unquoted_and_pretty() {
        let mut mapper = Mapper::default();
        mapper.set_quote_field_names(false);
        assert_eq!(mapper.encode(&json!({"a": "x"})).unwrap(), r#"{a:"x"}"#);
        mapper.set_pretty(true);
        assert_eq!(mapper.encode(&json!({"a": 1})).unwrap(), "{\n  a: 1\n}");
    }

    #[test]
    fn yaml_roundtrip() {
        let mapper = Mapper::new(OutputFormat::Yaml);
        let text = mapper.encode(&invoice()).unwrap();
        assert!(text.contains("number:"));
        let back: Invoice = mapper.decode(&text).unwrap();
        assert_eq!(back, invoice());
    }

    struct Unsupported;

    impl Serialize for Unsupported {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("unsupported"))
        }
    }

    #[derive(Serialize)]
    struct Draft {
        title: String,
        attachment: Unsupported,
    }

    #[test]
    fn failing_fields_are_left_out_of_the_tree() {
        let mapper = Mapper::default();
        let draft = Draft {
            title: "t".to_string(),
            attachment: Unsupported,
        };
        assert_eq!(mapper.to_tree(&draft).unwrap(), json!({"title": "t"}));
        assert_eq!(mapper.encode(&draft).unwrap(), r#"{"title":"t"}"#);
        assert!(mapper.to_tree(&Unsupported).is_err());
    }

    #[test]
    fn merged_filters_compose() {
        let mut mapper = Mapper::default();
        mapper.merge_filter(FieldFilter::skip(["total".to_string()].into(), Default::default()));
        mapper.merge_filter(FieldFilter::skip(["issued".to_string()].into(), Default::default()));
        let tree = mapper.to_tree(&invoice()).unwrap();
        assert_eq!(tree, json!({"number": "<A-1>"}));
    }
}
