//! Declarative mapper configuration and its cache key

use super::filter::InclusionPredicates;
use super::{Mapper, OutputFormat};
use chrono::format::{Item, StrftimeItems};
use pathtab_format::{PathTabError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Write as _};
use std::sync::Arc;

/// Largest significant-figure limit that still changes an `f64`
pub const MAX_SIGNIFICANT_FIGURES: u32 = 17;

/// Loadable mapper settings; call [`build`](Self::build) to freeze
///
/// Every toggle is optional: an absent toggle leaves the base mapper untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MapperConfigBuilder {
    /// Text format
    pub format: OutputFormat,
    /// Indent text output
    pub pretty: Option<bool>,
    /// Write `@type` on root objects
    pub include_type_metadata: Option<bool>,
    /// Quote JSON object keys
    pub quote_field_names: Option<bool>,
    /// Sort object keys
    pub order_keys: Option<bool>,
    /// HTML-encode string leaves
    pub html_encode_strings: Option<bool>,
    /// `true`: dates stay strings; `false`: dates become epoch milliseconds
    pub dates_as_strings: Option<bool>,
    /// strftime pattern for dates kept as strings
    pub date_format: Option<String>,
    /// Significant figures kept for floating point leaves
    pub significant_figures: Option<u32>,
    /// Field-inclusion predicates per declared type (never loaded from files)
    #[serde(skip)]
    pub inclusion_predicates: InclusionPredicates,
    /// Dotted-path patterns to keep
    pub whitelist: Vec<String>,
    /// Dotted-path patterns to drop
    pub blacklist: Vec<String>,
    /// Dotted paths to keep
    pub only_fields: BTreeSet<String>,
    /// Field names or dotted paths to drop
    pub skip_fields: BTreeSet<String>,
    /// Field names to drop, per declared type
    pub skip_fields_by_type: BTreeMap<String, BTreeSet<String>>,
    /// Registered graph to select
    pub graph: Option<String>,
    /// Caller-supplied base mapper
    #[serde(skip)]
    pub base: Option<Arc<Mapper>>,
    /// Explicit cache-key id
    pub cache_id: Option<String>,
}

impl MapperConfigBuilder {
    /// Set the text format
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set indentation
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = Some(pretty);
        self
    }

    /// Set type metadata
    pub fn include_type_metadata(mut self, enabled: bool) -> Self {
        self.include_type_metadata = Some(enabled);
        self
    }

    /// Set key quoting
    pub fn quote_field_names(mut self, enabled: bool) -> Self {
        self.quote_field_names = Some(enabled);
        self
    }

    /// Set key ordering
    pub fn order_keys(mut self, enabled: bool) -> Self {
        self.order_keys = Some(enabled);
        self
    }

    /// Set HTML encoding of strings
    pub fn html_encode_strings(mut self, enabled: bool) -> Self {
        self.html_encode_strings = Some(enabled);
        self
    }

    /// Set date handling
    pub fn dates_as_strings(mut self, enabled: bool) -> Self {
        self.dates_as_strings = Some(enabled);
        self
    }

    /// Keep dates as strings formatted with `pattern`
    pub fn date_format(mut self, pattern: impl Into<String>) -> Self {
        self.dates_as_strings = Some(true);
        self.date_format = Some(pattern.into());
        self
    }

    /// Set the significant-figure limit
    pub fn significant_figures(mut self, digits: u32) -> Self {
        self.significant_figures = Some(digits);
        self
    }

    /// Replace the inclusion predicates
    pub fn inclusion_predicates(mut self, predicates: InclusionPredicates) -> Self {
        self.inclusion_predicates = predicates;
        self
    }

    /// Add a white-list pattern
    pub fn whitelist(mut self, pattern: impl Into<String>) -> Self {
        self.whitelist.push(pattern.into());
        self
    }

    /// Add a black-list pattern
    pub fn blacklist(mut self, pattern: impl Into<String>) -> Self {
        self.blacklist.push(pattern.into());
        self
    }

    /// Add an only-field path
    pub fn only_field(mut self, path: impl Into<String>) -> Self {
        self.only_fields.insert(path.into());
        self
    }

    /// Add a skip field
    pub fn skip_field(mut self, field: impl Into<String>) -> Self {
        self.skip_fields.insert(field.into());
        self
    }

    /// Add a skip field for one declared type
    pub fn skip_field_for(mut self, type_name: impl Into<String>, field: impl Into<String>) -> Self {
        self.skip_fields_by_type
            .entry(type_name.into())
            .or_default()
            .insert(field.into());
        self
    }

    /// Select a registered graph
    pub fn graph(mut self, name: impl Into<String>) -> Self {
        self.graph = Some(name.into());
        self
    }

    /// Start from a caller-supplied mapper
    pub fn base(mut self, base: Arc<Mapper>) -> Self {
        self.base = Some(base);
        self
    }

    /// Set the explicit cache-key id
    pub fn cache_id(mut self, id: impl Into<String>) -> Self {
        self.cache_id = Some(id.into());
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<MapperConfig> {
        if let Some(digits) = self.significant_figures {
            if digits == 0 || digits > MAX_SIGNIFICANT_FIGURES {
                return Err(PathTabError::InvalidConfig(format!(
                    "significant_figures must be between 1 and {}, got {}",
                    MAX_SIGNIFICANT_FIGURES, digits
                )));
            }
        }

        if let Some(pattern) = &self.date_format {
            if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                return Err(PathTabError::InvalidConfig(format!(
                    "date_format '{}' is not a valid strftime pattern",
                    pattern
                )));
            }
        }

        let dates_as_strings = match (self.dates_as_strings, &self.date_format) {
            (None, Some(_)) => Some(true),
            (Some(false), Some(_)) => {
                return Err(PathTabError::InvalidConfig(
                    "date_format requires dates_as_strings".to_string(),
                ))
            }
            (other, _) => other,
        };

        Ok(MapperConfig {
            whitelist: compile_patterns(&self.whitelist)?,
            blacklist: compile_patterns(&self.blacklist)?,
            format: self.format,
            pretty: self.pretty,
            include_type_metadata: self.include_type_metadata,
            quote_field_names: self.quote_field_names,
            order_keys: self.order_keys,
            html_encode_strings: self.html_encode_strings,
            dates_as_strings,
            date_format: self.date_format,
            significant_figures: self.significant_figures,
            inclusion_predicates: self.inclusion_predicates,
            only_fields: self.only_fields,
            skip_fields: self.skip_fields,
            skip_fields_by_type: self.skip_fields_by_type,
            graph: self.graph,
            base: self.base,
            cache_id: self.cache_id,
        })
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| PathTabError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Frozen mapper configuration
#[derive(Debug, Clone)]
pub struct MapperConfig {
    format: OutputFormat,
    pretty: Option<bool>,
    include_type_metadata: Option<bool>,
    quote_field_names: Option<bool>,
    order_keys: Option<bool>,
    html_encode_strings: Option<bool>,
    dates_as_strings: Option<bool>,
    date_format: Option<String>,
    significant_figures: Option<u32>,
    inclusion_predicates: InclusionPredicates,
    whitelist: Vec<Regex>,
    blacklist: Vec<Regex>,
    only_fields: BTreeSet<String>,
    skip_fields: BTreeSet<String>,
    skip_fields_by_type: BTreeMap<String, BTreeSet<String>>,
    graph: Option<String>,
    base: Option<Arc<Mapper>>,
    cache_id: Option<String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("default mapper configuration is valid")
    }
}

impl MapperConfig {
    /// Start a builder with every toggle absent
    pub fn builder() -> MapperConfigBuilder {
        MapperConfigBuilder::default()
    }

    /// Text format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Indentation toggle
    pub fn pretty(&self) -> Option<bool> {
        self.pretty
    }

    /// Type metadata toggle
    pub fn include_type_metadata(&self) -> Option<bool> {
        self.include_type_metadata
    }

    /// Key quoting toggle
    pub fn quote_field_names(&self) -> Option<bool> {
        self.quote_field_names
    }

    /// Key ordering toggle
    pub fn order_keys(&self) -> Option<bool> {
        self.order_keys
    }

    /// HTML encoding toggle
    pub fn html_encode_strings(&self) -> Option<bool> {
        self.html_encode_strings
    }

    /// Date handling toggle
    pub fn dates_as_strings(&self) -> Option<bool> {
        self.dates_as_strings
    }

    /// Date pattern
    pub fn date_format(&self) -> Option<&str> {
        self.date_format.as_deref()
    }

    /// Significant-figure limit
    pub fn significant_figures(&self) -> Option<u32> {
        self.significant_figures
    }

    /// Inclusion predicates
    pub fn inclusion_predicates(&self) -> &InclusionPredicates {
        &self.inclusion_predicates
    }

    /// Compiled white-list patterns
    pub fn whitelist(&self) -> &[Regex] {
        &self.whitelist
    }

    /// Compiled black-list patterns
    pub fn blacklist(&self) -> &[Regex] {
        &self.blacklist
    }

    /// Only-field paths
    pub fn only_fields(&self) -> &BTreeSet<String> {
        &self.only_fields
    }

    /// Skip fields
    pub fn skip_fields(&self) -> &BTreeSet<String> {
        &self.skip_fields
    }

    /// Skip fields per declared type
    pub fn skip_fields_by_type(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.skip_fields_by_type
    }

    /// Graph name
    pub fn graph(&self) -> Option<&str> {
        self.graph.as_deref()
    }

    /// Caller-supplied base mapper
    pub fn base(&self) -> Option<&Arc<Mapper>> {
        self.base.as_ref()
    }

    /// Explicit cache-key id
    pub fn cache_id(&self) -> Option<&str> {
        self.cache_id.as_deref()
    }

    /// Whether resolved mappers for this configuration may be memoized
    ///
    /// Predicates are opaque closures and a caller-supplied base has no
    /// structural identity, so neither can be compared through the key unless
    /// the caller names the configuration with a cache id.
    pub fn is_cacheable(&self) -> bool {
        self.inclusion_predicates.is_empty() && (self.base.is_none() || self.cache_id.is_some())
    }

    /// Deterministic key: every field in fixed order, absent values as `null`
    pub fn cache_key(&self) -> String {
        let mut key = String::with_capacity(256);
        push_field(&mut key, "format", Some(self.format));
        push_field(&mut key, "pretty", self.pretty);
        push_field(&mut key, "include_type_metadata", self.include_type_metadata);
        push_field(&mut key, "quote_field_names", self.quote_field_names);
        push_field(&mut key, "order_keys", self.order_keys);
        push_field(&mut key, "html_encode_strings", self.html_encode_strings);
        push_field(&mut key, "dates_as_strings", self.dates_as_strings);
        push_field(&mut key, "date_format", self.date_format.as_ref());
        push_field(&mut key, "significant_figures", self.significant_figures);
        push_field(
            &mut key,
            "inclusion_predicates",
            non_empty(self.inclusion_predicates.type_names().collect::<Vec<_>>()),
        );
        push_field(
            &mut key,
            "whitelist",
            non_empty(self.whitelist.iter().map(Regex::as_str).collect::<Vec<_>>()),
        );
        push_field(
            &mut key,
            "blacklist",
            non_empty(self.blacklist.iter().map(Regex::as_str).collect::<Vec<_>>()),
        );
        push_field(&mut key, "only_fields", non_empty(&self.only_fields));
        push_field(&mut key, "skip_fields", non_empty(&self.skip_fields));
        push_field(&mut key, "skip_fields_by_type", non_empty(&self.skip_fields_by_type));
        push_field(&mut key, "graph", self.graph.as_ref());
        push_field(
            &mut key,
            "base",
            self.base.as_ref().map(|b| format!("{:p}", Arc::as_ptr(b))),
        );
        push_field(&mut key, "cache_id", self.cache_id.as_ref());
        key
    }
}

trait IsEmpty {
    fn is_empty_value(&self) -> bool;
}

impl<T> IsEmpty for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for &BTreeSet<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> IsEmpty for &BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

fn non_empty<T: IsEmpty>(value: T) -> Option<T> {
    if value.is_empty_value() {
        None
    } else {
        Some(value)
    }
}

fn push_field<T: Debug>(key: &mut String, name: &str, value: Option<T>) {
    match value {
        Some(value) => {
            let _ = write!(key, "{}={:?};", name, value);
        }
        None => {
            let _ = write!(key, "{}=null;", name);
        }
    }
}
