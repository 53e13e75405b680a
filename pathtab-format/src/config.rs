//! Render configuration
//!
//! [`RenderConfigBuilder`] is the loadable, mutable surface (it deserializes from
//! TOML/JSON with every field defaulted). [`RenderConfigBuilder::build`] validates
//! it, compiles skip patterns, and yields a [`RenderConfig`] that exposes getters
//! only, so a configuration cannot change once rendering starts.

use crate::error::{PathTabError, Result};
use crate::limits::Limits;
use crate::path_key::DEFAULT_SEPARATOR;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Prefix marking a skip-property entry as a regular expression over the full path
pub const REGEX_PREFIX: &str = "@REGEX@";

/// Emission target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Delimited text lines
    #[default]
    Csv,
    /// HTML `<table>`
    Html,
    /// HTML table with the header row folded into the body
    HtmlEmail,
    /// In-memory workbook
    Xlsx,
    /// `{"headers": [...], "data": [...]}`
    FlattenedJson,
}

/// Quoting applied to text cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuoteMode {
    /// CSV-escape (quote when needed) or HTML-escape, depending on mode
    #[default]
    Escape,
    /// Always wrap in quotes
    Always,
    /// Pass through verbatim
    Never,
}

/// Treatment of text cells beginning with `=`
///
/// `Passthrough` emits them unescaped so spreadsheet software evaluates them;
/// this is a spreadsheet-injection vector and must be chosen explicitly.
/// `Neutralize` prefixes a `'` so they display as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormulaPolicy {
    /// Emit `=`-prefixed text verbatim
    Passthrough,
    /// Prefix `'` and escape normally
    #[default]
    Neutralize,
}

/// Compiled skip-property rules
#[derive(Debug, Clone, Default)]
pub struct SkipRules {
    literals: BTreeSet<String>,
    patterns: Vec<Regex>,
}

impl SkipRules {
    /// Split entries into literal property names and `@REGEX@` path patterns
    pub fn compile<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Self::default();
        for entry in entries {
            let entry = entry.as_ref();
            match entry.strip_prefix(REGEX_PREFIX) {
                Some(pattern) => {
                    let regex = Regex::new(pattern).map_err(|source| PathTabError::InvalidPattern {
                        pattern: pattern.to_string(),
                        source,
                    })?;
                    rules.patterns.push(regex);
                }
                None => {
                    rules.literals.insert(entry.to_string());
                }
            }
        }
        Ok(rules)
    }

    /// Literal match on a property name, wherever it appears
    pub fn skips_property(&self, name: &str) -> bool {
        self.literals.contains(name)
    }

    /// Pattern match on a full path key
    pub fn skips_path(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(path))
    }

    /// Whether any path patterns are configured
    pub fn has_patterns(&self) -> bool {
        !self.patterns.is_empty()
    }
}

/// Loadable render settings; call [`build`](Self::build) to freeze
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfigBuilder {
    /// Field delimiter for CSV output
    pub delimiter: char,
    /// Separator between property segments; blank means camel-case concatenation
    pub chaining_separator: String,
    /// Render sequence indices as `p[i]` (true) or `p` + `i` (false)
    pub chaining_list_sep: bool,
    /// Headers present even when never populated
    pub always_include: Vec<String>,
    /// Literal property names or `@REGEX@` path patterns to skip
    pub skip_properties: Vec<String>,
    /// Leaf property allowlist; empty allows everything
    pub include_properties: BTreeSet<String>,
    /// Headers pinned to the front in this order
    pub pin_order: Vec<String>,
    /// Pivot headers into rows
    pub transpose: bool,
    /// Emission target
    pub mode: OutputMode,
    /// Quoting of text cells
    pub quoting: QuoteMode,
    /// Leaf property names whose numeric values become `="value"` formulas
    pub numeric_as_formula: BTreeSet<String>,
    /// Handling of `=`-prefixed text
    pub formula_policy: FormulaPolicy,
    /// CSS class of the HTML table
    pub table_class: String,
    /// Column name used for scalar root elements
    pub scalar_column: String,
    /// RFC 6901 pointer selecting the data inside the root
    pub data_pointer: Option<String>,
    /// Expression; rows for which it evaluates to `true` are skipped
    pub skip_row_if: Option<String>,
    /// Output and traversal limits
    pub limits: Limits,
}

impl Default for RenderConfigBuilder {
    fn default() -> Self {
        Self {
            delimiter: ',',
            chaining_separator: DEFAULT_SEPARATOR.to_string(),
            chaining_list_sep: true,
            always_include: Vec::new(),
            skip_properties: Vec::new(),
            include_properties: BTreeSet::new(),
            pin_order: Vec::new(),
            transpose: false,
            mode: OutputMode::Csv,
            quoting: QuoteMode::Escape,
            numeric_as_formula: BTreeSet::new(),
            formula_policy: FormulaPolicy::Neutralize,
            table_class: "table".to_string(),
            scalar_column: "value".to_string(),
            data_pointer: None,
            skip_row_if: None,
            limits: Limits::default(),
        }
    }
}

impl RenderConfigBuilder {
    /// Set the CSV delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the chaining separator
    pub fn chaining_separator(mut self, separator: impl Into<String>) -> Self {
        self.chaining_separator = separator.into();
        self
    }

    /// Choose `p[i]` or `p` + `i` for sequence elements
    pub fn chaining_list_sep(mut self, enabled: bool) -> Self {
        self.chaining_list_sep = enabled;
        self
    }

    /// Add an always-included header
    pub fn always_include(mut self, header: impl Into<String>) -> Self {
        self.always_include.push(header.into());
        self
    }

    /// Add a skip entry (literal name or `@REGEX@` pattern)
    pub fn skip_property(mut self, entry: impl Into<String>) -> Self {
        self.skip_properties.push(entry.into());
        self
    }

    /// Add a leaf property to the allowlist
    pub fn include_property(mut self, name: impl Into<String>) -> Self {
        self.include_properties.insert(name.into());
        self
    }

    /// Replace the pin-order list
    pub fn pin_order<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pin_order = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable transposition
    pub fn transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    /// Set the output mode
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the quoting mode
    pub fn quoting(mut self, quoting: QuoteMode) -> Self {
        self.quoting = quoting;
        self
    }

    /// Add a numeric-as-formula leaf property name
    pub fn numeric_as_formula(mut self, name: impl Into<String>) -> Self {
        self.numeric_as_formula.insert(name.into());
        self
    }

    /// Set the formula policy
    pub fn formula_policy(mut self, policy: FormulaPolicy) -> Self {
        self.formula_policy = policy;
        self
    }

    /// Set the HTML table class
    pub fn table_class(mut self, class: impl Into<String>) -> Self {
        self.table_class = class.into();
        self
    }

    /// Set the data-selection pointer
    pub fn data_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.data_pointer = Some(pointer.into());
        self
    }

    /// Set the skip-row expression
    pub fn skip_row_if(mut self, expression: impl Into<String>) -> Self {
        self.skip_row_if = Some(expression.into());
        self
    }

    /// Replace the limits
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<RenderConfig> {
        self.limits.validate()?;

        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(PathTabError::InvalidConfig(format!(
                "delimiter {:?} cannot be used",
                self.delimiter
            )));
        }

        if self.chaining_separator.contains('[') || self.chaining_separator.contains('"') {
            return Err(PathTabError::InvalidConfig(format!(
                "chaining separator '{}' collides with path-key syntax",
                self.chaining_separator
            )));
        }

        if let Some(pointer) = &self.data_pointer {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(PathTabError::InvalidConfig(format!(
                    "data pointer '{}' must start with '/' (or be empty for root)",
                    pointer
                )));
            }
        }

        let skip_rules = SkipRules::compile(&self.skip_properties)?;

        Ok(RenderConfig {
            delimiter: self.delimiter,
            chaining_separator: self.chaining_separator,
            chaining_list_sep: self.chaining_list_sep,
            always_include: self.always_include,
            skip_rules,
            include_properties: self.include_properties,
            pin_order: self.pin_order,
            transpose: self.transpose,
            mode: self.mode,
            quoting: self.quoting,
            numeric_as_formula: self.numeric_as_formula,
            formula_policy: self.formula_policy,
            table_class: self.table_class,
            scalar_column: self.scalar_column,
            data_pointer: self.data_pointer,
            skip_row_if: self.skip_row_if,
            limits: self.limits,
        })
    }
}

/// Frozen render configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    delimiter: char,
    chaining_separator: String,
    chaining_list_sep: bool,
    always_include: Vec<String>,
    skip_rules: SkipRules,
    include_properties: BTreeSet<String>,
    pin_order: Vec<String>,
    transpose: bool,
    mode: OutputMode,
    quoting: QuoteMode,
    numeric_as_formula: BTreeSet<String>,
    formula_policy: FormulaPolicy,
    table_class: String,
    scalar_column: String,
    data_pointer: Option<String>,
    skip_row_if: Option<String>,
    limits: Limits,
}

impl Default for RenderConfig {
    fn default() -> Self {
        // Defaults contain no patterns, so building cannot fail
        RenderConfigBuilder::default()
            .build()
            .expect("default render configuration is valid")
    }
}

impl RenderConfig {
    /// Start a builder with defaults
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder::default()
    }

    /// CSV delimiter
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Property chaining separator
    pub fn chaining_separator(&self) -> &str {
        &self.chaining_separator
    }

    /// Whether sequence indices render as `p[i]`
    pub fn chaining_list_sep(&self) -> bool {
        self.chaining_list_sep
    }

    /// Always-included headers
    pub fn always_include(&self) -> &[String] {
        &self.always_include
    }

    /// Compiled skip rules
    pub fn skip_rules(&self) -> &SkipRules {
        &self.skip_rules
    }

    /// Leaf property allowlist
    pub fn include_properties(&self) -> &BTreeSet<String> {
        &self.include_properties
    }

    /// Pin-order list
    pub fn pin_order(&self) -> &[String] {
        &self.pin_order
    }

    /// Whether to transpose
    pub fn transpose(&self) -> bool {
        self.transpose
    }

    /// Output mode
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Quoting mode
    pub fn quoting(&self) -> QuoteMode {
        self.quoting
    }

    /// Numeric-as-formula leaf names
    pub fn numeric_as_formula(&self) -> &BTreeSet<String> {
        &self.numeric_as_formula
    }

    /// Formula policy
    pub fn formula_policy(&self) -> FormulaPolicy {
        self.formula_policy
    }

    /// HTML table class
    pub fn table_class(&self) -> &str {
        &self.table_class
    }

    /// Column used for scalar root elements
    pub fn scalar_column(&self) -> &str {
        &self.scalar_column
    }

    /// Data-selection pointer
    pub fn data_pointer(&self) -> Option<&str> {
        self.data_pointer.as_deref()
    }

    /// Skip-row expression
    pub fn skip_row_if(&self) -> Option<&str> {
        self.skip_row_if.as_deref()
    }

    /// Limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Builder seeded with this configuration, for deriving a variant
    pub fn to_builder(&self) -> RenderConfigBuilder {
        let mut skip_properties: Vec<String> = self.skip_rules.literals.iter().cloned().collect();
        skip_properties.extend(
            self.skip_rules
                .patterns
                .iter()
                .map(|p| format!("{}{}", REGEX_PREFIX, p.as_str())),
        );
        RenderConfigBuilder {
            delimiter: self.delimiter,
            chaining_separator: self.chaining_separator.clone(),
            chaining_list_sep: self.chaining_list_sep,
            always_include: self.always_include.clone(),
            skip_properties,
            include_properties: self.include_properties.clone(),
            pin_order: self.pin_order.clone(),
            transpose: self.transpose,
            mode: self.mode,
            quoting: self.quoting,
            numeric_as_formula: self.numeric_as_formula.clone(),
            formula_policy: self.formula_policy,
            table_class: self.table_class.clone(),
            scalar_column: self.scalar_column.clone(),
            data_pointer: self.data_pointer.clone(),
            skip_row_if: self.skip_row_if.clone(),
            limits: self.limits.clone(),
        }
    }
}
