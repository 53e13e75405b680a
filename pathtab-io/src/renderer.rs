//! Tabular rendering
//!
//! One render call moves through fixed phases:
//!
//! 1. **Init** - pick the cell style for the output mode
//! 2. **Flatten** - convert the value to a tree, select data, drop skipped
//!    rows, and flatten the rest
//! 3. **Transpose** (optional) - pivot the finalized table; headers are
//!    escaped again afterwards
//! 4. **Render** - emit CSV, HTML, flattened JSON, or a workbook
//! 5. **Done**

use crate::cell::{CellStyle, Target};
use crate::csv::write_csv;
use crate::expression::{should_skip, ExpressionEvaluator, SimpleExpression};
use crate::flat_json::{envelope, write_flat_json};
use crate::header::{finalize_headers, Header};
use crate::html::write_html;
use crate::pointer::{parse_pointer, select};
use crate::sink::Sink;
use crate::transpose::transpose;
use crate::workbook::{build_workbook, Workbook};
use pathtab_codec::mapper::{Mapper, MapperCache, MapperConfig};
use pathtab_codec::Flattener;
use pathtab_format::{FlattenedRow, OutputMode, PathTabError, RenderConfig, Result, TabularDataset};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, debug_span, warn};

/// Phase of one render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Resolving the cell style
    Init,
    /// Producing the dataset
    Flatten,
    /// Pivoting headers into rows
    Transpose,
    /// Emitting the output
    Render,
    /// Finished
    Done,
}

/// Result of [`TabularRenderer::render`]
#[derive(Debug)]
pub enum RenderOutput {
    /// CSV, HTML, or flattened-JSON text
    Text(String),
    /// Workbook owned by the caller; released when dropped
    Workbook(Workbook),
}

impl RenderOutput {
    /// Text output, if this is not a workbook
    pub fn into_text(self) -> Option<String> {
        match self {
            RenderOutput::Text(text) => Some(text),
            RenderOutput::Workbook(_) => None,
        }
    }
}

/// Finalized headers plus the rows they index
#[derive(Debug, Clone)]
struct Table {
    headers: Vec<Header>,
    rows: Vec<FlattenedRow>,
}

/// Renders values as tables under one frozen [`RenderConfig`]
#[derive(Clone)]
pub struct TabularRenderer<'a> {
    config: &'a RenderConfig,
    mapper: Arc<Mapper>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl fmt::Debug for TabularRenderer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularRenderer")
            .field("config", &self.config)
            .field("mapper", &self.mapper)
            .finish()
    }
}

impl<'a> TabularRenderer<'a> {
    /// Renderer with a plain mapper and the [`SimpleExpression`] evaluator
    pub fn new(config: &'a RenderConfig) -> Self {
        Self::with_mapper(config, Arc::new(Mapper::default()))
    }

    /// Renderer using `mapper` for tree conversion
    pub fn with_mapper(config: &'a RenderConfig, mapper: Arc<Mapper>) -> Self {
        Self {
            config,
            mapper,
            evaluator: Arc::new(SimpleExpression),
        }
    }

    /// Renderer using a mapper resolved through the global [`MapperCache`]
    pub fn resolve(config: &'a RenderConfig, mapper_config: &MapperConfig) -> Result<Self> {
        let mapper = MapperCache::global().resolve(mapper_config)?;
        Ok(Self::with_mapper(config, mapper))
    }

    /// Replace the skip-row evaluator
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Render configuration
    pub fn config(&self) -> &RenderConfig {
        self.config
    }

    /// Render `value` in the configured mode
    ///
    /// # Errors
    ///
    /// Returns [`PathTabError::LimitExceeded`] when the output or row limit is
    /// passed; other failures while converting the value are logged and yield
    /// an empty table.
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<RenderOutput> {
        match self.config.mode() {
            OutputMode::Xlsx => Ok(RenderOutput::Workbook(self.render_workbook(value)?)),
            _ => Ok(RenderOutput::Text(self.render_to_string(value)?)),
        }
    }

    /// Render `value` as text
    pub fn render_to_string<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let mut out = Vec::new();
        self.render_to_writer(value, &mut out)?;
        String::from_utf8(out).map_err(|e| PathTabError::Internal(e.to_string()))
    }

    /// Render `value` as text into `writer`, returning the bytes written
    pub fn render_to_writer<T: Serialize + ?Sized, W: Write>(&self, value: &T, writer: W) -> Result<usize> {
        let dataset = self.dataset(value)?;
        self.write_dataset(&dataset, writer)
    }

    /// Render an already flattened dataset as text into `writer`
    ///
    /// # Errors
    ///
    /// Fails with [`PathTabError::InvalidConfig`] in workbook mode.
    pub fn write_dataset<W: Write>(&self, dataset: &TabularDataset, writer: W) -> Result<usize> {
        let span = debug_span!("render", mode = ?self.config.mode());
        let _enter = span.enter();

        phase(Phase::Init);
        let style = self.style();
        let table = self.prepare(dataset, &style)?;

        phase(Phase::Render);
        let mut sink = Sink::new(writer, self.config.limits());
        match self.config.mode() {
            OutputMode::Csv => write_csv(
                &mut sink,
                &table.headers,
                &table.rows,
                &style,
                self.config.delimiter(),
            )?,
            OutputMode::Html => write_html(
                &mut sink,
                &table.headers,
                &table.rows,
                &style,
                self.config.table_class(),
                false,
            )?,
            OutputMode::HtmlEmail => write_html(
                &mut sink,
                &table.headers,
                &table.rows,
                &style,
                self.config.table_class(),
                true,
            )?,
            OutputMode::FlattenedJson => write_flat_json(&mut sink, &table.headers, &table.rows)?,
            OutputMode::Xlsx => {
                return Err(PathTabError::InvalidConfig(
                    "xlsx output is a workbook, use render_workbook".to_string(),
                ))
            }
        }
        let written = sink.written();
        sink.finish()?;

        phase(Phase::Done);
        debug!(bytes = written, "rendered text");
        Ok(written)
    }

    /// Render `value` into a one-sheet workbook, whatever the configured mode
    pub fn render_workbook<T: Serialize + ?Sized>(&self, value: &T) -> Result<Workbook> {
        let dataset = self.dataset(value)?;
        let span = debug_span!("render", mode = "workbook");
        let _enter = span.enter();

        phase(Phase::Init);
        let style = CellStyle {
            target: Target::Plain,
            quoting: self.config.quoting(),
            formulas: self.config.formula_policy(),
        };
        let headers = finalize_headers(&dataset.headers, self.config.pin_order(), &style)?;

        phase(Phase::Render);
        let workbook = build_workbook(
            &headers,
            &dataset.rows,
            &style,
            self.config.transpose(),
            self.config.limits(),
        )?;
        phase(Phase::Done);
        Ok(workbook)
    }

    /// Flattened-JSON envelope of `value` as a tree
    pub fn flattened_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value> {
        let dataset = self.dataset(value)?;
        let style = CellStyle {
            target: Target::Plain,
            quoting: self.config.quoting(),
            formulas: self.config.formula_policy(),
        };
        let table = self.prepare(&dataset, &style)?;
        Ok(envelope(&table.headers, &table.rows))
    }

    /// Flatten `value` after data selection and row skipping
    pub fn dataset<T: Serialize + ?Sized>(&self, value: &T) -> Result<TabularDataset> {
        phase(Phase::Flatten);
        let flattener = Flattener::new(self.config, &self.mapper);
        let classifier = self.mapper.classifier();
        let probed = classifier.classify_root(value);
        let tree = match self.mapper.to_tree(value) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(
                    type_name = std::any::type_name::<T>(),
                    kind = %probed,
                    error = %e,
                    "value could not be decomposed, rendering an empty table"
                );
                return flattener.flatten_tree(Value::Array(Vec::new()));
            }
        };

        let (probed, tree) = match self.config.data_pointer() {
            Some(pointer) => {
                let tokens = parse_pointer(pointer, self.config.limits().max_depth)?;
                let selected = select(tree, &tokens).unwrap_or_else(|| {
                    warn!(pointer, "data pointer selects nothing, rendering an empty table");
                    Value::Array(Vec::new())
                });
                (classifier.classify(&selected), selected)
            }
            None => (probed, tree),
        };

        match self.config.skip_row_if() {
            Some(expression) => {
                let evaluator = self.evaluator.as_ref();
                flattener.flatten_root(probed, tree, |element| {
                    !should_skip(evaluator, expression, element)
                })
            }
            None => flattener.flatten_root(probed, tree, |_| true),
        }
    }

    fn style(&self) -> CellStyle {
        let target = match self.config.mode() {
            OutputMode::Csv => Target::Csv(self.config.delimiter()),
            OutputMode::Html | OutputMode::HtmlEmail => Target::Html,
            OutputMode::Xlsx | OutputMode::FlattenedJson => Target::Plain,
        };
        CellStyle {
            target,
            quoting: self.config.quoting(),
            formulas: self.config.formula_policy(),
        }
    }

    fn prepare(&self, dataset: &TabularDataset, style: &CellStyle) -> Result<Table> {
        let headers = finalize_headers(&dataset.headers, self.config.pin_order(), style)?;
        if !self.config.transpose() {
            return Ok(Table {
                headers,
                rows: dataset.rows.clone(),
            });
        }

        phase(Phase::Transpose);
        let (columns, rows) = transpose(&headers, &dataset.rows);
        let headers = columns
            .into_iter()
            .map(|column| {
                Ok(Header {
                    display: style.header(&column.raw)?,
                    raw: column.raw,
                })
            })
            .collect::<Result<Vec<Header>>>()?;
        Ok(Table { headers, rows })
    }
}

fn phase(phase: Phase) {
    debug!(?phase, "render phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(config: &RenderConfig, value: &Value) -> String {
        TabularRenderer::new(config).render_to_string(value).unwrap()
    }

    #[test]
    fn csv_end_to_end() {
        let config = RenderConfig::default();
        let text = render(
            &config,
            &json!([{"id": 1, "tags": ["a", "b"]}, {"id": 2, "tags": []}]),
        );
        assert_eq!(text, "id,tags[0],tags[1]\n1,a,b\n2,,\n");
    }

    #[test]
    fn data_pointer_and_skip_rows() {
        let config = RenderConfig::builder()
            .data_pointer("/result/items")
            .skip_row_if("hidden")
            .build()
            .unwrap();
        let text = render(
            &config,
            &json!({"result": {"items": [
                {"id": 1, "hidden": true},
                {"id": 2, "hidden": false},
                {"id": 3}
            ]}}),
        );
        assert_eq!(text, "hidden,id\nfalse,2\n,3\n");
    }

    #[test]
    fn missing_pointer_renders_headers_only() {
        let config = RenderConfig::builder()
            .data_pointer("/nope")
            .always_include("id")
            .build()
            .unwrap();
        assert_eq!(render(&config, &json!({"a": 1})), "id\n");
    }

    #[test]
    fn workbook_mode_refuses_text() {
        let config = RenderConfig::builder().mode(OutputMode::Xlsx).build().unwrap();
        let renderer = TabularRenderer::new(&config);
        assert!(renderer.render_to_string(&json!([{"a": 1}])).is_err());
        match renderer.render(&json!([{"a": 1}])).unwrap() {
            RenderOutput::Workbook(workbook) => {
                assert_eq!(workbook.sheet(0).unwrap().get(1, 0).as_str(), Some("1"));
            }
            other => panic!("expected workbook, got {:?}", other),
        }
    }

    struct Always;

    impl ExpressionEvaluator for Always {
        fn evaluate(&self, _expression: &str, _target: &Value) -> Result<Value> {
            Ok(Value::Bool(true))
        }
    }

    #[test]
    fn custom_evaluator() {
        let config = RenderConfig::builder().skip_row_if("anything").build().unwrap();
        let text = TabularRenderer::new(&config)
            .with_evaluator(Arc::new(Always))
            .render_to_string(&json!([{"a": 1}]))
            .unwrap();
        assert_eq!(text, "\n");
    }
}
