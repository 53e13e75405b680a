//! pathtab CLI - Render JSON as tables and rebuild JSON from flattened rows
//!
//! This binary provides command-line interfaces for:
//! - render: flatten a JSON document → CSV / HTML / HTML email / flattened JSON
//! - unflatten: rebuild nested JSON from path-keyed rows

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pathtab_codec::mapper::MapperConfigBuilder;
use pathtab_codec::reconstruct_with_separator;
use pathtab_format::{FormulaPolicy, OutputMode, RenderConfigBuilder};
use pathtab_io::TabularRenderer;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "pathtab")]
#[command(about = "Flatten JSON into tables and back")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a JSON document as a table
    ///
    /// Examples:
    ///   pathtab render orders.json
    ///   pathtab render orders.json --format html --pin id --pin name
    ///   pathtab render report.json --pointer /data --transpose -o out.csv
    Render {
        /// Input file (JSON)
        input: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = RenderFormat::Csv)]
        format: RenderFormat,
        /// TOML file with `[render]` and `[mapper]` tables
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON Pointer selecting the rows inside the document
        #[arg(long)]
        pointer: Option<String>,
        /// Pivot headers into rows
        #[arg(long)]
        transpose: bool,
        /// CSV field delimiter
        #[arg(long)]
        delimiter: Option<char>,
        /// Header pinned to the front (repeatable, in order)
        #[arg(long = "pin")]
        pins: Vec<String>,
        /// Property name or `@REGEX@` path pattern to leave out (repeatable)
        #[arg(long = "skip")]
        skips: Vec<String>,
        /// Skip rows for which this expression is true (e.g. `archived == true`)
        #[arg(long)]
        skip_row_if: Option<String>,
        /// Emit `=`-prefixed text unescaped so spreadsheets evaluate it
        #[arg(long)]
        allow_formulas: bool,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show progress spinner while rendering
        #[arg(long)]
        progress: bool,
    },
    /// Rebuild nested JSON from flattened rows
    ///
    /// Accepts a flattened-JSON envelope (`{"headers": [...], "data": [...]}`),
    /// an array of flat objects, or a single flat object.
    Unflatten {
        /// Input file (JSON)
        input: PathBuf,
        /// Separator between path segments
        #[arg(long, default_value = ".")]
        separator: String,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum RenderFormat {
    Csv,
    Html,
    #[value(name = "html-email")]
    HtmlEmail,
    Json,
}

impl From<RenderFormat> for OutputMode {
    fn from(format: RenderFormat) -> Self {
        match format {
            RenderFormat::Csv => OutputMode::Csv,
            RenderFormat::Html => OutputMode::Html,
            RenderFormat::HtmlEmail => OutputMode::HtmlEmail,
            RenderFormat::Json => OutputMode::FlattenedJson,
        }
    }
}

/// Contents of a `--config` file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    render: RenderConfigBuilder,
    mapper: MapperConfigBuilder,
}

impl ConfigFile {
    fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
        let config = toml::from_str(&text)
            .map_err(|e| format!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }
}

struct RenderArgs {
    input: PathBuf,
    format: RenderFormat,
    config: Option<PathBuf>,
    pointer: Option<String>,
    transpose: bool,
    delimiter: Option<char>,
    pins: Vec<String>,
    skips: Vec<String>,
    skip_row_if: Option<String>,
    allow_formulas: bool,
    output: Option<PathBuf>,
    progress: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Render {
            input,
            format,
            config,
            pointer,
            transpose,
            delimiter,
            pins,
            skips,
            skip_row_if,
            allow_formulas,
            output,
            progress,
        } => {
            handle_render(RenderArgs {
                input,
                format,
                config,
                pointer,
                transpose,
                delimiter,
                pins,
                skips,
                skip_row_if,
                allow_formulas,
                output,
                progress,
            })?;
        }
        Commands::Unflatten {
            input,
            separator,
            output,
            pretty,
        } => {
            handle_unflatten(input, separator, output, pretty)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn handle_render(args: RenderArgs) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    let render = apply_overrides(file.render, &args);
    let config = render.build()?;
    let mapper_config = file.mapper.build()?;

    let document = read_json(&args.input)?;
    let renderer = TabularRenderer::resolve(&config, &mapper_config)?;

    let progress_bar = args.progress.then(|| create_spinner("Rendering"));
    let writer = open_output(args.output.as_deref())?;
    let written = renderer.render_to_writer(&document, writer)?;
    if let Some(pb) = progress_bar {
        pb.finish_with_message(format!("Rendered {} bytes in {:.2?}", written, start.elapsed()));
    }

    info!(
        input = %args.input.display(),
        mode = ?config.mode(),
        bytes = written,
        "render complete"
    );
    Ok(())
}

/// Command-line flags win over the config file
fn apply_overrides(mut render: RenderConfigBuilder, args: &RenderArgs) -> RenderConfigBuilder {
    render.mode = args.format.into();
    if let Some(pointer) = &args.pointer {
        render.data_pointer = Some(pointer.clone());
    }
    if args.transpose {
        render.transpose = true;
    }
    if let Some(delimiter) = args.delimiter {
        render.delimiter = delimiter;
    }
    if !args.pins.is_empty() {
        render.pin_order = args.pins.clone();
    }
    render.skip_properties.extend(args.skips.iter().cloned());
    if let Some(expression) = &args.skip_row_if {
        render.skip_row_if = Some(expression.clone());
    }
    if args.allow_formulas {
        render.formula_policy = FormulaPolicy::Passthrough;
    }
    render
}

fn handle_unflatten(
    input: PathBuf,
    separator: String,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), Box<dyn Error>> {
    let document = read_json(&input)?;
    let rows = flat_rows(document)?;
    debug!(rows = rows.len(), separator = %separator, "rebuilding rows");

    let rebuilt: Vec<Value> = rows
        .into_iter()
        .map(|row| reconstruct_with_separator(row, &separator, None))
        .collect();

    let mut writer = open_output(output.as_deref())?;
    if pretty {
        serde_json::to_writer_pretty(&mut writer, &rebuilt)?;
    } else {
        serde_json::to_writer(&mut writer, &rebuilt)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Flat rows from an envelope, an array of objects, or a single object
fn flat_rows(document: Value) -> Result<Vec<Map<String, Value>>, Box<dyn Error>> {
    let rows = match document {
        Value::Object(mut map) if map.contains_key("headers") && map.contains_key("data") => {
            match map.remove("data") {
                Some(Value::Array(items)) => items,
                _ => return Err("flattened JSON `data` must be an array".into()),
            }
        }
        Value::Object(map) => return Ok(vec![map]),
        Value::Array(items) => items,
        other => return Err(format!("expected flat rows, found {}", kind_name(&other)).into()),
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(map) => Ok(map),
            other => Err(format!("row {} is {}, expected an object", index, kind_name(&other)).into()),
        })
        .collect()
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let value = serde_json::from_reader(io::BufReader::new(file))
        .map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))?;
    Ok(value)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, Box<dyn Error>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(format: RenderFormat) -> RenderArgs {
        RenderArgs {
            input: PathBuf::from("in.json"),
            format,
            config: None,
            pointer: None,
            transpose: false,
            delimiter: None,
            pins: Vec::new(),
            skips: Vec::new(),
            skip_row_if: None,
            allow_formulas: false,
            output: None,
            progress: false,
        }
    }

    #[test]
    fn flags_override_config_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [render]
            delimiter = ";"
            pin_order = ["name"]
            skip_properties = ["secret"]

            [mapper]
            skip_fields = ["password"]
            "#,
        )
        .unwrap();

        let mut cli = args(RenderFormat::Html);
        cli.pins = vec!["id".to_string()];
        cli.skips = vec!["token".to_string()];
        cli.allow_formulas = true;

        let config = apply_overrides(file.render, &cli).build().unwrap();
        assert_eq!(config.mode(), OutputMode::Html);
        assert_eq!(config.delimiter(), ';');
        assert_eq!(config.pin_order(), &["id".to_string()]);
        assert!(config.skip_rules().skips_property("secret"));
        assert!(config.skip_rules().skips_property("token"));
        assert_eq!(config.formula_policy(), FormulaPolicy::Passthrough);

        let mapper = file.mapper.build().unwrap();
        assert!(mapper.skip_fields().contains("password"));
    }

    #[test]
    fn flat_rows_accepts_three_shapes() {
        let envelope = json!({"headers": ["a"], "data": [{"a": "1"}, {"a": "2"}]});
        assert_eq!(flat_rows(envelope).unwrap().len(), 2);

        let array = json!([{"a": "1"}]);
        assert_eq!(flat_rows(array).unwrap().len(), 1);

        let single = json!({"a.b": "1"});
        assert_eq!(flat_rows(single).unwrap()[0]["a.b"], "1");

        assert!(flat_rows(json!([1])).is_err());
        assert!(flat_rows(json!("text")).is_err());
    }

    #[test]
    fn render_format_maps_to_modes() {
        assert_eq!(OutputMode::from(RenderFormat::Json), OutputMode::FlattenedJson);
        assert_eq!(OutputMode::from(RenderFormat::HtmlEmail), OutputMode::HtmlEmail);
    }
}
