//! Delimited text emission
//!
//! Quoting goes through `csv::Writer`: each field is quoted on its own under
//! the configured style, and lines are assembled by a second writer that never
//! quotes, so formula cells and pre-quoted fields pass through verbatim.

use crate::cell::CellStyle;
use crate::header::Header;
use crate::sink::Sink;
use ::csv::{QuoteStyle, Terminator, WriterBuilder};
use pathtab_format::{FlattenedRow, PathTabError, QuoteMode, Result};
use std::io::Write;

/// Quote one field as a CSV writer with `delimiter` and `quoting` would
///
/// An empty field is written bare unless quoting is [`QuoteMode::Always`].
pub fn quote_field(text: &str, delimiter: char, quoting: QuoteMode) -> Result<String> {
    if text.is_empty() {
        return Ok(match quoting {
            QuoteMode::Always => "\"\"".to_string(),
            QuoteMode::Escape | QuoteMode::Never => String::new(),
        });
    }
    let style = match quoting {
        QuoteMode::Escape => QuoteStyle::Necessary,
        QuoteMode::Always => QuoteStyle::Always,
        QuoteMode::Never => QuoteStyle::Never,
    };
    let mut line = record(&builder(delimiter, style)?, &[text])?;
    line.pop();
    Ok(line)
}

/// Write a header line and one line per row
pub fn write_csv<W: Write>(
    sink: &mut Sink<'_, W>,
    headers: &[Header],
    rows: &[FlattenedRow],
    style: &CellStyle,
    delimiter: char,
) -> Result<()> {
    let lines = builder(delimiter, QuoteStyle::Never)?;

    let header_line: Vec<&str> = headers.iter().map(|h| h.display.as_str()).collect();
    sink.push(&record(&lines, header_line.as_slice())?)?;

    for row in rows {
        let cells = headers
            .iter()
            .map(|h| style.cell(row.get(&h.raw)))
            .collect::<Result<Vec<String>>>()?;
        sink.push(&record(&lines, cells.as_slice())?)?;
    }
    Ok(())
}

fn builder(delimiter: char, style: QuoteStyle) -> Result<WriterBuilder> {
    let delimiter = u8::try_from(delimiter).map_err(|_| {
        PathTabError::InvalidConfig(format!("delimiter {:?} is not a single byte", delimiter))
    })?;
    let mut builder = WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(style)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true);
    Ok(builder)
}

/// One newline-terminated record
fn record<S: AsRef<str>>(builder: &WriterBuilder, fields: &[S]) -> Result<String> {
    // a lone empty field would be written as `""`
    if fields.iter().all(|f| f.as_ref().is_empty()) && fields.len() <= 1 {
        return Ok("\n".to_string());
    }

    let mut writer = builder.from_writer(Vec::new());
    writer
        .write_record(fields.iter().map(|f| f.as_ref()))
        .map_err(csv_error)?;
    let bytes = writer.into_inner().map_err(|e| {
        PathTabError::Io(std::io::Error::new(e.error().kind(), e.error().to_string()))
    })?;
    String::from_utf8(bytes).map_err(|e| PathTabError::Internal(format!("csv writer: {}", e)))
}

fn csv_error(err: ::csv::Error) -> PathTabError {
    match err.into_kind() {
        ::csv::ErrorKind::Io(io) => PathTabError::Io(io),
        other => PathTabError::Internal(format!("csv writer: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Target;
    use crate::header::plain_headers;
    use pathtab_format::{Cell, FormulaPolicy, Limits};

    fn escape(text: &str) -> String {
        quote_field(text, ',', QuoteMode::Escape).unwrap()
    }

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
        assert_eq!(escape(""), "");
        assert_eq!(quote_field("a,b", ';', QuoteMode::Escape).unwrap(), "a,b");
        assert_eq!(quote_field("a;b", ';', QuoteMode::Escape).unwrap(), "\"a;b\"");
    }

    #[test]
    fn always_and_never() {
        assert_eq!(quote_field("x", ',', QuoteMode::Always).unwrap(), "\"x\"");
        assert_eq!(quote_field("a\"b", ',', QuoteMode::Always).unwrap(), "\"a\"\"b\"");
        assert_eq!(quote_field("", ',', QuoteMode::Always).unwrap(), "\"\"");
        assert_eq!(quote_field("a,\"b", ',', QuoteMode::Never).unwrap(), "a,\"b");
    }

    #[test]
    fn multibyte_delimiters_are_rejected() {
        let err = quote_field("x", '§', QuoteMode::Escape).unwrap_err();
        assert!(matches!(err, PathTabError::InvalidConfig(_)));
    }

    #[test]
    fn lines_keep_cells_verbatim() {
        let headers = plain_headers(["f", "id"]);
        let rows: Vec<FlattenedRow> = vec![
            [
                ("f".to_string(), Cell::Formula("=\"007\"".to_string())),
                ("id".to_string(), Cell::Text("a,b".to_string())),
            ]
            .into_iter()
            .collect(),
            [("id".to_string(), Cell::Null)].into_iter().collect(),
        ];
        let style = CellStyle {
            target: Target::Csv(','),
            quoting: QuoteMode::Escape,
            formulas: FormulaPolicy::default(),
        };

        let limits = Limits::default();
        let mut out = Vec::new();
        let mut sink = Sink::new(&mut out, &limits);
        write_csv(&mut sink, &headers, &rows, &style, ',').unwrap();
        sink.finish().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "f,id\n=\"007\",\"a,b\"\n,\n"
        );
    }

    #[test]
    fn single_empty_column_is_a_blank_line() {
        let headers = plain_headers(["id"]);
        let rows = vec![FlattenedRow::new()];
        let style = CellStyle {
            target: Target::Csv(','),
            quoting: QuoteMode::Escape,
            formulas: FormulaPolicy::default(),
        };

        let limits = Limits::default();
        let mut out = Vec::new();
        let mut sink = Sink::new(&mut out, &limits);
        write_csv(&mut sink, &headers, &rows, &style, ',').unwrap();
        sink.finish().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id\n\n");
    }
}
