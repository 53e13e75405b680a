//! HTML table emission from fixed shell templates

use crate::cell::CellStyle;
use crate::header::Header;
use crate::sink::Sink;
use pathtab_format::escape::html_escape;
use pathtab_format::{FlattenedRow, Result};
use std::io::Write;

const EMPTY_HEAD: &str = "<thead></thead>";

/// Write `<table class="..."><thead>..</thead><tbody>..</tbody></table>`
///
/// The email variant folds the header row into the body and drops the then
/// empty `<thead>`.
pub fn write_html<W: Write>(
    sink: &mut Sink<'_, W>,
    headers: &[Header],
    rows: &[FlattenedRow],
    style: &CellStyle,
    table_class: &str,
    email: bool,
) -> Result<()> {
    let header_row = header_row(headers);
    let (head, body_prefix) = if email {
        ("", header_row.as_str())
    } else {
        (header_row.as_str(), "")
    };

    let open = format!(
        "<table class=\"{}\"><thead>{}</thead><tbody>{}",
        html_escape(table_class),
        head,
        body_prefix
    );
    sink.push(&open.replace(EMPTY_HEAD, ""))?;

    for row in rows {
        sink.push(&data_row(headers, row, style)?)?;
    }
    sink.push("</tbody></table>")
}

fn header_row(headers: &[Header]) -> String {
    let mut out = String::from("<tr>");
    for header in headers {
        out.push_str("<th>");
        out.push_str(&header.display);
        out.push_str("</th>");
    }
    out.push_str("</tr>");
    out
}

fn data_row(headers: &[Header], row: &FlattenedRow, style: &CellStyle) -> Result<String> {
    let mut out = String::from("<tr>");
    for header in headers {
        out.push_str("<td>");
        out.push_str(&style.cell(row.get(&header.raw))?);
        out.push_str("</td>");
    }
    out.push_str("</tr>");
    Ok(out)
}
