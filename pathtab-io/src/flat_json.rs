//! Flattened-JSON envelope: `{"headers": [...], "data": [...]}`

use crate::header::Header;
use crate::sink::Sink;
use pathtab_format::{Cell, FlattenedRow, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;

#[derive(Serialize)]
struct Envelope<'a> {
    headers: Vec<&'a str>,
    data: Vec<Map<String, Value>>,
}

/// Envelope value; cells keep their raw text and rows list headers in order
pub fn envelope(headers: &[Header], rows: &[FlattenedRow]) -> Value {
    let data = rows
        .iter()
        .map(|row| Value::Object(row_object(headers, row)))
        .collect();
    let headers = headers.iter().map(|h| Value::String(h.raw.clone())).collect();

    let mut out = Map::new();
    out.insert("headers".to_string(), Value::Array(headers));
    out.insert("data".to_string(), Value::Array(data));
    Value::Object(out)
}

/// Write the envelope as compact JSON
pub fn write_flat_json<W: Write>(
    sink: &mut Sink<'_, W>,
    headers: &[Header],
    rows: &[FlattenedRow],
) -> Result<()> {
    let envelope = Envelope {
        headers: headers.iter().map(|h| h.raw.as_str()).collect(),
        data: rows.iter().map(|row| row_object(headers, row)).collect(),
    };
    sink.push(&serde_json::to_string(&envelope)?)
}

fn row_object(headers: &[Header], row: &FlattenedRow) -> Map<String, Value> {
    let mut object = Map::new();
    for header in headers {
        if let Some(cell) = row.get(&header.raw) {
            let value = match cell {
                Cell::Null => Value::Null,
                Cell::Text(text) | Cell::Formula(text) => Value::String(text.clone()),
            };
            object.insert(header.raw.clone(), value);
        }
    }
    object
}
