//! Header finalization
//!
//! Headers are escaped for the target, sorted by their escaped text, and then
//! the pinned headers are moved to the front in their declared order.

use crate::cell::CellStyle;
use pathtab_format::Result;
use std::collections::BTreeSet;

/// Header name as stored in rows and as displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Key in the flattened rows
    pub raw: String,
    /// Escaped text for the target
    pub display: String,
}

/// Ordered headers for emission
///
/// Pins are matched against raw names; pins naming no observed header are ignored.
pub fn finalize_headers(
    headers: &BTreeSet<String>,
    pin_order: &[String],
    style: &CellStyle,
) -> Result<Vec<Header>> {
    let mut ordered = headers
        .iter()
        .map(|raw| {
            Ok(Header {
                raw: raw.clone(),
                display: style.header(raw)?,
            })
        })
        .collect::<Result<Vec<Header>>>()?;
    ordered.sort_by(|a, b| a.display.cmp(&b.display));

    for pin in pin_order.iter().rev() {
        if let Some(position) = ordered.iter().position(|h| &h.raw == pin) {
            let header = ordered.remove(position);
            ordered.insert(0, header);
        }
    }
    Ok(ordered)
}

/// Unescaped headers in the given order
pub fn plain_headers<I, S>(names: I) -> Vec<Header>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(|name| {
            let raw = name.into();
            Header {
                display: raw.clone(),
                raw,
            }
        })
        .collect()
}
