//! Node classification and cell model

use serde::{Serialize, Serializer};
use std::fmt;

/// Shape of a value as seen by the flattener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Number, boolean, string, null, unit enum, or registered scalar shape
    Scalar,
    /// Ordered or unordered collection
    Sequence,
    /// Native map keyed by stringified keys
    Mapping,
    /// Record type decomposed into named properties through the mapper
    Bean,
}

impl NodeKind {
    /// Whether children are addressed by property name
    pub fn is_keyed(&self) -> bool {
        matches!(self, NodeKind::Mapping | NodeKind::Bean)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Scalar => "scalar",
            NodeKind::Sequence => "sequence",
            NodeKind::Mapping => "mapping",
            NodeKind::Bean => "bean",
        };
        f.write_str(name)
    }
}

/// One value in a flattened row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Explicit null leaf
    Null,
    /// Stringified scalar
    Text(String),
    /// Engine-generated spreadsheet formula (`="00123"`), always emitted verbatim
    Formula(String),
}

impl Cell {
    /// Text content, `None` for null
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Null => None,
            Cell::Text(text) | Cell::Formula(text) => Some(text),
        }
    }

    /// Whether this cell is null
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::Text(text.to_string())
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Cell::Text(text)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(text) => serializer.serialize_str(text),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_serializes_as_string_or_null() {
        assert_eq!(serde_json::to_string(&Cell::from("a")).unwrap(), "\"a\"");
        assert_eq!(
            serde_json::to_string(&Cell::Formula("=\"1\"".into())).unwrap(),
            "\"=\\\"1\\\"\""
        );
        assert_eq!(serde_json::to_string(&Cell::Null).unwrap(), "null");
    }

    #[test]
    fn keyed_kinds() {
        assert!(NodeKind::Bean.is_keyed());
        assert!(NodeKind::Mapping.is_keyed());
        assert!(!NodeKind::Sequence.is_keyed());
        assert_eq!(NodeKind::Sequence.to_string(), "sequence");
    }
}
