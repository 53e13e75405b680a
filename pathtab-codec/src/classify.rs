//! Node classification
//!
//! Every runtime value is classified into a closed [`NodeKind`]. Typed roots
//! are probed through serde without materializing them: the probe stops at the
//! first serializer call, which already tells a struct from a map, a sequence,
//! or a scalar. Decomposition into properties is left to the mapper.
//!
//! A named struct always serializes the same way, so its kind is computed once
//! per type and cached. Enums, options, and untyped trees are probed per value.

use crate::type_hint::short_type_name;
use ahash::AHashMap;
use pathtab_format::{Cell, NodeKind};
use serde::ser::{self, Impossible, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Extension point for object shapes that should flatten as one scalar cell
///
/// A money object `{"amount": "1.50", "currency": "EUR"}` can be registered to
/// render as `1.50 EUR` instead of two columns.
pub trait ScalarRule: Send + Sync {
    /// Rule name (for logging)
    fn name(&self) -> &str;

    /// Whether `object` has this rule's shape
    fn matches(&self, object: &Map<String, Value>) -> bool;

    /// Text for a matching object
    fn stringify(&self, object: &Map<String, Value>) -> String;
}

/// Classifier backed by a mapper's registered scalar rules
#[derive(Clone, Copy)]
pub struct NodeClassifier<'a> {
    rules: &'a [Arc<dyn ScalarRule>],
}

impl fmt::Debug for NodeClassifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeClassifier")
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl<'a> NodeClassifier<'a> {
    /// Classifier using `rules` as registered scalar shapes
    pub fn new(rules: &'a [Arc<dyn ScalarRule>]) -> Self {
        Self { rules }
    }

    /// Classifier with no scalar rules
    pub fn plain() -> NodeClassifier<'static> {
        NodeClassifier { rules: &[] }
    }

    /// Classify a tree node
    pub fn classify(&self, value: &Value) -> NodeKind {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => NodeKind::Scalar,
            Value::Array(_) => NodeKind::Sequence,
            Value::Object(object) => {
                if self.rule_for(object).is_some() {
                    NodeKind::Scalar
                } else {
                    NodeKind::Mapping
                }
            }
        }
    }

    /// Classify a typed value by probing its serde shape
    pub fn classify_root<T: Serialize + ?Sized>(&self, value: &T) -> NodeKind {
        probe_kind(value)
    }

    /// Kind of a root `tree` converted from a value whose probed kind is `probed`
    ///
    /// The tree decides the shape; the probe only tells a record type apart
    /// from a native map, which both become objects.
    pub fn classify_converted(&self, probed: NodeKind, tree: &Value) -> NodeKind {
        match (probed, self.classify(tree)) {
            (NodeKind::Bean, NodeKind::Mapping) => NodeKind::Bean,
            (_, observed) => observed,
        }
    }

    /// Cell text for a scalar node
    ///
    /// Containers that reach here (only when a caller skips classification)
    /// are rendered as compact JSON.
    pub fn stringify(&self, value: &Value) -> Cell {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Text(b.to_string()),
            Value::Number(n) => Cell::Text(n.to_string()),
            Value::String(s) => Cell::Text(s.clone()),
            Value::Object(object) => match self.rule_for(object) {
                Some(rule) => Cell::Text(rule.stringify(object)),
                None => Cell::Text(value.to_string()),
            },
            Value::Array(_) => Cell::Text(value.to_string()),
        }
    }

    fn rule_for(&self, object: &Map<String, Value>) -> Option<&Arc<dyn ScalarRule>> {
        self.rules.iter().find(|rule| rule.matches(object))
    }
}

/// Serde shape of `value` without serializing it fully
pub fn probe_kind<T: Serialize + ?Sized>(value: &T) -> NodeKind {
    let type_name = std::any::type_name::<T>();
    if let Some(kind) = shapes().read().unwrap().get(type_name) {
        return *kind;
    }

    let probe = ShapeProbe {
        type_name: short_type_name(type_name),
    };
    match value.serialize(probe) {
        Ok(kind) | Err(ProbeError::Found(kind)) => kind,
        Err(ProbeError::Fixed(kind)) => {
            shapes().write().unwrap().insert(type_name, kind);
            kind
        }
        Err(ProbeError::Custom(message)) => {
            tracing::debug!(
                type_name,
                %message,
                "shape probe failed, treating value as bean"
            );
            NodeKind::Bean
        }
    }
}

/// Whether the kind of `T` has been cached
pub fn is_shape_cached<T: ?Sized>() -> bool {
    shapes()
        .read()
        .unwrap()
        .contains_key(std::any::type_name::<T>())
}

fn shapes() -> &'static RwLock<AHashMap<&'static str, NodeKind>> {
    static SHAPES: OnceLock<RwLock<AHashMap<&'static str, NodeKind>>> = OnceLock::new();
    SHAPES.get_or_init(|| RwLock::new(AHashMap::new()))
}

#[derive(Debug)]
enum ProbeError {
    /// Compound shape found; carried as an error to stop serialization early
    Found(NodeKind),
    /// Shape of a named struct, the same for every value of its type
    Fixed(NodeKind),
    Custom(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Found(kind) | ProbeError::Fixed(kind) => write!(f, "found {}", kind),
            ProbeError::Custom(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for ProbeError {}

impl ser::Error for ProbeError {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        ProbeError::Custom(msg.to_string())
    }
}

struct ShapeProbe<'n> {
    /// Short name of the probed type
    type_name: &'n str,
}

type Never = Impossible<NodeKind, ProbeError>;

impl ser::Serializer for ShapeProbe<'_> {
    type Ok = NodeKind;
    type Error = ProbeError;
    type SerializeSeq = Never;
    type SerializeTuple = Never;
    type SerializeTupleStruct = Never;
    type SerializeTupleVariant = Never;
    type SerializeMap = Never;
    type SerializeStruct = Never;
    type SerializeStructVariant = Never;

    fn serialize_bool(self, _v: bool) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_i8(self, _v: i8) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_i16(self, _v: i16) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_i32(self, _v: i32) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_i64(self, _v: i64) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_i128(self, _v: i128) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_u8(self, _v: u8) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_u16(self, _v: u16) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_u32(self, _v: u32) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_u64(self, _v: u64) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_u128(self, _v: u128) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_f32(self, _v: f32) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_f64(self, _v: f64) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_char(self, _v: char) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_str(self, _v: &str) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Sequence)
    }

    fn serialize_none(self) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<NodeKind, ProbeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Scalar)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<NodeKind, ProbeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<NodeKind, ProbeError> {
        Ok(NodeKind::Bean)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Never, ProbeError> {
        Err(ProbeError::Found(NodeKind::Sequence))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Never, ProbeError> {
        Err(ProbeError::Found(NodeKind::Sequence))
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Never, ProbeError> {
        Err(ProbeError::Found(NodeKind::Sequence))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Never, ProbeError> {
        Err(ProbeError::Found(NodeKind::Bean))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Never, ProbeError> {
        Err(ProbeError::Found(NodeKind::Mapping))
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Never, ProbeError> {
        if name == self.type_name {
            Err(ProbeError::Fixed(NodeKind::Bean))
        } else {
            Err(ProbeError::Found(NodeKind::Bean))
        }
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Never, ProbeError> {
        Err(ProbeError::Found(NodeKind::Bean))
    }
}
