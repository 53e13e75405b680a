//! Fail-open conversion of `Serialize` values into generic trees
//!
//! Every struct field, map entry, and sequence element is serialized on its
//! own. One that fails is logged with its type and path and left out, so a
//! broken subtree never costs the rest of the value. Elements of a root
//! sequence become empty objects instead, keeping one row per element.

use crate::classify::probe_kind;
use crate::type_hint::short_type_name;
use pathtab_format::Result;
use serde::ser::{self, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

type Error = serde_json::Error;

/// Tree for `value`, leaving out the parts that fail to serialize
///
/// # Errors
///
/// Fails only when the root itself cannot be serialized.
pub fn lenient_tree<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(value.serialize(TreeSerializer {
        trail: None,
        root: true,
    })?)
}

/// Location of the value being serialized, for logging
#[derive(Clone, Copy)]
struct Trail<'t> {
    parent: Option<&'t Trail<'t>>,
    step: Step<'t>,
}

#[derive(Clone, Copy)]
enum Step<'t> {
    Field(&'t str),
    Index(usize),
}

struct Path<'t>(Option<&'t Trail<'t>>);

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write(trail: &Trail<'_>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            if let Some(parent) = trail.parent {
                write(parent, f)?;
            }
            match trail.step {
                Step::Field(name) if trail.parent.is_some() => write!(f, ".{}", name),
                Step::Field(name) => f.write_str(name),
                Step::Index(index) => write!(f, "[{}]", index),
            }
        }
        match self.0 {
            Some(trail) => write(trail, f),
            None => f.write_str("<root>"),
        }
    }
}

/// Serialize one child under `trail`, logging and returning `None` on failure
fn child<T: Serialize + ?Sized>(value: &T, trail: &Trail<'_>) -> Option<Value> {
    match value.serialize(TreeSerializer {
        trail: Some(trail),
        root: false,
    }) {
        Ok(tree) => Some(tree),
        Err(e) => {
            warn!(
                path = %Path(Some(trail)),
                type_name = short_type_name(std::any::type_name::<T>()),
                kind = %probe_kind(value),
                error = %e,
                "value could not be decomposed, leaving it out"
            );
            None
        }
    }
}

struct TreeSerializer<'t> {
    trail: Option<&'t Trail<'t>>,
    root: bool,
}

fn map_key(key: Value) -> std::result::Result<String, Error> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ser::Error::custom(format!(
            "map key must be a string, found {}",
            other
        ))),
    }
}

impl<'t> ser::Serializer for TreeSerializer<'t> {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SeqBuilder<'t>;
    type SerializeTuple = SeqBuilder<'t>;
    type SerializeTupleStruct = SeqBuilder<'t>;
    type SerializeTupleVariant = VariantBuilder<SeqBuilder<'t>>;
    type SerializeMap = MapBuilder<'t>;
    type SerializeStruct = StructBuilder<'t>;
    type SerializeStructVariant = VariantBuilder<StructBuilder<'t>>;

    fn serialize_bool(self, v: bool) -> std::result::Result<Value, Error> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> std::result::Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> std::result::Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> std::result::Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> std::result::Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> std::result::Result<Value, Error> {
        ser::Serializer::serialize_i128(serde_json::value::Serializer, v)
    }

    fn serialize_u8(self, v: u8) -> std::result::Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> std::result::Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> std::result::Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> std::result::Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> std::result::Result<Value, Error> {
        ser::Serializer::serialize_u128(serde_json::value::Serializer, v)
    }

    fn serialize_f32(self, v: f32) -> std::result::Result<Value, Error> {
        ser::Serializer::serialize_f32(serde_json::value::Serializer, v)
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<Value, Error> {
        ser::Serializer::serialize_f64(serde_json::value::Serializer, v)
    }

    fn serialize_char(self, v: char) -> std::result::Result<Value, Error> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> std::result::Result<Value, Error> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> std::result::Result<Value, Error> {
        Ok(Value::Array(v.iter().map(|&b| Value::from(b)).collect()))
    }

    fn serialize_none(self) -> std::result::Result<Value, Error> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> std::result::Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> std::result::Result<Value, Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> std::result::Result<Value, Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> std::result::Result<Value, Error> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> std::result::Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> std::result::Result<Value, Error> {
        let trail = Trail {
            parent: self.trail,
            step: Step::Field(variant),
        };
        let inner = value.serialize(TreeSerializer {
            trail: Some(&trail),
            root: false,
        })?;
        let mut map = Map::with_capacity(1);
        map.insert(variant.to_string(), inner);
        Ok(Value::Object(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> std::result::Result<SeqBuilder<'t>, Error> {
        Ok(SeqBuilder {
            trail: self.trail,
            rows: self.root,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> std::result::Result<SeqBuilder<'t>, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> std::result::Result<SeqBuilder<'t>, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> std::result::Result<VariantBuilder<SeqBuilder<'t>>, Error> {
        Ok(VariantBuilder {
            variant,
            inner: SeqBuilder {
                trail: self.trail,
                rows: false,
                items: Vec::with_capacity(len),
            },
        })
    }

    fn serialize_map(self, len: Option<usize>) -> std::result::Result<MapBuilder<'t>, Error> {
        Ok(MapBuilder {
            trail: self.trail,
            map: Map::with_capacity(len.unwrap_or(0)),
            next_key: None,
        })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> std::result::Result<StructBuilder<'t>, Error> {
        Ok(StructBuilder {
            trail: self.trail,
            name,
            map: Map::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> std::result::Result<VariantBuilder<StructBuilder<'t>>, Error> {
        Ok(VariantBuilder {
            variant,
            inner: StructBuilder {
                trail: self.trail,
                name: variant,
                map: Map::with_capacity(len),
            },
        })
    }
}

struct SeqBuilder<'t> {
    trail: Option<&'t Trail<'t>>,
    /// Elements of the root sequence; failures keep their slot as `{}`
    rows: bool,
    items: Vec<Value>,
}

impl SeqBuilder<'_> {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) {
        let trail = Trail {
            parent: self.trail,
            step: Step::Index(self.items.len()),
        };
        match child(value, &trail) {
            Some(tree) => self.items.push(tree),
            None if self.rows => self.items.push(Value::Object(Map::new())),
            None => {}
        }
    }
}

impl ser::SerializeSeq for SeqBuilder<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Error> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> std::result::Result<Value, Error> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Error> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> std::result::Result<Value, Error> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTupleStruct for SeqBuilder<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Error> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> std::result::Result<Value, Error> {
        Ok(Value::Array(self.items))
    }
}

struct MapBuilder<'t> {
    trail: Option<&'t Trail<'t>>,
    map: Map<String, Value>,
    /// Key of the entry in progress; `None` after a key failed
    next_key: Option<String>,
}

impl ser::SerializeMap for MapBuilder<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> std::result::Result<(), Error> {
        let key = serde_json::to_value(key).and_then(map_key);
        match key {
            Ok(key) => self.next_key = Some(key),
            Err(e) => {
                warn!(
                    path = %Path(self.trail),
                    type_name = short_type_name(std::any::type_name::<T>()),
                    error = %e,
                    "map key could not be serialized, leaving the entry out"
                );
                self.next_key = None;
            }
        }
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Error> {
        let Some(key) = self.next_key.take() else {
            return Ok(());
        };
        let trail = Trail {
            parent: self.trail,
            step: Step::Field(&key),
        };
        if let Some(tree) = child(value, &trail) {
            self.map.insert(key.clone(), tree);
        }
        Ok(())
    }

    fn end(self) -> std::result::Result<Value, Error> {
        Ok(Value::Object(self.map))
    }
}

struct StructBuilder<'t> {
    trail: Option<&'t Trail<'t>>,
    name: &'static str,
    map: Map<String, Value>,
}

impl StructBuilder<'_> {
    fn field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) {
        let trail = Trail {
            parent: self.trail,
            step: Step::Field(key),
        };
        match child(value, &trail) {
            Some(tree) => {
                self.map.insert(key.to_string(), tree);
            }
            None => tracing::debug!(bean = self.name, field = key, "field dropped from bean"),
        }
    }
}

impl ser::SerializeStruct for StructBuilder<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), Error> {
        self.field(key, value);
        Ok(())
    }

    fn end(self) -> std::result::Result<Value, Error> {
        Ok(Value::Object(self.map))
    }
}

/// `{variant: inner}` wrapper for tuple and struct variants
struct VariantBuilder<B> {
    variant: &'static str,
    inner: B,
}

impl VariantBuilder<SeqBuilder<'_>> {
    fn finish(self) -> Value {
        let mut map = Map::with_capacity(1);
        map.insert(self.variant.to_string(), Value::Array(self.inner.items));
        Value::Object(map)
    }
}

impl ser::SerializeTupleVariant for VariantBuilder<SeqBuilder<'_>> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), Error> {
        self.inner.push(value);
        Ok(())
    }

    fn end(self) -> std::result::Result<Value, Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for VariantBuilder<StructBuilder<'_>> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), Error> {
        self.inner.field(key, value);
        Ok(())
    }

    fn end(self) -> std::result::Result<Value, Error> {
        let mut map = Map::with_capacity(1);
        map.insert(self.variant.to_string(), Value::Object(self.inner.map));
        Ok(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::{Error as _, Serializer};
    use serde::Serialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("broken"))
        }
    }

    #[derive(Serialize)]
    struct Row {
        id: u32,
        extra: Option<Broken>,
    }

    #[derive(Serialize)]
    enum Shape {
        Unit,
        Pair(u8, u8),
        Rect { w: u8, h: u8 },
        Wrapped(String),
    }

    #[test]
    fn matches_serde_json_for_healthy_values() {
        let mut map = BTreeMap::new();
        map.insert(3, vec![Some(1.5), None]);
        let value = (
            map,
            [Shape::Unit, Shape::Pair(1, 2), Shape::Rect { w: 3, h: 4 }, Shape::Wrapped("x".into())],
            'c',
            u128::from(7u8),
        );
        assert_eq!(
            lenient_tree(&value).unwrap(),
            serde_json::to_value(&value).unwrap()
        );
    }

    #[test]
    fn failing_field_is_left_out() {
        let rows = vec![
            Row { id: 1, extra: None },
            Row { id: 2, extra: Some(Broken) },
        ];
        assert_eq!(
            lenient_tree(&rows).unwrap(),
            json!([{"id": 1, "extra": null}, {"id": 2}])
        );
    }

    #[test]
    fn failing_root_element_keeps_its_slot() {
        let items: Vec<Option<Broken>> = vec![None, Some(Broken), None];
        assert_eq!(lenient_tree(&items).unwrap(), json!([null, {}, null]));
    }

    #[test]
    fn failing_nested_element_and_map_value_are_left_out() {
        let mut map = BTreeMap::new();
        map.insert("a", vec![Some(Broken), None]);
        map.insert("b", vec![None]);
        let nested = json!({"a": [null], "b": [null]});
        assert_eq!(lenient_tree(&map).unwrap(), nested);

        let mut values = BTreeMap::new();
        values.insert("bad", Some(Broken));
        values.insert("good", None);
        assert_eq!(lenient_tree(&values).unwrap(), json!({"good": null}));
    }

    #[test]
    fn failing_root_is_an_error() {
        assert!(lenient_tree(&Broken).is_err());
    }
}
