//! Declared-type hints
//!
//! Serialized trees carry no declared types, so callers that care (set-like
//! sequences on reconstruct, per-type field filters on the mapper) describe the
//! shape they expect with a [`TypeHint`].

use std::collections::BTreeMap;

/// Declared shape of a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeHint {
    /// Any scalar
    Scalar,
    /// Named record with declared fields
    Struct {
        /// Type name used by per-type filters
        name: String,
        /// Declared fields
        fields: BTreeMap<String, TypeHint>,
    },
    /// Positional sequence
    List(Box<TypeHint>),
    /// Insertion-ordered sequence of unique values
    Set(Box<TypeHint>),
    /// String-keyed map with uniform values
    Map(Box<TypeHint>),
}

impl TypeHint {
    /// Start a struct hint
    pub fn structure(name: impl Into<String>) -> Self {
        TypeHint::Struct {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a declared field (no-op on non-struct hints)
    pub fn with_field(mut self, field: impl Into<String>, hint: TypeHint) -> Self {
        if let TypeHint::Struct { fields, .. } = &mut self {
            fields.insert(field.into(), hint);
        }
        self
    }

    /// List of `element`
    pub fn list(element: TypeHint) -> Self {
        TypeHint::List(Box::new(element))
    }

    /// Set of `element`
    pub fn set(element: TypeHint) -> Self {
        TypeHint::Set(Box::new(element))
    }

    /// Map of `value`
    pub fn map(value: TypeHint) -> Self {
        TypeHint::Map(Box::new(value))
    }

    /// Declared type of property `name`
    pub fn field(&self, name: &str) -> Option<&TypeHint> {
        match self {
            TypeHint::Struct { fields, .. } => fields.get(name),
            TypeHint::Map(value) => Some(value),
            _ => None,
        }
    }

    /// Declared element type of a sequence
    pub fn element(&self) -> Option<&TypeHint> {
        match self {
            TypeHint::List(element) | TypeHint::Set(element) => Some(element),
            _ => None,
        }
    }

    /// Whether the declared sequence keeps unique values only
    pub fn is_set_like(&self) -> bool {
        matches!(self, TypeHint::Set(_))
    }

    /// Declared record name
    pub fn type_name(&self) -> Option<&str> {
        match self {
            TypeHint::Struct { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Types that can describe their own declared shape
pub trait Described {
    /// Declared shape of `Self`
    fn type_hint() -> TypeHint;
}

/// Last path component of a Rust type name, without generics
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_fields_and_elements() {
        let hint = TypeHint::structure("Order")
            .with_field("tags", TypeHint::set(TypeHint::Scalar))
            .with_field("lines", TypeHint::list(TypeHint::structure("Line")));

        assert_eq!(hint.type_name(), Some("Order"));
        assert!(hint.field("tags").unwrap().is_set_like());
        assert!(!hint.field("lines").unwrap().is_set_like());
        assert_eq!(
            hint.field("lines").and_then(|h| h.element()).and_then(|h| h.type_name()),
            Some("Line")
        );
        assert!(hint.field("missing").is_none());
    }

    #[test]
    fn map_hint_applies_to_every_key() {
        let hint = TypeHint::map(TypeHint::set(TypeHint::Scalar));
        assert!(hint.field("anything").unwrap().is_set_like());
    }

    #[test]
    fn short_type_names() {
        assert_eq!(short_type_name("my_crate::model::Order"), "Order");
        assert_eq!(short_type_name("alloc::vec::Vec<my_crate::Order>"), "Vec");
        assert_eq!(short_type_name("Order"), "Order");
    }
}
