//! Reconstruct: path-keyed entries back to a nested tree
//!
//! Entries are applied in arrival order into a draft tree, then the draft is
//! finalized into a [`Value`]. Lists grow with [`Draft::Pending`] holes when a
//! terminal index lands past the end; holes left unfilled become `null`.
//!
//! `name[*]` and out-of-order `name[k]` writes to the same list resolve by
//! arrival order:
//!
//! - a terminal `[*]` fills the earliest pending hole, or appends;
//! - a terminal `[k]` overwrites whatever is at `k`, including an earlier `[*]`;
//! - a non-terminal `[*]` always starts a new element.
//!
//! So `a[0]=y, a[*]=x` gives `[y, x]`, `a[*]=x, a[0]=y` gives `[y]`, and
//! `a[*]=x` with `a[2]=y` gives `[x, null, y]` in either order.

use crate::type_hint::{Described, TypeHint};
use ahash::AHashSet;
use pathtab_format::path_key::{PathKey, PathStep, SegmentIndex, DEFAULT_SEPARATOR};
use pathtab_format::{Cell, FlattenedRow, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Largest list index accepted; entries past it are dropped
pub const MAX_INDEX: usize = 1_000_000;

/// Node of a tree under construction
#[derive(Debug, Clone, PartialEq)]
enum Draft {
    Leaf(Value),
    /// List slot reserved by a later index, not yet written
    Pending,
    Object(Vec<(String, Draft)>),
    List { items: Vec<Draft>, unique: bool },
}

impl Draft {
    fn is_vacant(&self) -> bool {
        match self {
            Draft::Pending => true,
            Draft::Object(entries) => entries.is_empty(),
            Draft::List { items, .. } => items.is_empty(),
            Draft::Leaf(_) => false,
        }
    }

    /// Empty container matching the step that will descend into it
    fn placeholder(next: Option<&PathStep>) -> Draft {
        match next {
            Some(PathStep::Index(_)) => Draft::List {
                items: Vec::new(),
                unique: false,
            },
            _ => Draft::Object(Vec::new()),
        }
    }

    fn object_entries(&mut self, key: &str) -> &mut Vec<(String, Draft)> {
        if !matches!(self, Draft::Object(_)) {
            if !self.is_vacant() {
                warn!(key, "path key descends through a value, replacing it with an object");
            }
            *self = Draft::Object(Vec::new());
        }
        match self {
            Draft::Object(entries) => entries,
            _ => unreachable!("draft was just made an object"),
        }
    }

    fn list_items(&mut self, unique: bool, key: &str) -> &mut Vec<Draft> {
        if !matches!(self, Draft::List { .. }) {
            if !self.is_vacant() {
                warn!(key, "path key indexes into a value, replacing it with a list");
            }
            *self = Draft::List {
                items: Vec::new(),
                unique,
            };
        }
        match self {
            Draft::List { items, unique: current } => {
                *current |= unique;
                items
            }
            _ => unreachable!("draft was just made a list"),
        }
    }

    fn finish(self) -> Value {
        match self {
            Draft::Leaf(value) => value,
            Draft::Pending => Value::Null,
            Draft::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(name, draft)| (name, draft.finish()))
                    .collect::<Map<String, Value>>(),
            ),
            Draft::List { items, unique } => {
                let values = items.into_iter().map(Draft::finish);
                if unique {
                    let mut seen = AHashSet::new();
                    Value::Array(values.filter(|v| seen.insert(v.to_string())).collect())
                } else {
                    Value::Array(values.collect())
                }
            }
        }
    }
}

/// Incremental reconstruction of one tree
#[derive(Debug, Clone)]
pub struct Reconstructor<'h> {
    separator: String,
    hint: Option<&'h TypeHint>,
    root: Draft,
}

impl<'h> Reconstructor<'h> {
    /// Reconstructor splitting keys on `separator`
    pub fn new(separator: impl Into<String>, hint: Option<&'h TypeHint>) -> Self {
        Self {
            separator: separator.into(),
            hint,
            root: Draft::Object(Vec::new()),
        }
    }

    /// Apply one entry
    ///
    /// A key that does not parse is kept as one literal top-level key.
    pub fn insert(&mut self, key: &str, value: Value) {
        let steps = match PathKey::parse(key, &self.separator) {
            Ok(parsed) => parsed.steps(),
            Err(e) => {
                debug!(key, error = %e, "keeping unparseable path key as a literal");
                vec![PathStep::Key(key.to_string())]
            }
        };
        place(&mut self.root, &steps, self.hint, value, key);
    }

    /// Finalize; remaining holes become `null`
    pub fn finish(self) -> Value {
        self.root.finish()
    }
}

fn place(slot: &mut Draft, steps: &[PathStep], hint: Option<&TypeHint>, value: Value, key: &str) {
    let Some((step, rest)) = steps.split_first() else {
        match &*slot {
            Draft::Pending | Draft::Leaf(_) => {}
            other if other.is_vacant() => {}
            _ => warn!(key, "path key overwrites a nested value"),
        }
        *slot = Draft::Leaf(value);
        return;
    };

    match step {
        PathStep::Key(name) => {
            let entries = slot.object_entries(key);
            let position = match entries.iter().position(|(existing, _)| existing == name) {
                Some(position) => position,
                None => {
                    entries.push((name.clone(), Draft::Pending));
                    entries.len() - 1
                }
            };
            let child_hint = hint.and_then(|h| h.field(name));
            place(&mut entries[position].1, rest, child_hint, value, key);
        }
        PathStep::Index(index) => {
            let unique = hint.map_or(false, TypeHint::is_set_like);
            let items = slot.list_items(unique, key);
            let next = rest.first();
            let position = match (index, next) {
                (SegmentIndex::Position(position), _) => *position,
                (SegmentIndex::Append, Some(_)) => items.len(),
                (SegmentIndex::Append, None) => items
                    .iter()
                    .position(|item| matches!(item, Draft::Pending))
                    .unwrap_or(items.len()),
            };
            if position > MAX_INDEX {
                warn!(key, position, "list index too large, dropping entry");
                return;
            }
            if position >= items.len() {
                match next {
                    None => items.resize(position + 1, Draft::Pending),
                    Some(_) => items.resize_with(position + 1, || Draft::placeholder(next)),
                }
            }
            let element_hint = hint.and_then(TypeHint::element);
            place(&mut items[position], rest, element_hint, value, key);
        }
    }
}

/// Rebuild a tree from path-keyed entries using the default `.` separator
pub fn reconstruct<I, K>(entries: I, hint: Option<&TypeHint>) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    reconstruct_with_separator(entries, DEFAULT_SEPARATOR, hint)
}

/// Rebuild a tree from path-keyed entries split on `separator`
pub fn reconstruct_with_separator<I, K>(entries: I, separator: &str, hint: Option<&TypeHint>) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let mut reconstructor = Reconstructor::new(separator, hint);
    for (key, value) in entries {
        reconstructor.insert(key.as_ref(), value);
    }
    reconstructor.finish()
}

/// Rebuild a tree from a flattened row; cells become strings or `null`
pub fn reconstruct_row(row: &FlattenedRow, separator: &str, hint: Option<&TypeHint>) -> Value {
    let entries = row.iter().map(|(key, cell)| {
        let value = match cell {
            Cell::Null => Value::Null,
            Cell::Text(text) | Cell::Formula(text) => Value::String(text.clone()),
        };
        (key, value)
    });
    reconstruct_with_separator(entries, separator, hint)
}

/// Rebuild a typed value, using its declared shape for set-like fields
pub fn reconstruct_into<T, I, K>(entries: I) -> Result<T>
where
    T: DeserializeOwned + Described,
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let hint = T::type_hint();
    let tree = reconstruct(entries, Some(&hint));
    Ok(serde_json::from_value(tree)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn rebuild(entries: &[(&str, Value)]) -> Value {
        reconstruct(entries.iter().cloned(), None)
    }

    #[test]
    fn nested_objects_and_lists() {
        let tree = rebuild(&[
            ("user.name", json!("a")),
            ("user.roles[0].id", json!(7)),
            ("user.roles[1].id", json!(8)),
            ("count", json!(2)),
        ]);
        assert_eq!(
            tree,
            json!({"user": {"name": "a", "roles": [{"id": 7}, {"id": 8}]}, "count": 2})
        );
    }

    #[test]
    fn sparse_indices_leave_nulls() {
        let tree = rebuild(&[("a[0]", json!("x")), ("a[2]", json!("y"))]);
        assert_eq!(tree, json!({"a": ["x", null, "y"]}));
    }

    #[test]
    fn non_terminal_padding_uses_empty_objects() {
        let tree = rebuild(&[("a[2].b", json!(1))]);
        assert_eq!(tree, json!({"a": [{}, {}, {"b": 1}]}));
    }

    #[test]
    fn wildcard_fills_earliest_hole() {
        let tree = rebuild(&[("a[2]", json!("y")), ("a[*]", json!("x"))]);
        assert_eq!(tree, json!({"a": ["x", null, "y"]}));

        let tree = rebuild(&[("a[*]", json!("x")), ("a[2]", json!("y"))]);
        assert_eq!(tree, json!({"a": ["x", null, "y"]}));
    }

    #[test]
    fn wildcard_arrival_order() {
        let tree = rebuild(&[("a[0]", json!("y")), ("a[*]", json!("x"))]);
        assert_eq!(tree, json!({"a": ["y", "x"]}));

        let tree = rebuild(&[("a[*]", json!("x")), ("a[0]", json!("y"))]);
        assert_eq!(tree, json!({"a": ["y"]}));
    }

    #[test]
    fn non_terminal_wildcard_starts_new_elements() {
        let tree = rebuild(&[
            ("items[*].id", json!(1)),
            ("items[*].id", json!(2)),
        ]);
        assert_eq!(tree, json!({"items": [{"id": 1}, {"id": 2}]}));
    }

    #[test]
    fn nested_indices() {
        let tree = rebuild(&[("grid[1][0]", json!(3)), ("grid[0][0]", json!(1))]);
        assert_eq!(tree, json!({"grid": [[1], [3]]}));
    }

    #[test]
    fn quoted_keys_are_literal() {
        let tree = rebuild(&[("\"a.b[0]\"", json!(1)), ("\"x.y\".z", json!(2))]);
        assert_eq!(tree, json!({"a.b[0]": 1, "x.y": {"z": 2}}));
    }

    #[test]
    fn unparseable_keys_are_literal() {
        let tree = rebuild(&[("a[", json!(1)), ("b..c", json!(2))]);
        assert_eq!(tree, json!({"a[": 1, "b..c": 2}));
    }

    #[test]
    fn bare_root_index_builds_a_list() {
        let tree = rebuild(&[("[1].id", json!(2)), ("[0].id", json!(1))]);
        assert_eq!(tree, json!([{"id": 1}, {"id": 2}]));
    }

    #[test]
    fn huge_indices_are_dropped() {
        let tree = rebuild(&[("a[5000000]", json!(1)), ("b", json!(2))]);
        assert_eq!(tree, json!({"a": [], "b": 2}));
    }

    #[test]
    fn later_conflicting_writes_win() {
        let tree = rebuild(&[("a", json!(1)), ("a.b", json!(2))]);
        assert_eq!(tree, json!({"a": {"b": 2}}));

        let tree = rebuild(&[("a.b", json!(2)), ("a", json!(1))]);
        assert_eq!(tree, json!({"a": 1}));
    }

    #[test]
    fn set_hints_deduplicate_in_insertion_order() {
        let hint = TypeHint::structure("Post")
            .with_field("tags", TypeHint::set(TypeHint::Scalar))
            .with_field("scores", TypeHint::list(TypeHint::Scalar));
        let entries = vec![
            ("tags[0]", json!("b")),
            ("tags[1]", json!("a")),
            ("tags[2]", json!("b")),
            ("scores[0]", json!(1)),
            ("scores[1]", json!(1)),
        ];
        let tree = reconstruct(entries, Some(&hint));
        assert_eq!(tree, json!({"tags": ["b", "a"], "scores": [1, 1]}));
    }

    #[test]
    fn custom_separator() {
        let tree = reconstruct_with_separator(
            vec![("a/b", json!(1)), ("a/c[0]", json!(2))],
            "/",
            None,
        );
        assert_eq!(tree, json!({"a": {"b": 1, "c": [2]}}));
    }

    #[test]
    fn rows_become_string_leaves() {
        let mut row = FlattenedRow::new();
        row.insert("id".to_string(), Cell::Text("1".to_string()));
        row.insert("zip".to_string(), Cell::Formula("=\"01\"".to_string()));
        row.insert("note".to_string(), Cell::Null);
        let tree = reconstruct_row(&row, DEFAULT_SEPARATOR, None);
        assert_eq!(tree, json!({"id": "1", "note": null, "zip": "=\"01\""}));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Post {
        title: String,
        tags: BTreeSet<String>,
    }

    impl Described for Post {
        fn type_hint() -> TypeHint {
            TypeHint::structure("Post")
                .with_field("title", TypeHint::Scalar)
                .with_field("tags", TypeHint::set(TypeHint::Scalar))
        }
    }

    #[test]
    fn typed_reconstruction() {
        let post: Post = reconstruct_into(vec![
            ("title", json!("hello")),
            ("tags[0]", json!("x")),
            ("tags[1]", json!("x")),
            ("tags[*]", json!("y")),
        ])
        .unwrap();
        assert_eq!(post.title, "hello");
        assert_eq!(post.tags.into_iter().collect::<Vec<_>>(), ["x", "y"]);
    }
}
