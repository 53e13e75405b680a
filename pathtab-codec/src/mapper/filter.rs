//! Field filters applied by a mapper while building its tree
//!
//! Denials (skip fields, black-list patterns, inclusion predicates) drop a field
//! wherever it appears. Allowances select fields: only-fields and named graphs
//! by dotted path, white-list patterns by field name. A selected field keeps its
//! whole subtree, and an unselected container is kept only while some
//! descendant is selected. Both pattern lists match field names, never paths.

use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::type_hint::TypeHint;

/// Type key applying a predicate to every declared type
pub const ANY_TYPE: &str = "*";

/// Inclusion predicate over (field name, field value)
pub type FieldPredicate = Arc<dyn Fn(&str, &Value) -> bool + Send + Sync>;

/// Inclusion predicates keyed by declared type name (or [`ANY_TYPE`])
#[derive(Clone, Default)]
pub struct InclusionPredicates(BTreeMap<String, Vec<FieldPredicate>>);

impl InclusionPredicates {
    /// Empty predicate map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate for `type_name`
    pub fn insert(&mut self, type_name: impl Into<String>, predicate: FieldPredicate) {
        self.0.entry(type_name.into()).or_default().push(predicate);
    }

    /// Whether no predicates are registered
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Declared type names with predicates
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn allows(&self, type_name: Option<&str>, field: &str, value: &Value) -> bool {
        let any = self.0.get(ANY_TYPE).into_iter().flatten();
        let typed = type_name
            .and_then(|t| self.0.get(t))
            .into_iter()
            .flatten();
        any.chain(typed).all(|predicate| predicate(field, value))
    }

    fn merge(&mut self, other: InclusionPredicates) {
        for (type_name, predicates) in other.0 {
            self.0.entry(type_name).or_default().extend(predicates);
        }
    }
}

impl fmt::Debug for InclusionPredicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

/// Composable field filter
#[derive(Debug, Clone, Default)]
pub struct FieldFilter {
    predicates: InclusionPredicates,
    whitelist: Vec<Regex>,
    blacklist: Vec<Regex>,
    only_fields: BTreeSet<String>,
    skip_fields: BTreeSet<String>,
    skip_fields_by_type: BTreeMap<String, BTreeSet<String>>,
    graph_paths: BTreeSet<String>,
}

impl FieldFilter {
    /// Filter from inclusion predicates
    pub fn predicates(predicates: InclusionPredicates) -> Self {
        Self {
            predicates,
            ..Self::default()
        }
    }

    /// Filter from white-list and black-list field-name patterns
    pub fn patterns(whitelist: Vec<Regex>, blacklist: Vec<Regex>) -> Self {
        Self {
            whitelist,
            blacklist,
            ..Self::default()
        }
    }

    /// Filter keeping only the given dotted paths
    pub fn only(fields: BTreeSet<String>) -> Self {
        Self {
            only_fields: fields,
            ..Self::default()
        }
    }

    /// Filter dropping fields by name or dotted path, globally and per declared type
    pub fn skip(fields: BTreeSet<String>, by_type: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self {
            skip_fields: fields,
            skip_fields_by_type: by_type,
            ..Self::default()
        }
    }

    /// Filter keeping the paths of a named graph
    pub fn graph(paths: &BTreeSet<String>) -> Self {
        Self {
            graph_paths: paths.clone(),
            ..Self::default()
        }
    }

    /// Fold `other` into this filter; nothing already present is replaced
    pub fn merge(&mut self, other: FieldFilter) {
        self.predicates.merge(other.predicates);
        self.whitelist.extend(other.whitelist);
        self.blacklist.extend(other.blacklist);
        self.only_fields.extend(other.only_fields);
        self.skip_fields.extend(other.skip_fields);
        for (type_name, fields) in other.skip_fields_by_type {
            self.skip_fields_by_type
                .entry(type_name)
                .or_default()
                .extend(fields);
        }
        self.graph_paths.extend(other.graph_paths);
    }

    fn has_allowlist(&self) -> bool {
        !self.only_fields.is_empty() || !self.whitelist.is_empty() || !self.graph_paths.is_empty()
    }

    fn allows(&self, field: &str, path: &str) -> bool {
        self.only_fields.contains(path)
            || self.graph_paths.contains(path)
            || self.whitelist.iter().any(|p| p.is_match(field))
    }

    fn denies(&self, type_name: Option<&str>, field: &str, path: &str, value: &Value) -> bool {
        if self.skip_fields.contains(field) || self.skip_fields.contains(path) {
            return true;
        }
        if let Some(fields) = type_name.and_then(|t| self.skip_fields_by_type.get(t)) {
            if fields.contains(field) {
                return true;
            }
        }
        if self.blacklist.iter().any(|p| p.is_match(field)) {
            return true;
        }
        !self.predicates.allows(type_name, field, value)
    }

    /// Filter `tree` in place; `root_type` names the declared type of the root object
    pub fn apply(&self, tree: &mut Value, root_type: Option<&str>, hint: Option<&TypeHint>) {
        let allowed = !self.has_allowlist();
        match tree {
            Value::Array(items) => {
                let element = hint.and_then(TypeHint::element);
                let element_type = element.and_then(TypeHint::type_name);
                for item in items.iter_mut() {
                    self.filter_node(item, "", element_type, element, allowed);
                }
            }
            other => self.filter_node(other, "", root_type, hint, allowed),
        }
    }

    fn filter_node(
        &self,
        node: &mut Value,
        path: &str,
        type_name: Option<&str>,
        hint: Option<&TypeHint>,
        allowed: bool,
    ) {
        match node {
            Value::Object(map) => {
                let entries = std::mem::take(map);
                for (name, mut child) in entries {
                    let child_path = if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{}.{}", path, name)
                    };
                    if self.denies(type_name, &name, &child_path, &child) {
                        continue;
                    }
                    let child_hint = hint.and_then(|h| h.field(&name));
                    let child_allowed = allowed || self.allows(&name, &child_path);
                    self.filter_node(
                        &mut child,
                        &child_path,
                        child_hint.and_then(TypeHint::type_name),
                        child_hint,
                        child_allowed,
                    );
                    if child_allowed || is_populated_container(&child) {
                        map.insert(name, child);
                    }
                }
            }
            Value::Array(items) => {
                let element = hint.and_then(TypeHint::element);
                let element_type = element.and_then(TypeHint::type_name);
                for item in items.iter_mut() {
                    self.filter_node(item, path, element_type, element, allowed);
                }
                if !allowed {
                    items.retain(is_populated_container);
                }
            }
            _ => {}
        }
    }
}

fn is_populated_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn skip_fields_drop_by_name_anywhere() {
        let filter = FieldFilter::skip(set(&["secret"]), BTreeMap::new());
        let mut tree = json!({"id": 1, "secret": "x", "user": {"secret": "y", "name": "a"}});
        filter.apply(&mut tree, None, None);
        assert_eq!(tree, json!({"id": 1, "user": {"name": "a"}}));
    }

    #[test]
    fn skip_by_type_uses_declared_types() {
        let mut by_type = BTreeMap::new();
        by_type.insert("User".to_string(), set(&["email"]));
        let filter = FieldFilter::skip(BTreeSet::new(), by_type);
        let hint = TypeHint::structure("Order").with_field("user", TypeHint::structure("User"));
        let mut tree = json!({"email": "order@x", "user": {"email": "u@x", "name": "a"}});
        filter.apply(&mut tree, Some("Order"), Some(&hint));
        assert_eq!(tree, json!({"email": "order@x", "user": {"name": "a"}}));
    }

    #[test]
    fn only_fields_keep_ancestors_and_subtrees() {
        let filter = FieldFilter::only(set(&["user.name", "items"]));
        let mut tree = json!({
            "id": 1,
            "user": {"name": "a", "email": "e"},
            "items": [{"sku": "x"}],
            "notes": [{"text": "t"}]
        });
        filter.apply(&mut tree, None, None);
        assert_eq!(tree, json!({"user": {"name": "a"}, "items": [{"sku": "x"}]}));
    }

    #[test]
    fn only_fields_apply_per_element_of_root_array() {
        let filter = FieldFilter::only(set(&["id"]));
        let mut tree = json!([{"id": 1, "x": 2}, {"id": 2, "y": 3}]);
        filter.apply(&mut tree, None, None);
        assert_eq!(tree, json!([{"id": 1}, {"id": 2}]));
    }

    #[test]
    fn patterns_match_field_names() {
        let filter = FieldFilter::patterns(
            vec![Regex::new(r"^user$").unwrap()],
            vec![Regex::new(r"^password$").unwrap()],
        );
        let mut tree = json!({"id": 1, "password": "top", "user": {"name": "a", "password": "p"}});
        filter.apply(&mut tree, None, None);
        assert_eq!(tree, json!({"user": {"name": "a"}}));
    }

    #[test]
    fn blacklist_reaches_nested_fields() {
        let filter = FieldFilter::patterns(Vec::new(), vec![Regex::new(r"^password$").unwrap()]);
        let mut tree = json!({
            "user": {"name": "a", "password": "p"},
            "accounts": [{"id": 1, "password": "q"}]
        });
        filter.apply(&mut tree, None, None);
        assert_eq!(tree, json!({"user": {"name": "a"}, "accounts": [{"id": 1}]}));
    }

    #[test]
    fn whitelisted_names_match_at_any_depth() {
        let filter = FieldFilter::patterns(vec![Regex::new(r"^id$").unwrap()], Vec::new());
        let mut tree = json!({"id": 1, "user": {"id": 7, "name": "a"}, "note": "n"});
        filter.apply(&mut tree, None, None);
        assert_eq!(tree, json!({"id": 1, "user": {"id": 7}}));
    }

    #[test]
    fn predicates_apply_globally_and_per_type() {
        let mut predicates = InclusionPredicates::new();
        predicates.insert(ANY_TYPE, Arc::new(|_: &str, v: &Value| !v.is_null()) as FieldPredicate);
        predicates.insert(
            "Order",
            Arc::new(|name: &str, _: &Value| name != "internal") as FieldPredicate,
        );
        let filter = FieldFilter::predicates(predicates);
        let mut tree = json!({"a": null, "b": 1, "internal": 2});
        filter.apply(&mut tree, Some("Order"), None);
        assert_eq!(tree, json!({"b": 1}));

        let mut untyped = json!({"a": null, "internal": 2});
        filter.apply(&mut untyped, None, None);
        assert_eq!(untyped, json!({"internal": 2}));
    }

    #[test]
    fn merge_composes_instead_of_replacing() {
        let mut filter = FieldFilter::skip(set(&["a"]), BTreeMap::new());
        filter.merge(FieldFilter::skip(set(&["b"]), BTreeMap::new()));
        filter.merge(FieldFilter::only(set(&["c", "b"])));
        let mut tree = json!({"a": 1, "b": 2, "c": 3, "d": 4});
        filter.apply(&mut tree, None, None);
        assert_eq!(tree, json!({"c": 3}));
    }

    #[test]
    fn graph_selects_paths() {
        let filter = FieldFilter::graph(&set(&["summary", "lines.sku"]));
        let mut tree = json!({
            "summary": {"total": 3},
            "lines": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2}],
            "audit": {"by": "x"}
        });
        filter.apply(&mut tree, None, None);
        assert_eq!(
            tree,
            json!({"summary": {"total": 3}, "lines": [{"sku": "a"}, {"sku": "b"}]})
        );
    }
}
