//! Row predicates
//!
//! Rows are excluded by evaluating an expression against each root element
//! before it is flattened. Evaluation errors and non-boolean results never
//! exclude a row.

use pathtab_format::{PathKey, PathStep, PathTabError, Result, SegmentIndex, DEFAULT_SEPARATOR};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static COMPARISON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<not>!)?\s*(?P<path>[^\s=!]+)\s*(?:(?P<op>==|!=)\s*(?P<literal>.+?))?\s*$")
        .unwrap()
});

/// Evaluates an expression against a value
pub trait ExpressionEvaluator: Send + Sync {
    /// Result of `expression` over `target`
    fn evaluate(&self, expression: &str, target: &Value) -> Result<Value>;
}

/// Minimal evaluator over path keys
///
/// Supported forms, where `path` is a path key into the element:
///
/// - `path` (the value at the path)
/// - `!path` (negation of a boolean at the path)
/// - `path == literal` and `path != literal`
///
/// A literal is JSON (`3`, `true`, `null`, `"text"`) or else a bare word
/// compared as a string. Missing paths evaluate to `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleExpression;

impl ExpressionEvaluator for SimpleExpression {
    fn evaluate(&self, expression: &str, target: &Value) -> Result<Value> {
        let captures = COMPARISON_RE
            .captures(expression)
            .ok_or_else(|| invalid(expression, "expected `path`, `!path`, or `path ==|!= literal`"))?;

        let path = &captures["path"];
        let value = lookup(target, path).map_err(|e| invalid(expression, e.to_string()))?;

        let result = match (captures.name("op"), captures.name("literal")) {
            (Some(op), Some(literal)) => {
                let literal = parse_literal(literal.as_str());
                let equal = loosely_equal(&value, &literal);
                Value::Bool(if op.as_str() == "==" { equal } else { !equal })
            }
            _ => value,
        };

        if captures.name("not").is_some() {
            match result {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(invalid(
                    expression,
                    format!("cannot negate non-boolean value {}", other),
                )),
            }
        } else {
            Ok(result)
        }
    }
}

/// Whether `expression` says to skip `target`
///
/// Only a boolean `true` skips; failures are logged and keep the row.
pub fn should_skip(evaluator: &dyn ExpressionEvaluator, expression: &str, target: &Value) -> bool {
    match evaluator.evaluate(expression, target) {
        Ok(Value::Bool(skip)) => skip,
        Ok(other) => {
            tracing::debug!(expression, result = %other, "skip expression is not boolean, keeping row");
            false
        }
        Err(e) => {
            tracing::warn!(expression, error = %e, "skip expression failed, keeping row");
            false
        }
    }
}

fn lookup(target: &Value, path: &str) -> Result<Value> {
    let key = PathKey::parse(path, DEFAULT_SEPARATOR)?;
    let mut current = target;
    for step in key.steps() {
        let next = match (step, current) {
            (PathStep::Key(name), Value::Object(map)) => map.get(&name),
            (PathStep::Index(SegmentIndex::Position(i)), Value::Array(items)) => items.get(i),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Ok(Value::Null),
        }
    }
    Ok(current.clone())
}

fn parse_literal(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Equality that also matches a string against the text of a number or boolean
fn loosely_equal(value: &Value, literal: &Value) -> bool {
    if value == literal {
        return true;
    }
    match (value, literal) {
        (Value::String(s), Value::Number(_) | Value::Bool(_)) => *s == literal.to_string(),
        (Value::Number(_) | Value::Bool(_), Value::String(s)) => *s == value.to_string(),
        _ => false,
    }
}

fn invalid(expression: &str, reason: impl Into<String>) -> PathTabError {
    PathTabError::InvalidExpression {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}
