//! Data selection by RFC 6901 JSON Pointer

use pathtab_format::{PathTabError, Result};
use serde_json::Value;

/// Parse `pointer` into unescaped tokens; the empty pointer selects the root
///
/// # Errors
///
/// Fails on a pointer not starting with `/`, on escapes other than `~0`/`~1`,
/// or on more than `max_depth` tokens.
pub fn parse_pointer(pointer: &str, max_depth: usize) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    if !pointer.starts_with('/') {
        return Err(invalid(pointer, "pointer must start with '/' (or be empty for root)"));
    }

    let raw: Vec<&str> = pointer.split('/').skip(1).collect();
    if raw.len() > max_depth {
        return Err(invalid(
            pointer,
            format!("pointer depth {} exceeds limit {}", raw.len(), max_depth),
        ));
    }
    for token in &raw {
        validate_escape_sequences(token).map_err(|reason| invalid(pointer, reason))?;
    }

    Ok(raw.into_iter().map(unescape_pointer_token).collect())
}

/// Unescape one token: `~1` to `/`, then `~0` to `~`
pub fn unescape_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Move the value at `tokens` out of `tree`, or `None` when the path is absent
pub fn select(mut tree: Value, tokens: &[String]) -> Option<Value> {
    let mut current = &mut tree;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token)?,
            Value::Array(items) => {
                let index: usize = token.parse().ok()?;
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current.take())
}

fn validate_escape_sequences(token: &str) -> std::result::Result<(), String> {
    let mut chars = token.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '~' {
            match chars.peek() {
                Some('0') | Some('1') => {
                    chars.next();
                }
                Some(other) => {
                    return Err(format!(
                        "invalid escape sequence '~{}', use '~0' for '~' and '~1' for '/'",
                        other
                    ))
                }
                None => return Err("incomplete escape sequence at end of token".to_string()),
            }
        }
    }
    Ok(())
}

fn invalid(pointer: &str, reason: impl Into<String>) -> PathTabError {
    PathTabError::InvalidExpression {
        expression: pointer.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_and_unescapes() {
        assert!(parse_pointer("", 4).unwrap().is_empty());
        assert_eq!(parse_pointer("/a~1b/c~0d", 4).unwrap(), ["a/b", "c~d"]);
        assert!(parse_pointer("a", 4).is_err());
        assert!(parse_pointer("/a~2", 4).is_err());
        assert!(parse_pointer("/a/b/c", 2).is_err());
    }

    #[test]
    fn selects_nested_values() {
        let tree = json!({"data": {"items": [{"id": 1}, {"id": 2}]}});
        let tokens = parse_pointer("/data/items", 8).unwrap();
        assert_eq!(
            select(tree.clone(), &tokens),
            Some(json!([{"id": 1}, {"id": 2}]))
        );

        let tokens = parse_pointer("/data/items/1/id", 8).unwrap();
        assert_eq!(select(tree.clone(), &tokens), Some(json!(2)));

        let tokens = parse_pointer("/data/missing", 8).unwrap();
        assert_eq!(select(tree, &tokens), None);
    }
}
