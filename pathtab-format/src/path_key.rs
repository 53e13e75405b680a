//! Path-key grammar
//!
//! A path key addresses one terminal value inside a nested tree:
//!
//! ```text
//! key      := segment (SEP segment)*
//! segment  := (name | '"' literal '"') index*
//! index    := '[' (digits | '*') ']'
//! ```
//!
//! `SEP` defaults to `.`. A quoted segment is taken literally, so separators and
//! brackets inside it are never split; `""` inside it stands for one `"`.
//! `[*]` means "append to the list".

use crate::error::{PathTabError, Result};
use smallvec::SmallVec;
use std::fmt;

/// Default chaining separator
pub const DEFAULT_SEPARATOR: &str = ".";

/// Index inside a `[...]` suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentIndex {
    /// `[n]`
    Position(usize),
    /// `[*]`, the next free slot
    Append,
}

/// One separator-delimited segment of a path key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Property name (may be empty for a bare `[0]` root element)
    pub name: String,
    /// Index suffixes in order of appearance
    pub indices: SmallVec<[SegmentIndex; 2]>,
    /// Whether the name was written in double quotes
    pub quoted: bool,
}

impl PathSegment {
    /// Plain segment without indices
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indices: SmallVec::new(),
            quoted: false,
        }
    }
}

/// A step through the tree addressed by a path key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Descend into a mapping entry
    Key(String),
    /// Descend into a sequence slot
    Index(SegmentIndex),
}

/// Parsed path key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKey {
    segments: SmallVec<[PathSegment; 4]>,
}

impl PathKey {
    /// Parse `key` using `separator` between segments
    pub fn parse(key: &str, separator: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(invalid(key, "empty key"));
        }

        let mut segments = SmallVec::new();
        let mut rest = key;
        loop {
            let (segment, remainder) = parse_segment(key, rest, separator)?;
            segments.push(segment);
            match remainder {
                Some(next) => rest = next,
                None => break,
            }
        }

        Ok(Self { segments })
    }

    /// Segments in order
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Expand segments into individual key/index steps
    pub fn steps(&self) -> Vec<PathStep> {
        let mut steps = Vec::with_capacity(self.segments.len() * 2);
        for (position, segment) in self.segments.iter().enumerate() {
            // `[0].name` addresses the root element itself, no key step for it
            if !(position == 0 && segment.name.is_empty() && !segment.quoted && !segment.indices.is_empty()) {
                steps.push(PathStep::Key(segment.name.clone()));
            }
            steps.extend(segment.indices.iter().copied().map(PathStep::Index));
        }
        steps
    }

    /// Name of the last segment
    pub fn leaf_name(&self) -> &str {
        self.segments.last().map(|s| s.name.as_str()).unwrap_or("")
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(DEFAULT_SEPARATOR)?;
            }
            if segment.quoted {
                write!(f, "\"{}\"", segment.name.replace('"', "\"\""))?;
            } else {
                f.write_str(&segment.name)?;
            }
            for index in &segment.indices {
                match index {
                    SegmentIndex::Position(n) => write!(f, "[{}]", n)?,
                    SegmentIndex::Append => f.write_str("[*]")?,
                }
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> PathTabError {
    PathTabError::InvalidPathKey {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse one segment from the front of `rest`, returning the remainder after the separator
fn parse_segment<'a>(
    key: &str,
    rest: &'a str,
    separator: &str,
) -> Result<(PathSegment, Option<&'a str>)> {
    let (name, quoted, mut tail) = if let Some(stripped) = rest.strip_prefix('"') {
        let (name, after) =
            unquote(stripped).ok_or_else(|| invalid(key, "unterminated quoted segment"))?;
        (name, true, after)
    } else {
        let end = rest
            .char_indices()
            .find(|(i, c)| *c == '[' || (!separator.is_empty() && rest[*i..].starts_with(separator)))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        (rest[..end].to_string(), false, &rest[end..])
    };

    let mut indices = SmallVec::new();
    while let Some(stripped) = tail.strip_prefix('[') {
        let close = stripped
            .find(']')
            .ok_or_else(|| invalid(key, "unterminated index"))?;
        let body = &stripped[..close];
        let index = if body == "*" {
            SegmentIndex::Append
        } else if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
            SegmentIndex::Position(
                body.parse()
                    .map_err(|_| invalid(key, format!("index '{}' out of range", body)))?,
            )
        } else {
            return Err(invalid(key, format!("index '{}' is not a number or '*'", body)));
        };
        indices.push(index);
        tail = &stripped[close + 1..];
    }

    if name.is_empty() && !quoted && indices.is_empty() {
        return Err(invalid(key, "empty segment"));
    }

    let segment = PathSegment {
        name,
        indices,
        quoted,
    };

    if tail.is_empty() {
        return Ok((segment, None));
    }
    match tail.strip_prefix(separator) {
        Some(next) if !separator.is_empty() => {
            if next.is_empty() {
                return Err(invalid(key, "trailing separator"));
            }
            Ok((segment, Some(next)))
        }
        _ => Err(invalid(key, format!("unexpected text '{}' after segment", tail))),
    }
}

/// Quoted body up to its closing quote, with `""` read as one `"`
fn unquote(body: &str) -> Option<(String, &str)> {
    let mut name = String::new();
    let mut rest = body;
    loop {
        let close = rest.find('"')?;
        name.push_str(&rest[..close]);
        let after = &rest[close + 1..];
        match after.strip_prefix('"') {
            Some(more) => {
                name.push('"');
                rest = more;
            }
            None => return Some((name, after)),
        }
    }
}

/// Append property `name` to `parent`
///
/// With a blank separator the name is capitalized and concatenated
/// (`address` + `city` -> `addressCity`). Empty names and names containing the
/// separator, brackets or quotes are quoted so they parse back as one segment.
pub fn join_property(parent: &str, name: &str, separator: &str) -> String {
    let chained = !separator.trim().is_empty();
    let needs_quotes = chained
        && (name.is_empty()
            || name.contains(separator)
            || name.contains(['[', ']', '"']));
    let rendered = if needs_quotes {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    };

    if parent.is_empty() {
        return rendered;
    }
    if chained {
        let mut out = String::with_capacity(parent.len() + separator.len() + rendered.len());
        out.push_str(parent);
        out.push_str(separator);
        out.push_str(&rendered);
        out
    } else {
        let mut out = String::with_capacity(parent.len() + name.len());
        out.push_str(parent);
        out.push_str(&capitalize(name));
        out
    }
}

/// Append sequence index `index` to `parent`, as `p[i]` or `p` + `i`
pub fn join_index(parent: &str, index: usize, chaining_list_sep: bool) -> String {
    if chaining_list_sep {
        format!("{}[{}]", parent, index)
    } else {
        format!("{}{}", parent, index)
    }
}

/// Uppercase the first character
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(key: &str) -> PathKey {
        PathKey::parse(key, DEFAULT_SEPARATOR).unwrap()
    }

    #[test]
    fn parses_plain_and_indexed_segments() {
        let key = parse("a.b[2].c[*]");
        let segments = key.segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], PathSegment::field("a"));
        assert_eq!(segments[1].name, "b");
        assert_eq!(segments[1].indices.as_slice(), &[SegmentIndex::Position(2)]);
        assert_eq!(segments[2].indices.as_slice(), &[SegmentIndex::Append]);
        assert_eq!(key.leaf_name(), "c");
    }

    #[test]
    fn quoted_segment_is_not_split() {
        let key = parse("meta.\"x.y[0]\".z");
        let names: Vec<_> = key.segments().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["meta", "x.y[0]", "z"]);
        assert!(key.segments()[1].quoted);
    }

    #[test]
    fn fully_quoted_key_is_single_literal() {
        let key = parse("\"a.b[3]\"");
        assert_eq!(key.segments().len(), 1);
        assert_eq!(key.segments()[0].name, "a.b[3]");
        assert_eq!(key.steps(), vec![PathStep::Key("a.b[3]".to_string())]);
    }

    #[test]
    fn nested_indices_expand_to_steps() {
        let key = parse("grid[1][0].v");
        assert_eq!(
            key.steps(),
            vec![
                PathStep::Key("grid".to_string()),
                PathStep::Index(SegmentIndex::Position(1)),
                PathStep::Index(SegmentIndex::Position(0)),
                PathStep::Key("v".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in ["", "a..b", "a[", "a[x]", "a[0]b", "a.", "\"open"] {
            assert!(
                PathKey::parse(bad, DEFAULT_SEPARATOR).is_err(),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn custom_separator() {
        let key = PathKey::parse("a/b[1]/c", "/").unwrap();
        let names: Vec<_> = key.segments().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let text = "a.\"b.c\"[0][*].d";
        assert_eq!(parse(text).to_string(), text);
    }

    #[test]
    fn join_property_variants() {
        assert_eq!(join_property("", "id", "."), "id");
        assert_eq!(join_property("user", "name", "."), "user.name");
        assert_eq!(join_property("user", "firstName", ""), "userFirstName");
        assert_eq!(join_property("meta", "a.b", "."), "meta.\"a.b\"");
    }

    #[test]
    fn awkward_names_stay_one_segment() {
        let key = join_property("a", "x\".y", ".");
        assert_eq!(key, "a.\"x\"\".y\"");
        assert_eq!(
            parse(&key).steps(),
            vec![PathStep::Key("a".to_string()), PathStep::Key("x\".y".to_string())]
        );
        assert_eq!(parse(&key).to_string(), key);

        let empty = join_property("a", "", ".");
        assert_eq!(empty, "a.\"\"");
        assert_eq!(
            parse(&empty).steps(),
            vec![PathStep::Key("a".to_string()), PathStep::Key(String::new())]
        );
        assert_eq!(join_property("", "", "."), "\"\"");
        assert_eq!(join_property("a", "say\"hi", "."), "a.\"say\"\"hi\"");
    }

    #[test]
    fn doubled_quotes_inside_quoted_segments() {
        let key = parse("\"a\"\"b\"[1].c");
        assert_eq!(key.segments()[0].name, "a\"b");
        assert_eq!(key.segments()[0].indices.as_slice(), &[SegmentIndex::Position(1)]);
        assert!(PathKey::parse("\"a\"\"", DEFAULT_SEPARATOR).is_err());
    }

    #[test]
    fn join_index_variants() {
        assert_eq!(join_index("tags", 3, true), "tags[3]");
        assert_eq!(join_index("tags", 3, false), "tags3");
    }
}
