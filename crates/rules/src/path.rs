//! Dotted-path resolution against JSON documents.
//!
//! Supports the subset rule authors actually use: `$.a.b`, bare `a.b`,
//! and array indexing `a[0].b`. No wildcards, no filters. A path that
//! does not resolve is simply no match, never an error.

use serde_json::Value;

/// Resolve `path` against `document`, returning the addressed value.
pub fn resolve<'v>(path: &str, document: &'v Value) -> Option<&'v Value> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed == "$" {
        return Some(document);
    }
    let body = trimmed
        .strip_prefix("$.")
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);

    let mut current = document;
    for segment in body.split('.') {
        current = apply_segment(current, segment)?;
    }
    Some(current)
}

pub fn exists(path: &str, document: &Value) -> bool {
    resolve(path, document).is_some()
}

fn apply_segment<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    let (key, indexes) = parse_segment(segment)?;
    let mut current = value;
    if !key.is_empty() {
        current = current.get(key)?;
    }
    for index in indexes {
        current = current.get(index)?;
    }
    Some(current)
}

/// Split one dotted segment into its key and trailing `[n]` indexes.
/// A segment may be a bare index (`[0]`), a key (`a`), or both
/// (`a[0][1]`).
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    if segment.is_empty() {
        return None;
    }
    let Some(bracket) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let key = &segment[..bracket];
    let mut indexes = Vec::new();
    let mut rest = &segment[bracket..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped.find(']')?;
        let index: usize = stripped[..end].parse().ok()?;
        indexes.push(index);
        rest = &stripped[end + 1..];
    }
    if !rest.is_empty() {
        return None;
    }
    Some((key, indexes))
}
