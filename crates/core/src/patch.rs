//! Pointer-addressed point fixes for JSON documents.
//!
//! Fix requests arrive either as a JSON-Patch subset (`add`, `replace`,
//! `remove` operations with RFC 6901 pointers) or in the legacy dotted
//! form (`$.product.name`), which is converted to a pointer and applied
//! with add semantics so a missing required field can be filled in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Replace => "replace",
            PatchOp::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    /// The legacy single-fix form: upsert `value` at a dotted or
    /// pointer path.
    pub fn legacy_fix(path: &str, value: Value) -> Result<Self, Error> {
        Ok(PatchOperation {
            op: PatchOp::Add,
            path: pointer_from_legacy_path(path)?,
            value: Some(value),
        })
    }

    fn required_value(&self) -> Result<&Value, Error> {
        self.value.as_ref().ok_or_else(|| {
            Error::invalid_field(
                "value",
                format!("value is required for {} operations", self.op.as_str()),
            )
        })
    }
}

// ──────────────────────────────────────────────
// Pointer handling
// ──────────────────────────────────────────────

/// Split an RFC 6901 pointer into unescaped tokens.
pub fn decode_pointer(path: &str) -> Result<Vec<String>, Error> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(Error::invalid_field(
            "path",
            "path must use JSON Pointer syntax (must start with '/')",
        ));
    };
    // Unescape order per RFC 6901: ~1 first, then ~0.
    Ok(rest
        .split('/')
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Convert a legacy dotted path (`$.a.b`, `a.b`) to a JSON Pointer.
/// Pointer-shaped input passes through unchanged.
pub fn pointer_from_legacy_path(path: &str) -> Result<String, Error> {
    let value = path.trim();
    if value.is_empty() {
        return Err(Error::invalid_field("path", "path is required"));
    }
    if value.starts_with('/') {
        return Ok(value.to_string());
    }
    if value == "$" {
        return Ok(String::new());
    }
    let dotted = value
        .strip_prefix("$.")
        .or_else(|| value.strip_prefix('$'))
        .unwrap_or(value);
    let escaped: Vec<String> = dotted
        .split('.')
        .filter(|token| !token.is_empty())
        .map(|token| token.replace('~', "~0").replace('/', "~1"))
        .collect();
    Ok(format!("/{}", escaped.join("/")))
}

fn parse_list_index(token: &str, length: usize, allow_end: bool) -> Result<usize, Error> {
    if token == "-" && allow_end {
        return Ok(length);
    }
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_field(
            "path",
            format!("invalid array index '{token}'"),
        ));
    }
    let index: usize = token
        .parse()
        .map_err(|_| Error::invalid_field("path", format!("invalid array index '{token}'")))?;
    if allow_end && index == length {
        return Ok(index);
    }
    if index >= length {
        return Err(Error::invalid_field(
            "path",
            format!("array index out of bounds '{token}'"),
        ));
    }
    Ok(index)
}

fn resolve_parent<'doc, 'tok>(
    document: &'doc mut Value,
    tokens: &'tok [String],
) -> Result<(&'doc mut Value, &'tok str), Error> {
    // Caller guarantees tokens is non-empty.
    let (last, walk) = match tokens.split_last() {
        Some(split) => split,
        None => {
            return Err(Error::invalid_field("path", "empty pointer has no parent"));
        }
    };
    let mut current = document;
    for token in walk {
        current = match current {
            Value::Object(map) => map.get_mut(token).ok_or_else(|| {
                Error::invalid_field("path", format!("path segment '{token}' not found"))
            })?,
            Value::Array(items) => {
                let index = parse_list_index(token, items.len(), false)?;
                &mut items[index]
            }
            _ => {
                return Err(Error::invalid_field(
                    "path",
                    "cannot traverse non-container value",
                ));
            }
        };
    }
    Ok((current, last.as_str()))
}

// ──────────────────────────────────────────────
// Application
// ──────────────────────────────────────────────

/// Apply one operation to `document` in place.
pub fn apply_operation(document: &mut Value, operation: &PatchOperation) -> Result<(), Error> {
    let tokens = decode_pointer(&operation.path)?;
    if tokens.is_empty() {
        return match operation.op {
            PatchOp::Remove => Err(Error::invalid_field("path", "cannot remove root document")),
            PatchOp::Add | PatchOp::Replace => {
                *document = operation.required_value()?.clone();
                Ok(())
            }
        };
    }

    let (parent, token) = resolve_parent(document, &tokens)?;
    match parent {
        Value::Object(map) => match operation.op {
            PatchOp::Add => {
                map.insert(token.to_string(), operation.required_value()?.clone());
            }
            PatchOp::Replace => {
                if !map.contains_key(token) {
                    return Err(Error::invalid_field(
                        "path",
                        format!("path '{}' does not exist for replace", operation.path),
                    ));
                }
                map.insert(token.to_string(), operation.required_value()?.clone());
            }
            PatchOp::Remove => {
                if map.remove(token).is_none() {
                    return Err(Error::invalid_field(
                        "path",
                        format!("path '{}' does not exist for remove", operation.path),
                    ));
                }
            }
        },
        Value::Array(items) => match operation.op {
            PatchOp::Add => {
                let index = parse_list_index(token, items.len(), true)?;
                items.insert(index, operation.required_value()?.clone());
            }
            PatchOp::Replace => {
                let index = parse_list_index(token, items.len(), false)?;
                items[index] = operation.required_value()?.clone();
            }
            PatchOp::Remove => {
                let index = parse_list_index(token, items.len(), false)?;
                items.remove(index);
            }
        },
        _ => {
            return Err(Error::invalid_field(
                "path",
                "target parent is not an object or array",
            ));
        }
    }
    Ok(())
}

/// Apply a sequence of operations to a copy of `document`. The input
/// document is never mutated, and a failing operation discards all
/// earlier ones.
pub fn apply_patch(document: &Value, operations: &[PatchOperation]) -> Result<Value, Error> {
    let mut patched = document.clone();
    for operation in operations {
        apply_operation(&mut patched, operation)?;
    }
    Ok(patched)
}
