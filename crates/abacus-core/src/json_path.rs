//! Dot-path traversal over JSON documents.
//!
//! Attribute maps in evaluation contexts are plain `serde_json` values. Policy
//! predicates address them with dot paths such as `owner.department` or
//! `tags.0`; a path that leaves the document resolves to `None`.

use serde_json::{Map, Value};

/// Resolve a dot-separated path inside a JSON document.
///
/// Object segments are looked up by key, array segments by decimal index.
/// Returns `None` if any segment is absent or the path is empty.
///
/// ```
/// use abacus_core::resolve_path;
/// use serde_json::json;
///
/// let doc = json!({"owner": {"department": "sales"}, "tags": ["a", "b"]});
/// assert_eq!(resolve_path(&doc, "owner.department"), Some(&json!("sales")));
/// assert_eq!(resolve_path(&doc, "tags.1"), Some(&json!("b")));
/// assert_eq!(resolve_path(&doc, "owner.missing"), None);
/// ```
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a dot-separated path whose first segment is a key of `map`.
///
/// Equivalent to [`resolve_path`] on `Value::Object(map)` without building
/// the wrapper value.
pub fn resolve_in_map<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    if head.is_empty() {
        return None;
    }
    let value = map.get(head)?;
    match rest {
        Some(rest) => resolve_path(value, rest),
        None => Some(value),
    }
}

/// Serialize a JSON value with object keys in sorted order.
///
/// Two documents that differ only in key order produce the same string, which
/// makes the output usable as a fingerprint input.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_nested_object() {
        let doc = json!({"a": {"b": {"c": 42}}});
        assert_eq!(resolve_path(&doc, "a.b.c"), Some(&json!(42)));
        assert_eq!(resolve_path(&doc, "a.b"), Some(&json!({"c": 42})));
    }

    #[test]
    fn test_resolve_missing_segment() {
        let doc = json!({"a": {"b": 1}});
        assert_eq!(resolve_path(&doc, "a.x"), None);
        assert_eq!(resolve_path(&doc, "a.b.c"), None);
        assert_eq!(resolve_path(&doc, ""), None);
        assert_eq!(resolve_path(&doc, "a..b"), None);
    }

    #[test]
    fn test_resolve_null_is_defined() {
        let doc = json!({"a": null});
        assert_eq!(resolve_path(&doc, "a"), Some(&Value::Null));
    }

    #[test]
    fn test_resolve_array_index() {
        let doc = json!({"items": [{"id": "x"}, {"id": "y"}]});
        assert_eq!(resolve_path(&doc, "items.1.id"), Some(&json!("y")));
        assert_eq!(resolve_path(&doc, "items.5"), None);
        assert_eq!(resolve_path(&doc, "items.first"), None);
    }

    #[test]
    fn test_canonical_json_ignores_key_order() {
        let a = json!({"b": 1, "a": {"y": [1, 2], "x": "s"}});
        let b = json!({"a": {"x": "s", "y": [1, 2]}, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":{"x":"s","y":[1,2]},"b":1}"#);
    }

    #[test]
    fn test_canonical_json_escapes_keys() {
        let v = json!({"we\"ird": true});
        assert_eq!(canonical_json(&v), r#"{"we\"ird":true}"#);
    }

    #[test]
    fn test_resolve_in_map() {
        let doc = json!({"owner": {"id": "u-1"}, "level": 3});
        let map = doc.as_object().unwrap();
        assert_eq!(resolve_in_map(map, "owner.id"), Some(&json!("u-1")));
        assert_eq!(resolve_in_map(map, "level"), Some(&json!(3)));
        assert_eq!(resolve_in_map(map, "owner.name"), None);
        assert_eq!(resolve_in_map(map, ""), None);
        assert_eq!(resolve_in_map(map, "owner."), None);
    }
}
