//! `${path}` variable substitution.
//!
//! Expected values in policy predicates may reference the evaluation context,
//! e.g. `"${subject.organizationId}"`. Tokens are resolved by dot path against
//! [`EvaluationContext::variable_document`](crate::policy::context::EvaluationContext::variable_document).
//! A token that does not resolve stays in place as literal text, so the
//! comparison that uses it fails instead of erroring.

use abacus_core::resolve_path;
use serde_json::Value;

/// Returns `true` if `value` contains at least one `${…}` token.
#[must_use]
pub fn has_variables(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains("${"),
        Value::Array(items) => items.iter().any(has_variables),
        Value::Object(map) => map.values().any(has_variables),
        _ => false,
    }
}

/// Substitute every `${path}` token inside `expected`.
///
/// A string that consists of exactly one token takes the resolved value with
/// its JSON type intact. Tokens embedded in longer strings are spliced in as
/// text. Arrays and objects are substituted recursively.
#[must_use]
pub fn substitute(expected: &Value, document: &Value) -> Value {
    match expected {
        Value::String(s) => substitute_str(s, document),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, document)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, document)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(s: &str, document: &Value) -> Value {
    if !s.contains("${") {
        return Value::String(s.to_string());
    }

    if let Some(path) = s
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|path| !path.contains('}'))
        && let Some(resolved) = resolve_path(document, path.trim())
    {
        return resolved.clone();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Value::String(out);
        };
        let token = &rest[open..open + 2 + close + 1];
        match resolve_path(document, after[..close].trim()) {
            Some(Value::String(text)) => out.push_str(text),
            Some(other) => out.push_str(&other.to_string()),
            None => out.push_str(token),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Value::String(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "subject": {"id": "user-1", "organizationId": "org-456", "level": 3},
            "organizationId": "org-456"
        })
    }

    #[test]
    fn test_whole_token_keeps_type() {
        let doc = document();
        assert_eq!(substitute(&json!("${subject.id}"), &doc), json!("user-1"));
        assert_eq!(substitute(&json!("${subject.level}"), &doc), json!(3));
    }

    #[test]
    fn test_embedded_token() {
        let doc = document();
        assert_eq!(
            substitute(&json!("owner:${subject.id}/${subject.level}"), &doc),
            json!("owner:user-1/3")
        );
    }

    #[test]
    fn test_unresolved_token_stays_literal() {
        let doc = document();
        assert_eq!(
            substitute(&json!("${subject.nonexistent}"), &doc),
            json!("${subject.nonexistent}")
        );
        assert_eq!(
            substitute(&json!("x-${missing}-${subject.id}"), &doc),
            json!("x-${missing}-user-1")
        );
    }

    #[test]
    fn test_unterminated_token() {
        let doc = document();
        assert_eq!(
            substitute(&json!("${subject.id} and ${oops"), &doc),
            json!("user-1 and ${oops")
        );
    }

    #[test]
    fn test_nested_structures() {
        let doc = document();
        let expected = json!({"in": ["${organizationId}", "shared"], "owner": {"id": "${subject.id}"}});
        assert_eq!(
            substitute(&expected, &doc),
            json!({"in": ["org-456", "shared"], "owner": {"id": "user-1"}})
        );
        assert!(has_variables(&expected));
        assert!(!has_variables(&json!({"in": ["a"]})));
    }
}
