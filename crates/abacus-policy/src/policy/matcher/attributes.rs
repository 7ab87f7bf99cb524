//! Attribute comparison.
//!
//! [`compare`] decides whether an actual attribute value (possibly absent)
//! satisfies an expected predicate taken from a policy, after variable
//! substitution. Predicates are either plain values or operator objects such
//! as `{"$gte": 10}` or `{"in": ["a", "b"]}`.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::RegexCache;

/// Canonical operator names, keyed by every accepted spelling.
const OPERATORS: &[(&str, &str)] = &[
    ("equals", "equals"),
    ("$eq", "equals"),
    ("not_equals", "not_equals"),
    ("$ne", "not_equals"),
    ("in", "in"),
    ("$in", "in"),
    ("not_in", "not_in"),
    ("$nin", "not_in"),
    ("contains", "contains"),
    ("$contains", "contains"),
    ("not_contains", "not_contains"),
    ("starts_with", "starts_with"),
    ("ends_with", "ends_with"),
    ("between", "between"),
    ("not_between", "not_between"),
    ("gt", "gt"),
    ("$gt", "gt"),
    ("gte", "gte"),
    ("$gte", "gte"),
    ("lt", "lt"),
    ("$lt", "lt"),
    ("lte", "lte"),
    ("$lte", "lte"),
    ("regex", "regex"),
    ("$regex", "regex"),
    ("exists", "exists"),
    ("$exists", "exists"),
];

/// Map an operator key to its canonical name.
#[must_use]
pub fn operator_name(key: &str) -> Option<&'static str> {
    OPERATORS
        .iter()
        .find(|(spelling, _)| *spelling == key)
        .map(|(_, canonical)| *canonical)
}

/// Returns `true` if every key of a non-empty object is an operator.
#[must_use]
pub fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| operator_name(k).is_some())
}

/// Returns `true` for `/…/`-delimited strings.
#[must_use]
pub fn is_regex_literal(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('/') && s.ends_with('/')
}

/// Compare an actual value against an expected predicate.
///
/// - `"*"` requires the value to be present.
/// - an array requires the value to be one of its members.
/// - a `/…/` string is a regular expression tested against the stringified value.
/// - an operator object applies every operator (AND).
/// - any other object is compared key by key.
/// - everything else is strict equality.
#[must_use]
pub fn compare(actual: Option<&Value>, expected: &Value, regexes: &RegexCache) -> bool {
    match expected {
        Value::String(s) if s == "*" => actual.is_some(),
        Value::String(s) if is_regex_literal(s) => actual
            .map(stringify)
            .is_some_and(|text| regexes.is_match(&s[1..s.len() - 1], &text)),
        Value::Array(members) => actual.is_some_and(|a| members.contains(a)),
        Value::Object(map) if is_operator_object(map) => map.iter().all(|(key, operand)| {
            operator_name(key).is_some_and(|op| apply_operator(op, actual, operand, regexes))
        }),
        Value::Object(map) => match actual {
            Some(Value::Object(actual_map)) => map
                .iter()
                .all(|(key, nested)| compare(actual_map.get(key), nested, regexes)),
            _ => false,
        },
        other => actual == Some(other),
    }
}

fn apply_operator(op: &str, actual: Option<&Value>, operand: &Value, regexes: &RegexCache) -> bool {
    match op {
        "equals" => actual == Some(operand),
        "not_equals" => actual != Some(operand),
        "in" => membership(actual, operand).unwrap_or(false),
        "not_in" => match actual {
            None => operand.is_array(),
            Some(_) => membership(actual, operand).is_some_and(|found| !found),
        },
        "contains" => contains(actual, operand).unwrap_or(false),
        "not_contains" => match actual {
            None => true,
            Some(_) => contains(actual, operand).is_some_and(|found| !found),
        },
        "starts_with" => match (actual, operand) {
            (Some(Value::String(a)), Value::String(prefix)) => a.starts_with(prefix.as_str()),
            _ => false,
        },
        "ends_with" => match (actual, operand) {
            (Some(Value::String(a)), Value::String(suffix)) => a.ends_with(suffix.as_str()),
            _ => false,
        },
        "between" => between(actual, operand).unwrap_or(false),
        "not_between" => between(actual, operand).is_some_and(|inside| !inside),
        "gt" => ordering(actual, operand).is_some_and(Ordering::is_gt),
        "gte" => ordering(actual, operand).is_some_and(Ordering::is_ge),
        "lt" => ordering(actual, operand).is_some_and(Ordering::is_lt),
        "lte" => ordering(actual, operand).is_some_and(Ordering::is_le),
        "regex" => match (actual, operand) {
            (Some(a), Value::String(pattern)) => {
                let body = if is_regex_literal(pattern) {
                    &pattern[1..pattern.len() - 1]
                } else {
                    pattern.as_str()
                };
                regexes.is_match(body, &stringify(a))
            }
            _ => false,
        },
        "exists" => match operand {
            Value::Bool(expected) => actual.is_some() == *expected,
            _ => false,
        },
        _ => false,
    }
}

/// `None` when the operand is not a list.
fn membership(actual: Option<&Value>, operand: &Value) -> Option<bool> {
    let members = operand.as_array()?;
    Some(actual.is_some_and(|a| members.contains(a)))
}

/// `None` when the actual value is not a string or an array.
fn contains(actual: Option<&Value>, operand: &Value) -> Option<bool> {
    match actual? {
        Value::String(text) => Some(operand.as_str().is_some_and(|needle| text.contains(needle))),
        Value::Array(items) => Some(items.contains(operand)),
        _ => None,
    }
}

/// `None` when the value or bounds are not comparable.
fn between(actual: Option<&Value>, operand: &Value) -> Option<bool> {
    let bounds = operand.as_array()?;
    let [low, high] = bounds.as_slice() else {
        return None;
    };
    let lower = ordering(actual, low)?;
    let upper = ordering(actual, high)?;
    Some(lower.is_ge() && upper.is_le())
}

/// Order two numbers numerically or two strings lexically.
///
/// Lexical order makes RFC 3339 timestamps with the same offset comparable.
fn ordering(actual: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (actual?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(actual: Option<Value>, expected: Value) -> bool {
        compare(actual.as_ref(), &expected, &RegexCache::new())
    }

    #[test]
    fn test_wildcard_requires_presence() {
        assert!(check(Some(json!("anything")), json!("*")));
        assert!(check(Some(Value::Null), json!("*")));
        assert!(!check(None, json!("*")));
    }

    #[test]
    fn test_array_membership() {
        assert!(check(Some(json!("sales")), json!(["sales", "support"])));
        assert!(!check(Some(json!("finance")), json!(["sales", "support"])));
        assert!(!check(None, json!(["sales"])));
    }

    #[test]
    fn test_regex_literal() {
        assert!(check(Some(json!("SKU-123")), json!("/^SKU-\\d+$/")));
        assert!(check(Some(json!(42)), json!("/^4/")));
        assert!(!check(Some(json!("sku-123")), json!("/^SKU/")));
        assert!(!check(None, json!("/.*/")));
        assert!(!check(Some(json!("x")), json!("/[unclosed/")));
    }

    #[test]
    fn test_nested_object() {
        let actual = json!({"owner": {"id": "u-1", "team": "red"}});
        assert!(check(Some(actual.clone()), json!({"owner": {"id": "u-1"}})));
        assert!(!check(Some(actual), json!({"owner": {"id": "u-2"}})));
        assert!(!check(Some(json!("flat")), json!({"owner": {"id": "u-1"}})));
    }

    #[test]
    fn test_strict_equality() {
        assert!(check(Some(json!(5)), json!(5)));
        assert!(!check(Some(json!("5")), json!(5)));
        assert!(check(Some(json!(true)), json!(true)));
        assert!(!check(None, json!("org-1")));
    }

    #[test]
    fn test_comparison_operators() {
        assert!(check(Some(json!(10)), json!({"$gt": 5})));
        assert!(check(Some(json!(10)), json!({"gte": 10, "lt": 11})));
        assert!(!check(Some(json!(10)), json!({"$lte": 9})));
        assert!(!check(Some(json!("10")), json!({"gt": 5})));
        assert!(check(
            Some(json!("2024-05-01")),
            json!({"$gte": "2024-01-01", "$lt": "2025-01-01"})
        ));
    }

    #[test]
    fn test_membership_operators() {
        assert!(check(Some(json!("a")), json!({"in": ["a", "b"]})));
        assert!(check(Some(json!("c")), json!({"$nin": ["a", "b"]})));
        assert!(check(None, json!({"not_in": ["a"]})));
        assert!(!check(Some(json!("a")), json!({"not_in": ["a"]})));
        assert!(!check(Some(json!("a")), json!({"in": "a"})));
    }

    #[test]
    fn test_string_operators() {
        assert!(check(Some(json!("hello world")), json!({"contains": "lo w"})));
        assert!(check(Some(json!(["x", "y"])), json!({"$contains": "y"})));
        assert!(check(Some(json!("hello")), json!({"not_contains": "z"})));
        assert!(check(Some(json!("hello")), json!({"starts_with": "he", "ends_with": "lo"})));
        assert!(check(Some(json!("hello")), json!({"regex": "^h.*o$"})));
        assert!(!check(Some(json!("hello")), json!({"$regex": "/ELL/"})));
    }

    #[test]
    fn test_range_operators() {
        assert!(check(Some(json!(5)), json!({"between": [1, 10]})));
        assert!(check(Some(json!(1)), json!({"between": [1, 10]})));
        assert!(!check(Some(json!(11)), json!({"between": [1, 10]})));
        assert!(check(Some(json!(11)), json!({"not_between": [1, 10]})));
        assert!(!check(Some(json!(5)), json!({"not_between": [1, 10]})));
        assert!(!check(None, json!({"not_between": [1, 10]})));
        assert!(!check(Some(json!(5)), json!({"between": [1]})));
    }

    #[test]
    fn test_equality_and_existence_operators() {
        assert!(check(Some(json!("a")), json!({"equals": "a"})));
        assert!(check(Some(json!("a")), json!({"$ne": "b"})));
        assert!(check(None, json!({"not_equals": "b"})));
        assert!(check(Some(json!(1)), json!({"$exists": true})));
        assert!(check(None, json!({"exists": false})));
        assert!(!check(None, json!({"exists": true})));
    }

    #[test]
    fn test_mixed_keys_are_not_operators() {
        let expected = json!({"in": ["a"], "team": "red"});
        assert!(!is_operator_object(expected.as_object().unwrap()));
        assert!(check(Some(json!({"in": "a", "team": "red"})), expected));
    }
}
