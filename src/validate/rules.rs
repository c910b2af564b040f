//! Built-in rules over field snapshots
//!
//! Numbers compare by value; strings, arrays and objects by length, except
//! `eq`/`ne`/`oneof` which compare strings by content.

use serde_json::Value;

/// Outcome of a built-in rule; `None` when the rule name is unknown
pub(super) fn check(rule: &str, value: &Value, param: &str) -> Option<bool> {
    let passed = match rule {
        "required" => !is_zero(value),
        "min" | "gte" => compare(value, param, |ord| ord.is_ge()),
        "max" | "lte" => compare(value, param, |ord| ord.is_le()),
        "gt" => compare(value, param, |ord| ord.is_gt()),
        "lt" => compare(value, param, |ord| ord.is_lt()),
        "len" => compare(value, param, |ord| ord.is_eq()),
        "eq" => equals(value, param),
        "ne" => !equals(value, param),
        "oneof" => param.split_whitespace().any(|candidate| equals(value, candidate)),
        _ => return None,
    };
    Some(passed)
}

/// The zero value of the field's type
pub(super) fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Measured quantity: the number itself, or a length
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Object(map) => Some(map.len() as f64),
        Value::Null | Value::Bool(_) => None,
    }
}

fn compare(value: &Value, param: &str, accept: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    let (Some(actual), Ok(limit)) = (measure(value), param.trim().parse::<f64>()) else {
        return false;
    };
    actual.partial_cmp(&limit).is_some_and(accept)
}

fn equals(value: &Value, param: &str) -> bool {
    match value {
        Value::String(s) => s == param,
        Value::Bool(b) => param.parse::<bool>().is_ok_and(|p| p == *b),
        Value::Number(n) => match (n.as_f64(), param.parse::<f64>()) {
            (Some(actual), Ok(expected)) => actual == expected,
            _ => false,
        },
        Value::Array(_) | Value::Object(_) => compare(value, param, |ord| ord.is_eq()),
        Value::Null => false,
    }
}
