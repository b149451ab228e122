//! Deep equality with numeric coercion

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use crate::types::AttributeSource;

/// Compare an expected value with a possibly absent attribute
///
/// An absent attribute equals an expected `null`.
pub fn deep_equal(expected: &Value, actual: Option<&Value>) -> bool {
    match actual {
        Some(actual) => values_equal(expected, actual),
        None => expected.is_null(),
    }
}

/// Matching equality between an expected and an actual value
///
/// - numbers compare by value regardless of representation (`42 == 42.0`)
/// - an expected object matches when each of its keys is present in the
///   actual object with an equal value; extra actual keys are ignored
/// - arrays must have the same length and be pairwise equal, in order
pub fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(expected), Value::Number(actual)) => numbers_equal(expected, actual),
        (Value::Object(expected), Value::Object(actual)) => object_matches(expected, actual),
        (Value::Object(expected), other) => object_matches(expected, &other.attributes()),
        (Value::Array(expected), Value::Array(actual)) => {
            expected.len() == actual.len()
                && expected
                    .iter()
                    .zip(actual.iter())
                    .all(|(e, a)| values_equal(e, a))
        }
        (expected, actual) => expected == actual,
    }
}

/// Order two numeric values; `None` if either is not a number
pub fn compare_numbers(actual: &Value, expected: f64) -> Option<Ordering> {
    actual.as_f64()?.partial_cmp(&expected)
}

fn object_matches(expected: &Map<String, Value>, actual: &Map<String, Value>) -> bool {
    expected.iter().all(|(key, value)| {
        actual
            .get(key)
            .is_some_and(|actual| values_equal(value, actual))
    })
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
