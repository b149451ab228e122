//! Comparison operators
//!
//! Operands are validated once when a rule set is installed. A malformed
//! operand compiles to an operator that never matches.

use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::warn;

use super::equality::{compare_numbers, deep_equal, values_equal};
use super::ConditionSet;
use crate::types::AttributeSource;

/// A single compiled operator
#[derive(Debug, Clone)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    Gt(Option<f64>),
    Gte(Option<f64>),
    Lt(Option<f64>),
    Lte(Option<f64>),
    In(Option<Vec<Value>>),
    Nin(Option<Vec<Value>>),
    Exists(Option<bool>),
    Regex(Option<Regex>),
    Size(Option<usize>),
    All(Option<Vec<Value>>),
    ElemMatch(Option<ConditionSet>),
}

impl Operator {
    /// Compile `name` with its operand; `None` for unrecognised names
    pub fn parse(name: &str, operand: &Value) -> Option<Self> {
        let op = match name {
            "$eq" => Self::Eq(operand.clone()),
            "$ne" => Self::Ne(operand.clone()),
            "$gt" => Self::Gt(operand.as_f64()),
            "$gte" => Self::Gte(operand.as_f64()),
            "$lt" => Self::Lt(operand.as_f64()),
            "$lte" => Self::Lte(operand.as_f64()),
            "$in" => Self::In(operand.as_array().cloned()),
            "$nin" => Self::Nin(operand.as_array().cloned()),
            "$exists" => Self::Exists(operand.as_bool()),
            "$regex" => Self::Regex(operand.as_str().and_then(compile_regex)),
            "$size" => Self::Size(array_length(operand)),
            "$all" => Self::All(operand.as_array().cloned()),
            "$elemMatch" => Self::ElemMatch(operand.as_object().map(ConditionSet::compile)),
            _ => return None,
        };
        Some(op)
    }

    /// Evaluate against the resolved attribute
    pub fn evaluate(&self, actual: Option<&Value>) -> bool {
        match self {
            Self::Eq(expected) => deep_equal(expected, actual),
            Self::Ne(expected) => !deep_equal(expected, actual),
            Self::Gt(bound) => ordered(actual, *bound, |o| o == Ordering::Greater),
            Self::Gte(bound) => ordered(actual, *bound, |o| o != Ordering::Less),
            Self::Lt(bound) => ordered(actual, *bound, |o| o == Ordering::Less),
            Self::Lte(bound) => ordered(actual, *bound, |o| o != Ordering::Greater),
            Self::In(Some(options)) => options.iter().any(|v| deep_equal(v, actual)),
            Self::Nin(Some(options)) => !options.iter().any(|v| deep_equal(v, actual)),
            Self::Exists(Some(expected)) => actual.is_some() == *expected,
            Self::Regex(Some(regex)) => match actual {
                Some(Value::String(text)) => regex.is_match(text),
                _ => false,
            },
            Self::Size(Some(len)) => match actual {
                Some(Value::Array(items)) => items.len() == *len,
                _ => false,
            },
            Self::All(Some(required)) => match actual {
                Some(Value::Array(items)) => required
                    .iter()
                    .all(|r| items.iter().any(|item| values_equal(r, item))),
                _ => false,
            },
            Self::ElemMatch(Some(set)) => match actual {
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| set.matches(item as &dyn AttributeSource)),
                _ => false,
            },
            Self::In(None)
            | Self::Nin(None)
            | Self::Exists(None)
            | Self::Regex(None)
            | Self::Size(None)
            | Self::All(None)
            | Self::ElemMatch(None) => false,
        }
    }
}

fn ordered(actual: Option<&Value>, bound: Option<f64>, accept: impl Fn(Ordering) -> bool) -> bool {
    match (actual, bound) {
        (Some(actual), Some(bound)) => compare_numbers(actual, bound).is_some_and(accept),
        _ => false,
    }
}

/// Integral, non-negative lengths of any numeric width (`2` and `2.0` alike)
fn array_length(operand: &Value) -> Option<usize> {
    if let Some(n) = operand.as_u64() {
        return usize::try_from(n).ok();
    }
    let n = operand.as_f64()?;
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= usize::MAX as f64 {
        Some(n as usize)
    } else {
        None
    }
}

fn compile_regex(pattern: &str) -> Option<Regex> {
    match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Invalid $regex operand; operator will never match");
            None
        }
    }
}
