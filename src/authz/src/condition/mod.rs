//! Attribute conditions
//!
//! A rule's conditions map attribute paths to expectations. Every entry must
//! hold for the rule to match a subject instance (logical AND):
//!
//! - a literal value matches by deep equality
//! - an object whose keys all start with `$` is an operator expression
//!   (`$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`,
//!   `$regex`, `$size`, `$all`, `$elemMatch`), and every operator must hold
//! - keys may be dotted paths (`author.id`) into nested attributes
//!
//! Conditions are compiled once per rule when an index is built.
//!
//! # Examples
//!
//! ```
//! use abac_authz::condition::ConditionSet;
//! use serde_json::json;
//!
//! let conditions = json!({"authorId": 1, "score": {"$gte": 10}});
//! let set = ConditionSet::compile(conditions.as_object().unwrap());
//!
//! assert!(set.matches(&json!({"authorId": 1, "score": 12})));
//! assert!(!set.matches(&json!({"authorId": 2, "score": 12})));
//! ```

mod equality;
mod operators;
mod path;

pub use equality::{deep_equal, values_equal};
pub use operators::Operator;

use serde_json::{Map, Value};
use tracing::debug;

use crate::types::AttributeSource;

/// Compiled conditions of one rule
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    entries: Vec<Condition>,
}

#[derive(Debug, Clone)]
struct Condition {
    path: Vec<String>,
    expectation: Expectation,
}

#[derive(Debug, Clone)]
enum Expectation {
    Literal(Value),
    Operators(Vec<Operator>),
}

impl ConditionSet {
    /// Compile a conditions mapping
    ///
    /// Never fails: malformed operands compile to operators that never match,
    /// and an object mixing in unrecognised `$` keys is compared literally.
    pub fn compile(conditions: &Map<String, Value>) -> Self {
        let entries = conditions
            .iter()
            .map(|(key, expected)| Condition {
                path: path::split(key),
                expectation: Expectation::compile(key, expected),
            })
            .collect();

        Self { entries }
    }

    /// Whether every condition holds for `source`
    pub fn matches(&self, source: &dyn AttributeSource) -> bool {
        self.entries.iter().all(|condition| {
            let actual = path::resolve(source, &condition.path);
            condition.expectation.matches(actual.as_deref())
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Expectation {
    fn compile(key: &str, expected: &Value) -> Self {
        let Some(object) = expected.as_object().filter(|o| is_operator_object(o)) else {
            return Self::Literal(expected.clone());
        };

        let parsed: Option<Vec<Operator>> = object
            .iter()
            .map(|(name, operand)| Operator::parse(name, operand))
            .collect();

        match parsed {
            Some(operators) => Self::Operators(operators),
            None => {
                debug!(
                    condition = %key,
                    "Unrecognised operator in condition; comparing object literally"
                );
                Self::Literal(expected.clone())
            }
        }
    }

    fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Self::Literal(expected) => deep_equal(expected, actual),
            Self::Operators(operators) => operators.iter().all(|op| op.evaluate(actual)),
        }
    }
}

fn is_operator_object(object: &Map<String, Value>) -> bool {
    !object.is_empty() && object.keys().all(|k| k.starts_with('$'))
}

/// Evaluate optional conditions against an optional subject instance
///
/// Absent or empty conditions always match. Present conditions never match a
/// missing subject.
pub fn evaluate(conditions: Option<&Map<String, Value>>, subject: Option<&dyn AttributeSource>) -> bool {
    match conditions {
        None => true,
        Some(conditions) if conditions.is_empty() => true,
        Some(conditions) => match subject {
            Some(subject) => ConditionSet::compile(conditions).matches(subject),
            None => false,
        },
    }
}
