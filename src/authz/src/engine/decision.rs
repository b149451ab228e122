//! Authorization decision types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::Rule;

/// Why a query was allowed or denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// A grant was the last matching rule
    Allowed,

    /// A prohibition was the last matching rule
    Prohibited,

    /// No rule matched; denied by default
    NoMatchingRule,

    /// The subject was null; denied without consulting rules
    NullSubject,
}

impl DecisionReason {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Explained outcome of a permission query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the query is allowed
    pub allowed: bool,

    /// Reason for the decision
    pub reason: DecisionReason,

    /// Rule that decided the query, if any
    pub rule: Option<Rule>,

    /// Queried action
    pub action: String,

    /// Detected subject type; `None` for null or undetectable subjects
    pub subject_type: Option<String>,

    /// Queried field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Denial message; `None` when allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Snapshot generation the query was evaluated against
    pub generation: u64,

    /// Decision timestamp
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    pub(crate) fn new(
        reason: DecisionReason,
        rule: Option<&Rule>,
        action: &str,
        subject_type: Option<String>,
        field: Option<&str>,
        generation: u64,
    ) -> Self {
        Self {
            allowed: reason.is_allowed(),
            reason,
            rule: rule.cloned(),
            action: action.to_string(),
            subject_type,
            field: field.map(str::to_string),
            message: None,
            generation,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn with_message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }

    /// Whether a rule decided the query, as opposed to the default denial
    pub fn is_explicit(&self) -> bool {
        self.rule.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_decision() {
        let rule = Rule::can("read", "Post").build().unwrap();
        let decision = Decision::new(
            DecisionReason::Allowed,
            Some(&rule),
            "read",
            Some("Post".to_string()),
            None,
            3,
        );

        assert!(decision.allowed);
        assert!(decision.is_explicit());
        assert_eq!(decision.generation, 3);
        assert!(decision.message.is_none());
    }

    #[test]
    fn test_default_denial() {
        let decision = Decision::new(
            DecisionReason::NoMatchingRule,
            None,
            "delete",
            Some("Post".to_string()),
            Some("title"),
            1,
        )
        .with_message("nope".to_string());

        assert!(!decision.allowed);
        assert!(!decision.is_explicit());
        assert_eq!(decision.field.as_deref(), Some("title"));
        assert_eq!(decision.message.as_deref(), Some("nope"));
    }

    #[test]
    fn test_decision_serialization() {
        let decision = Decision::new(DecisionReason::NullSubject, None, "read", None, None, 0);
        let json = serde_json::to_value(&decision).unwrap();

        assert_eq!(json["reason"], "null_subject");
        assert_eq!(json["allowed"], false);
        assert!(json.get("field").is_none());
    }
}
