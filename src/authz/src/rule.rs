//! Rule definition and validation
//!
//! A [`Rule`] is immutable once built. The only ways to obtain one are
//! [`RuleBuilder::build`] and [`RuleDefinition::into_rule`], both of which
//! validate, so every later stage can assume well-formed input.

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Permission rule
///
/// Serializes as its [`RuleDefinition`]; deserializing validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RuleDefinition", try_from = "RuleDefinition")]
pub struct Rule {
    actions: Vec<String>,
    subject_type: String,
    conditions: Option<Map<String, Value>>,
    fields: Option<Vec<String>>,
    inverted: bool,
    reason: Option<String>,
}

impl Rule {
    /// Start a rule granting `actions` on `subject_type`
    pub fn can<A: ActionList>(actions: A, subject_type: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(actions.into_actions(), subject_type.into(), false)
    }

    /// Start a rule prohibiting `actions` on `subject_type`
    pub fn cannot<A: ActionList>(actions: A, subject_type: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(actions.into_actions(), subject_type.into(), true)
    }

    /// Actions covered by this rule, in declaration order without duplicates
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Subject type this rule applies to
    pub fn subject_type(&self) -> &str {
        &self.subject_type
    }

    /// Attribute conditions, if any
    pub fn conditions(&self) -> Option<&Map<String, Value>> {
        self.conditions.as_ref()
    }

    /// Field patterns, if the rule is restricted to a subset of fields
    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    /// Whether this rule is a prohibition
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Explanation surfaced on denial
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Whether the rule carries non-empty conditions
    pub fn has_conditions(&self) -> bool {
        self.conditions.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Convert back to the exchange representation
    pub fn to_definition(&self) -> RuleDefinition {
        RuleDefinition {
            actions: Actions::Many(self.actions.clone()),
            subject: self.subject_type.clone(),
            conditions: self.conditions.clone().map(Value::Object),
            fields: self.fields.clone(),
            inverted: self.inverted,
            reason: self.reason.clone(),
        }
    }

    fn validate(
        actions: Vec<String>,
        subject_type: String,
        conditions: Option<Value>,
        fields: Option<Vec<String>>,
        inverted: bool,
        reason: Option<String>,
    ) -> Result<Self> {
        if actions.is_empty() {
            return Err(AuthzError::InvalidRule(format!(
                "Rule for '{}' must have at least one action",
                subject_type
            )));
        }

        let mut unique: Vec<String> = Vec::with_capacity(actions.len());
        for action in actions {
            if action.trim().is_empty() {
                return Err(AuthzError::InvalidRule(format!(
                    "Rule for '{}' has a blank action",
                    subject_type
                )));
            }
            if !unique.contains(&action) {
                unique.push(action);
            }
        }

        if subject_type.trim().is_empty() {
            return Err(AuthzError::InvalidRule(format!(
                "Rule for actions [{}] has a blank subject type",
                unique.join(", ")
            )));
        }

        if let Some(fields) = &fields {
            if fields.is_empty() {
                return Err(AuthzError::InvalidRule(format!(
                    "Rule for '{}' has an empty field list; omit it to cover the whole subject",
                    subject_type
                )));
            }
            if fields.iter().any(|f| f.trim().is_empty()) {
                return Err(AuthzError::InvalidRule(format!(
                    "Rule for '{}' has a blank field pattern",
                    subject_type
                )));
            }
        }

        let conditions = match conditions {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                return Err(AuthzError::InvalidRule(format!(
                    "Conditions for '{}' must be an object, got {}",
                    subject_type, other
                )))
            }
        };

        Ok(Self {
            actions: unique,
            subject_type,
            conditions,
            fields,
            inverted,
            reason,
        })
    }
}

/// Builder returned by [`Rule::can`] and [`Rule::cannot`]
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    actions: Vec<String>,
    subject_type: String,
    conditions: Option<Value>,
    fields: Option<Vec<String>>,
    inverted: bool,
    reason: Option<String>,
}

impl RuleBuilder {
    fn new(actions: Vec<String>, subject_type: String, inverted: bool) -> Self {
        Self {
            actions,
            subject_type,
            conditions: None,
            fields: None,
            inverted,
            reason: None,
        }
    }

    /// Restrict the rule to subjects matching these conditions
    pub fn with_conditions(mut self, conditions: Value) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Restrict the rule to these field patterns
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Attach an explanation surfaced on denial
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Validate and build the rule
    pub fn build(self) -> Result<Rule> {
        Rule::validate(
            self.actions,
            self.subject_type,
            self.conditions,
            self.fields,
            self.inverted,
            self.reason,
        )
    }
}

/// Anything accepted as the action list of a rule
pub trait ActionList {
    fn into_actions(self) -> Vec<String>;
}

impl ActionList for &str {
    fn into_actions(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl ActionList for String {
    fn into_actions(self) -> Vec<String> {
        vec![self]
    }
}

impl ActionList for Vec<String> {
    fn into_actions(self) -> Vec<String> {
        self
    }
}

impl ActionList for Vec<&str> {
    fn into_actions(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl<const N: usize> ActionList for [&str; N] {
    fn into_actions(self) -> Vec<String> {
        self.iter().map(|a| a.to_string()).collect()
    }
}

/// One action or a list of actions, as written in rule documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Actions {
    One(String),
    Many(Vec<String>),
}

impl Actions {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(action) => vec![action],
            Self::Many(actions) => actions,
        }
    }
}

/// Exchange representation of a rule
///
/// ```json
/// { "actions": ["read", "update"], "subject": "Post",
///   "conditions": { "authorId": 1 }, "fields": ["title"],
///   "inverted": false, "reason": "Only authors may edit" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Action or actions covered
    #[serde(alias = "action")]
    pub actions: Actions,

    /// Subject type
    pub subject: String,

    /// Optional attribute conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,

    /// Optional field patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    /// Prohibition flag
    #[serde(default)]
    pub inverted: bool,

    /// Optional denial explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RuleDefinition {
    /// Validate into a [`Rule`]
    pub fn into_rule(self) -> Result<Rule> {
        Rule::validate(
            self.actions.into_vec(),
            self.subject,
            self.conditions,
            self.fields,
            self.inverted,
            self.reason,
        )
    }
}

impl TryFrom<RuleDefinition> for Rule {
    type Error = AuthzError;

    fn try_from(definition: RuleDefinition) -> Result<Self> {
        definition.into_rule()
    }
}

impl From<Rule> for RuleDefinition {
    fn from(rule: Rule) -> Self {
        Self {
            actions: Actions::Many(rule.actions),
            subject: rule.subject_type,
            conditions: rule.conditions.map(Value::Object),
            fields: rule.fields,
            inverted: rule.inverted,
            reason: rule.reason,
        }
    }
}

impl From<&Rule> for RuleDefinition {
    fn from(rule: &Rule) -> Self {
        rule.to_definition()
    }
}

/// Parse and validate a JSON array of rule definitions
pub fn rules_from_json(json: &str) -> Result<Vec<Rule>> {
    let definitions: Vec<RuleDefinition> = serde_json::from_str(json)?;
    definitions.into_iter().map(RuleDefinition::into_rule).collect()
}

/// Serialize rules to a JSON array of rule definitions
pub fn rules_to_json(rules: &[Rule]) -> Result<String> {
    let definitions: Vec<RuleDefinition> = rules.iter().map(Rule::to_definition).collect();
    Ok(serde_json::to_string(&definitions)?)
}
