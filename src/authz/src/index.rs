//! Rule index with last-match-wins lookup
//!
//! Rules are bucketed by `action:subjectType` once per rule-set build, using
//! the alias-expanded actions of every rule. A lookup probes at most four
//! buckets (queried or reserved action × queried or reserved subject type),
//! then walks the merged candidate positions from last to first and returns
//! the first rule whose field and condition checks pass.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::alias::AliasResolver;
use crate::condition::ConditionSet;
use crate::error::Result;
use crate::field::{FieldMatcher, PatternCache};
use crate::rule::Rule;
use crate::types::AttributeSource;

/// Default reserved action matching every action
pub const ANY_ACTION: &str = "manage";

/// Default reserved subject type matching every subject type
pub const ANY_SUBJECT_TYPE: &str = "all";

/// Inputs to an index build
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Expands rule actions before bucketing
    pub resolver: AliasResolver,

    /// Reserved any-action name
    pub any_action: String,

    /// Reserved any-subject-type name
    pub any_subject_type: String,

    /// Compiled field matchers shared between builds
    pub pattern_cache: Arc<PatternCache>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            resolver: AliasResolver::identity(),
            any_action: ANY_ACTION.to_string(),
            any_subject_type: ANY_SUBJECT_TYPE.to_string(),
            pattern_cache: Arc::new(PatternCache::new()),
        }
    }
}

/// Per-rule state prepared at build time
#[derive(Debug, Clone)]
struct CompiledRule {
    actions: Vec<String>,
    fields: Option<Arc<FieldMatcher>>,
    conditions: Option<ConditionSet>,
}

/// Immutable lookup structure over one rule list
#[derive(Debug, Clone)]
pub struct RuleIndex {
    rules: Arc<[Rule]>,
    compiled: Vec<CompiledRule>,
    buckets: HashMap<String, Vec<usize>>,
    field_buckets: HashMap<String, Vec<usize>>,
    actions_by_subject: HashMap<String, Vec<String>>,
    any_action: String,
    any_subject_type: String,
}

impl RuleIndex {
    /// Build an index from rules in declaration order
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if a field pattern set cannot be compiled.
    pub fn build(rules: Vec<Rule>, options: &IndexOptions) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        let mut field_buckets: HashMap<String, Vec<usize>> = HashMap::new();
        let mut actions_by_subject: HashMap<String, Vec<String>> = HashMap::new();

        for (position, rule) in rules.iter().enumerate() {
            let actions = options.resolver.expand(rule.actions());

            let declared = actions_by_subject
                .entry(rule.subject_type().to_string())
                .or_default();
            for action in &actions {
                buckets
                    .entry(bucket_key(action, rule.subject_type()))
                    .or_default()
                    .push(position);
                if !declared.contains(action) {
                    declared.push(action.clone());
                }
            }

            let fields = match rule.fields() {
                Some(patterns) => {
                    for pattern in patterns {
                        let positions = field_buckets.entry(pattern.clone()).or_default();
                        if positions.last() != Some(&position) {
                            positions.push(position);
                        }
                    }
                    Some(options.pattern_cache.get_or_compile(patterns)?)
                }
                None => None,
            };

            let conditions = rule
                .conditions()
                .filter(|c| !c.is_empty())
                .map(ConditionSet::compile);

            compiled.push(CompiledRule {
                actions,
                fields,
                conditions,
            });
        }

        debug!(
            rules = rules.len(),
            buckets = buckets.len(),
            field_patterns = field_buckets.len(),
            "Built rule index"
        );

        Ok(Self {
            rules: rules.into(),
            compiled,
            buckets,
            field_buckets,
            actions_by_subject,
            any_action: options.any_action.clone(),
            any_subject_type: options.any_subject_type.clone(),
        })
    }

    /// Find the rule that decides a query
    ///
    /// `instance` is the subject being checked, or `None` for a query against
    /// a subject type. For type-level queries a conditional rule counts as a
    /// match when it is a grant (some instance may satisfy it) and is skipped
    /// when it is a prohibition.
    pub fn lookup(
        &self,
        action: &str,
        subject_type: &str,
        instance: Option<&dyn AttributeSource>,
        field: Option<&str>,
    ) -> Option<&Rule> {
        self.candidates(action, subject_type)
            .iter()
            .rev()
            .copied()
            .find(|&position| {
                self.field_applies(position, field) && self.conditions_apply(position, instance)
            })
            .map(|position| &self.rules[position])
    }

    /// Rules that could decide a query, highest precedence first
    ///
    /// Conditions are not evaluated.
    pub fn rules_for(&self, action: &str, subject_type: &str, field: Option<&str>) -> Vec<&Rule> {
        self.candidates(action, subject_type)
            .iter()
            .rev()
            .copied()
            .filter(|&position| self.field_applies(position, field))
            .map(|position| &self.rules[position])
            .collect()
    }

    /// Actions declared for a subject type, including any-subject rules
    ///
    /// Actions are alias-expanded and listed in declaration order.
    pub fn actions_for(&self, subject_type: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut actions = Vec::new();

        for key in [subject_type, self.any_subject_type.as_str()] {
            if let Some(declared) = self.actions_by_subject.get(key) {
                for action in declared {
                    if seen.insert(action.as_str()) {
                        actions.push(action.clone());
                    }
                }
            }
        }

        actions
    }

    /// Rules declaring exactly `pattern` among their field patterns
    pub fn rules_with_field_pattern(&self, pattern: &str) -> Vec<&Rule> {
        self.field_buckets
            .get(pattern)
            .map(|positions| positions.iter().map(|&p| &self.rules[p]).collect())
            .unwrap_or_default()
    }

    /// Alias-expanded actions of the rule at `position`
    pub fn expanded_actions(&self, position: usize) -> Option<&[String]> {
        self.compiled.get(position).map(|c| c.actions.as_slice())
    }

    /// All rules in declaration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Shared handle to the rule list
    pub fn shared_rules(&self) -> Arc<[Rule]> {
        Arc::clone(&self.rules)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn any_action(&self) -> &str {
        &self.any_action
    }

    pub fn any_subject_type(&self) -> &str {
        &self.any_subject_type
    }

    /// Merged candidate positions, ascending
    fn candidates(&self, action: &str, subject_type: &str) -> Cow<'_, [usize]> {
        let mut keys = Vec::with_capacity(4);
        for a in [action, self.any_action.as_str()] {
            for t in [subject_type, self.any_subject_type.as_str()] {
                let key = bucket_key(a, t);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let mut found: Vec<&[usize]> = keys
            .iter()
            .filter_map(|key| self.buckets.get(key))
            .map(Vec::as_slice)
            .collect();

        match found.len() {
            0 => Cow::Borrowed(&[]),
            1 => Cow::Borrowed(found.remove(0)),
            _ => {
                let mut merged: Vec<usize> = found.concat();
                merged.sort_unstable();
                merged.dedup();
                Cow::Owned(merged)
            }
        }
    }

    fn field_applies(&self, position: usize, field: Option<&str>) -> bool {
        match (&self.compiled[position].fields, field) {
            (None, _) => true,
            (Some(matcher), Some(field)) => matcher.matches(field),
            (Some(_), None) => !self.rules[position].is_inverted(),
        }
    }

    fn conditions_apply(&self, position: usize, instance: Option<&dyn AttributeSource>) -> bool {
        match (&self.compiled[position].conditions, instance) {
            (None, _) => true,
            (Some(conditions), Some(instance)) => conditions.matches(instance),
            (Some(_), None) => !self.rules[position].is_inverted(),
        }
    }
}

impl Default for RuleIndex {
    fn default() -> Self {
        Self {
            rules: Arc::from(Vec::<Rule>::new()),
            compiled: Vec::new(),
            buckets: HashMap::new(),
            field_buckets: HashMap::new(),
            actions_by_subject: HashMap::new(),
            any_action: ANY_ACTION.to_string(),
            any_subject_type: ANY_SUBJECT_TYPE.to_string(),
        }
    }
}

fn bucket_key(action: &str, subject_type: &str) -> String {
    let mut key = String::with_capacity(action.len() + subject_type.len() + 1);
    key.push_str(action);
    key.push(':');
    key.push_str(subject_type);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasMap;
    use crate::types::Record;
    use serde_json::json;

    fn build(rules: Vec<Rule>) -> RuleIndex {
        RuleIndex::build(rules, &IndexOptions::default()).unwrap()
    }

    fn reason(rule: Option<&Rule>) -> Option<&str> {
        rule.and_then(Rule::reason)
    }

    // ========================================
    // Precedence
    // ========================================

    #[test]
    fn test_last_match_wins() {
        let index = build(vec![
            Rule::can("read", "Post").because("first").build().unwrap(),
            Rule::cannot("read", "Post").because("second").build().unwrap(),
        ]);

        assert_eq!(reason(index.lookup("read", "Post", None, None)), Some("second"));
        assert!(index.lookup("update", "Post", None, None).is_none());
        assert!(index.lookup("read", "Comment", None, None).is_none());
    }

    #[test]
    fn test_reserved_names_merge_in_declaration_order() {
        let index = build(vec![
            Rule::can("read", "Post").because("specific").build().unwrap(),
            Rule::can("manage", "all").because("admin").build().unwrap(),
            Rule::cannot("delete", "all").because("no-delete").build().unwrap(),
        ]);

        assert_eq!(reason(index.lookup("read", "Post", None, None)), Some("admin"));
        assert_eq!(reason(index.lookup("delete", "Post", None, None)), Some("no-delete"));
        assert_eq!(reason(index.lookup("anything", "Comment", None, None)), Some("admin"));
    }

    #[test]
    fn test_rule_in_several_probed_buckets() {
        let index = build(vec![
            Rule::can(["read", "manage"], "all").because("wide").build().unwrap(),
        ]);

        assert_eq!(index.rules_for("read", "Post", None).len(), 1);
    }

    // ========================================
    // Fields
    // ========================================

    #[test]
    fn test_field_restricted_rules() {
        let index = build(vec![
            Rule::can("read", "Post").because("all").build().unwrap(),
            Rule::cannot("read", "Post")
                .with_fields(["secret.*"])
                .because("hidden")
                .build()
                .unwrap(),
        ]);

        assert_eq!(reason(index.lookup("read", "Post", None, Some("secret.key"))), Some("hidden"));
        assert_eq!(reason(index.lookup("read", "Post", None, Some("title"))), Some("all"));
        assert_eq!(reason(index.lookup("read", "Post", None, None)), Some("all"));
    }

    #[test]
    fn test_field_grant_matches_resource_query() {
        let index = build(vec![
            Rule::can("update", "Post").with_fields(["title"]).build().unwrap(),
        ]);

        assert!(index.lookup("update", "Post", None, None).is_some());
        assert!(index.lookup("update", "Post", None, Some("title")).is_some());
        assert!(index.lookup("update", "Post", None, Some("body")).is_none());
    }

    #[test]
    fn test_field_buckets() {
        let index = build(vec![
            Rule::can("read", "Post").with_fields(["title", "body"]).build().unwrap(),
            Rule::can("update", "Post").with_fields(["title"]).build().unwrap(),
            Rule::can("read", "Comment").build().unwrap(),
        ]);

        assert_eq!(index.rules_with_field_pattern("title").len(), 2);
        assert_eq!(index.rules_with_field_pattern("body").len(), 1);
        assert!(index.rules_with_field_pattern("author").is_empty());
    }

    // ========================================
    // Conditions
    // ========================================

    #[test]
    fn test_conditions_against_instance() {
        let index = build(vec![
            Rule::can("update", "Post")
                .with_conditions(json!({"authorId": 1}))
                .build()
                .unwrap(),
        ]);

        let own = Record::new("Post").with_attribute("authorId", 1);
        let other = Record::new("Post").with_attribute("authorId", 2);

        assert!(index.lookup("update", "Post", Some(&own), None).is_some());
        assert!(index.lookup("update", "Post", Some(&other), None).is_none());
    }

    #[test]
    fn test_conditions_at_type_level() {
        let index = build(vec![
            Rule::can("read", "Post").because("base").build().unwrap(),
            Rule::cannot("read", "Post")
                .with_conditions(json!({"private": true}))
                .build()
                .unwrap(),
            Rule::can("update", "Post")
                .with_conditions(json!({"authorId": 1}))
                .because("own")
                .build()
                .unwrap(),
        ]);

        assert_eq!(reason(index.lookup("read", "Post", None, None)), Some("base"));
        assert_eq!(reason(index.lookup("update", "Post", None, None)), Some("own"));
    }

    #[test]
    fn test_empty_conditions_are_unconditional() {
        let index = build(vec![
            Rule::can("read", "Post").build().unwrap(),
            Rule::cannot("read", "Post").with_conditions(json!({})).build().unwrap(),
        ]);

        let post = Record::new("Post");
        assert!(index.lookup("read", "Post", Some(&post), None).unwrap().is_inverted());
        assert!(index.lookup("read", "Post", None, None).unwrap().is_inverted());
    }

    // ========================================
    // Aliases and introspection
    // ========================================

    #[test]
    fn test_alias_expanded_buckets() {
        let aliases: AliasMap = HashMap::from([(
            "modify".to_string(),
            vec!["update".to_string(), "delete".to_string()],
        )]);
        let options = IndexOptions {
            resolver: AliasResolver::new(aliases, ANY_ACTION).unwrap(),
            ..IndexOptions::default()
        };
        let index = RuleIndex::build(vec![Rule::can("modify", "Post").build().unwrap()], &options).unwrap();

        assert!(index.lookup("modify", "Post", None, None).is_some());
        assert!(index.lookup("update", "Post", None, None).is_some());
        assert!(index.lookup("delete", "Post", None, None).is_some());
        assert!(index.lookup("read", "Post", None, None).is_none());
        assert_eq!(
            index.expanded_actions(0),
            Some(&["modify".to_string(), "update".to_string(), "delete".to_string()][..])
        );
    }

    #[test]
    fn test_rules_for_order() {
        let index = build(vec![
            Rule::can("read", "Post").because("a").build().unwrap(),
            Rule::can("read", "all").because("b").build().unwrap(),
            Rule::cannot("read", "Post").with_fields(["x"]).because("c").build().unwrap(),
        ]);

        let reasons: Vec<_> = index
            .rules_for("read", "Post", None)
            .into_iter()
            .filter_map(Rule::reason)
            .collect();
        assert_eq!(reasons, vec!["b", "a"]);

        let reasons: Vec<_> = index
            .rules_for("read", "Post", Some("x"))
            .into_iter()
            .filter_map(Rule::reason)
            .collect();
        assert_eq!(reasons, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_actions_for() {
        let index = build(vec![
            Rule::can(["read", "update"], "Post").build().unwrap(),
            Rule::can("read", "Comment").build().unwrap(),
            Rule::can("export", "all").build().unwrap(),
            Rule::cannot("update", "Post").build().unwrap(),
        ]);

        assert_eq!(index.actions_for("Post"), vec!["read", "update", "export"]);
        assert_eq!(index.actions_for("Comment"), vec!["read", "export"]);
        assert_eq!(index.actions_for("User"), vec!["export"]);
    }

    #[test]
    fn test_empty_index() {
        let index = RuleIndex::default();
        assert!(index.is_empty());
        assert!(index.lookup("read", "Post", None, None).is_none());
        assert!(index.actions_for("Post").is_empty());
    }

    #[test]
    fn test_pattern_cache_reuse() {
        let options = IndexOptions::default();
        let rules = || vec![Rule::can("read", "Post").with_fields(["author.*"]).build().unwrap()];

        RuleIndex::build(rules(), &options).unwrap();
        RuleIndex::build(rules(), &options).unwrap();

        let stats = options.pattern_cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }
}
