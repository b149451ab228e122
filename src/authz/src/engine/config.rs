//! Engine configuration and denial messages

use std::fmt;
use std::sync::Arc;

use crate::alias::{AliasMap, AliasResolver};
use crate::error::{AuthzError, Result};
use crate::index::{ANY_ACTION, ANY_SUBJECT_TYPE};
use crate::rule::Rule;
use crate::types::{DeclaredType, SubjectTypeDetector};

/// Context handed to a [`MessageFormatter`] for a denied query
#[derive(Debug, Clone, Copy)]
pub struct Denial<'a> {
    pub action: &'a str,
    pub subject_type: Option<&'a str>,
    pub field: Option<&'a str>,
    /// The prohibition that decided the query, if one did
    pub rule: Option<&'a Rule>,
}

/// Produces the text of a denial
pub trait MessageFormatter: Send + Sync {
    fn format(&self, denial: &Denial<'_>) -> String;
}

impl<F> MessageFormatter for F
where
    F: Fn(&Denial<'_>) -> String + Send + Sync,
{
    fn format(&self, denial: &Denial<'_>) -> String {
        self(denial)
    }
}

/// Uses the deciding rule's reason, or `Cannot execute "<action>" on "<subject>"`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessageFormatter;

impl MessageFormatter for DefaultMessageFormatter {
    fn format(&self, denial: &Denial<'_>) -> String {
        if let Some(reason) = denial.rule.and_then(Rule::reason) {
            return reason.to_string();
        }

        let subject = denial.subject_type.unwrap_or("null");
        match denial.field {
            Some(field) => format!(
                "Cannot execute \"{}\" on field \"{}\" of \"{}\"",
                denial.action, field, subject
            ),
            None => format!("Cannot execute \"{}\" on \"{}\"", denial.action, subject),
        }
    }
}

/// Permission engine configuration
#[derive(Clone)]
pub struct EngineConfig {
    /// Reserved action matching every action
    pub any_action: String,

    /// Reserved subject type matching every subject type
    pub any_subject_type: String,

    /// Action aliases, expanded when rules are indexed
    pub aliases: AliasMap,

    /// Accept the alias map without cycle or reserved-name checks
    ///
    /// Expansion deduplicates, so it terminates even on a cyclic map, which
    /// an unbounded worklist would not. A cyclic map still makes every member
    /// imply every other and an alias targeting the any-action grants
    /// everything. Only set this for alias maps that were validated elsewhere.
    pub skip_alias_validation: bool,

    /// Names the type of subject instances
    pub type_detector: Arc<dyn SubjectTypeDetector>,

    /// Builds denial messages for `explain` and `authorize`
    pub message_formatter: Arc<dyn MessageFormatter>,

    /// Enable decision counters
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            any_action: ANY_ACTION.to_string(),
            any_subject_type: ANY_SUBJECT_TYPE.to_string(),
            aliases: AliasMap::new(),
            skip_alias_validation: false,
            type_detector: Arc::new(DeclaredType),
            message_formatter: Arc::new(DefaultMessageFormatter),
            enable_metrics: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_any_action(mut self, action: impl Into<String>) -> Self {
        self.any_action = action.into();
        self
    }

    pub fn with_any_subject_type(mut self, subject_type: impl Into<String>) -> Self {
        self.any_subject_type = subject_type.into();
        self
    }

    /// Add one alias
    pub fn with_alias<I, S>(mut self, alias: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases
            .insert(alias.into(), targets.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the alias map
    pub fn with_aliases(mut self, aliases: AliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    /// See [`EngineConfig::skip_alias_validation`]
    pub fn skip_alias_validation(mut self) -> Self {
        self.skip_alias_validation = true;
        self
    }

    pub fn with_type_detector(mut self, detector: impl SubjectTypeDetector + 'static) -> Self {
        self.type_detector = Arc::new(detector);
        self
    }

    pub fn with_message_formatter(mut self, formatter: impl MessageFormatter + 'static) -> Self {
        self.message_formatter = Arc::new(formatter);
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Check reserved names and build the alias resolver
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for blank reserved names, `Alias` when the
    /// alias map is rejected.
    pub fn alias_resolver(&self) -> Result<AliasResolver> {
        if self.any_action.trim().is_empty() {
            return Err(AuthzError::InvalidConfig("any_action cannot be blank".to_string()));
        }
        if self.any_subject_type.trim().is_empty() {
            return Err(AuthzError::InvalidConfig(
                "any_subject_type cannot be blank".to_string(),
            ));
        }

        if self.aliases.is_empty() {
            Ok(AliasResolver::identity())
        } else if self.skip_alias_validation {
            Ok(AliasResolver::unchecked(self.aliases.clone()))
        } else {
            Ok(AliasResolver::new(self.aliases.clone(), &self.any_action)?)
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("any_action", &self.any_action)
            .field("any_subject_type", &self.any_subject_type)
            .field("aliases", &self.aliases)
            .field("skip_alias_validation", &self.skip_alias_validation)
            .field("enable_metrics", &self.enable_metrics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasError;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.any_action, "manage");
        assert_eq!(config.any_subject_type, "all");
        assert!(config.enable_metrics);
        assert!(config.alias_resolver().unwrap().is_empty());
    }

    #[test]
    fn test_alias_validation_on_resolver() {
        let cyclic = EngineConfig::new()
            .with_alias("a", ["b"])
            .with_alias("b", ["a"]);
        assert!(matches!(
            cyclic.alias_resolver(),
            Err(AuthzError::Alias(AliasError::CycleDetected { .. }))
        ));

        let unchecked = cyclic.skip_alias_validation();
        let resolver = unchecked.alias_resolver().unwrap();
        assert!(!resolver.is_validated());
        assert_eq!(resolver.expand_one("a"), vec!["a", "b"]);
    }

    #[test]
    fn test_custom_reserved_names() {
        let config = EngineConfig::new()
            .with_any_action("*")
            .with_alias("edit", ["*"]);
        assert!(matches!(
            config.alias_resolver(),
            Err(AuthzError::Alias(AliasError::ReservedActionConflict { .. }))
        ));

        let blank = EngineConfig::new().with_any_subject_type(" ");
        assert!(matches!(blank.alias_resolver(), Err(AuthzError::InvalidConfig(_))));
    }

    #[test]
    fn test_default_messages() {
        let formatter = DefaultMessageFormatter;
        let denial = Denial {
            action: "delete",
            subject_type: Some("Post"),
            field: None,
            rule: None,
        };
        assert_eq!(formatter.format(&denial), "Cannot execute \"delete\" on \"Post\"");

        let on_field = Denial { field: Some("title"), ..denial };
        assert_eq!(
            formatter.format(&on_field),
            "Cannot execute \"delete\" on field \"title\" of \"Post\""
        );

        let rule = Rule::cannot("delete", "Post").because("Archived").build().unwrap();
        let with_reason = Denial { rule: Some(&rule), ..denial };
        assert_eq!(formatter.format(&with_reason), "Archived");
    }

    #[test]
    fn test_closure_formatter() {
        let config = EngineConfig::new()
            .with_message_formatter(|d: &Denial<'_>| format!("no {}", d.action));
        let denial = Denial {
            action: "read",
            subject_type: None,
            field: None,
            rule: None,
        };
        assert_eq!(config.message_formatter.format(&denial), "no read");
    }
}
