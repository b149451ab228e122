//! Permission engine
//!
//! Holds the current rule snapshot and answers permission queries against it.
//!
//! # Architecture
//!
//! ```text
//! replace_rules ─▶ RuleIndex::build ─▶ before hooks ─▶ store ─▶ after hooks
//!   (writer guard held throughout)                      │
//!                                                        ▼
//!                               ArcSwap<Snapshot> ◀── load ── may / explain
//! ```
//!
//! Readers take one atomic load per query and never block. Writers are
//! serialized by a mutex that guards construction only; a query that loaded
//! generation N finishes against generation N even if N+1 is installed
//! meanwhile.

pub mod config;
pub mod decision;
pub mod hooks;
pub mod metrics;

pub use config::{DefaultMessageFormatter, Denial, EngineConfig, MessageFormatter};
pub use decision::{Decision, DecisionReason};
pub use hooks::{HookError, HookId, UpdateEvent, UpdatePhase};
pub use metrics::{EngineMetrics, MetricsCollector};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::error::{AuthzError, Result};
use crate::field::{CacheStats, PatternCache};
use crate::index::{IndexOptions, RuleIndex};
use crate::rule::{rules_from_json, Rule, RuleDefinition};
use crate::types::Subject;
use hooks::HookRegistry;

/// One installed rule set
#[derive(Debug)]
pub struct Snapshot {
    index: RuleIndex,
    generation: u64,
    installed_at: DateTime<Utc>,
}

impl Snapshot {
    fn new(index: RuleIndex, generation: u64) -> Self {
        Self {
            index,
            generation,
            installed_at: Utc::now(),
        }
    }

    /// Index over this snapshot's rules
    pub fn index(&self) -> &RuleIndex {
        &self.index
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[Rule] {
        self.index.rules()
    }

    /// Starts at 0 and increases by one per `replace_rules`
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn installed_at(&self) -> DateTime<Utc> {
        self.installed_at
    }
}

/// Permission engine with lock-free checks and atomic rule replacement
pub struct PermissionEngine {
    current: ArcSwap<Snapshot>,

    /// Serializes writers; never taken by readers
    write_guard: Mutex<()>,

    /// Alias resolver, reserved names and pattern cache for rebuilds
    options: IndexOptions,

    config: EngineConfig,

    hooks: HookRegistry,

    metrics: Option<MetricsCollector>,
}

impl PermissionEngine {
    /// Create an engine over `rules`
    ///
    /// # Errors
    ///
    /// Fails if the configuration or alias map is rejected, or a field
    /// pattern cannot be compiled.
    pub fn new(rules: Vec<Rule>, config: EngineConfig) -> Result<Self> {
        let options = IndexOptions {
            resolver: config.alias_resolver()?,
            any_action: config.any_action.clone(),
            any_subject_type: config.any_subject_type.clone(),
            pattern_cache: Arc::new(PatternCache::new()),
        };
        let index = RuleIndex::build(rules, &options)?;

        info!(
            rules = index.len(),
            aliases = options.resolver.aliases().len(),
            metrics = config.enable_metrics,
            "PermissionEngine initialized"
        );

        Ok(Self::assemble(index, options, config))
    }

    /// Create an engine with the default configuration
    pub fn with_rules(rules: Vec<Rule>) -> Result<Self> {
        Self::new(rules, EngineConfig::default())
    }

    /// Create an engine from exchange-format definitions
    pub fn from_definitions(definitions: Vec<RuleDefinition>, config: EngineConfig) -> Result<Self> {
        let rules = definitions
            .into_iter()
            .map(RuleDefinition::into_rule)
            .collect::<Result<Vec<_>>>()?;
        Self::new(rules, config)
    }

    /// Create an engine from a JSON array of rule definitions
    pub fn from_json(json: &str, config: EngineConfig) -> Result<Self> {
        Self::new(rules_from_json(json)?, config)
    }

    fn assemble(index: RuleIndex, options: IndexOptions, config: EngineConfig) -> Self {
        let metrics = config.enable_metrics.then(MetricsCollector::new);

        Self {
            current: ArcSwap::from_pointee(Snapshot::new(index, 0)),
            write_guard: Mutex::new(()),
            options,
            config,
            hooks: HookRegistry::default(),
            metrics,
        }
    }

    // ========================================
    // Checks
    // ========================================

    /// Whether `action` is allowed on `subject`, optionally on one `field`
    ///
    /// Allowed iff the last matching rule is a grant. A null subject is
    /// always denied.
    pub fn may<'s>(&self, action: &str, subject: impl Into<Subject<'s>>, field: Option<&str>) -> bool {
        let snapshot = self.current.load();
        let (reason, _) = self.decide(&snapshot.index, action, subject.into(), field);
        self.record(reason);

        trace!(action, field, ?reason, generation = snapshot.generation, "Permission check");
        reason.is_allowed()
    }

    /// Negation of [`may`](Self::may)
    pub fn may_not<'s>(&self, action: &str, subject: impl Into<Subject<'s>>, field: Option<&str>) -> bool {
        !self.may(action, subject, field)
    }

    /// The rule deciding a query, whether grant or prohibition
    pub fn relevant_rule_for<'s>(
        &self,
        action: &str,
        subject: impl Into<Subject<'s>>,
        field: Option<&str>,
    ) -> Option<Rule> {
        let snapshot = self.current.load();
        let (_, rule) = self.decide(&snapshot.index, action, subject.into(), field);
        rule.cloned()
    }

    /// Decide a query and explain the outcome
    pub fn explain<'s>(&self, action: &str, subject: impl Into<Subject<'s>>, field: Option<&str>) -> Decision {
        let subject = subject.into();
        let snapshot = self.current.load();
        let (reason, rule) = self.decide(&snapshot.index, action, subject, field);
        self.record(reason);

        let subject_type = self.subject_type(subject);
        let decision = Decision::new(
            reason,
            rule,
            action,
            subject_type.map(Cow::into_owned),
            field,
            snapshot.generation,
        );

        if decision.allowed {
            return decision;
        }

        let message = self.config.message_formatter.format(&Denial {
            action,
            subject_type: decision.subject_type.as_deref(),
            field,
            rule,
        });
        decision.with_message(message)
    }

    /// Like [`may`](Self::may), but a denial is an error
    ///
    /// # Errors
    ///
    /// `Forbidden` carrying the formatted denial message.
    pub fn authorize<'s>(&self, action: &str, subject: impl Into<Subject<'s>>, field: Option<&str>) -> Result<()> {
        let decision = self.explain(action, subject, field);
        if decision.allowed {
            return Ok(());
        }

        Err(AuthzError::Forbidden {
            action: decision.action,
            subject_type: decision.subject_type,
            field: decision.field,
            message: decision.message.unwrap_or_default(),
        })
    }

    // ========================================
    // Introspection
    // ========================================

    /// Rules that could decide a query, highest precedence first
    ///
    /// Conditions are not evaluated.
    pub fn rules_for(&self, action: &str, subject_type: &str, field: Option<&str>) -> Vec<Rule> {
        self.current
            .load()
            .index
            .rules_for(action, subject_type, field)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Actions any rule declares for `subject_type`
    pub fn actions_for(&self, subject_type: &str) -> Vec<String> {
        self.current.load().index.actions_for(subject_type)
    }

    /// Current rules in declaration order
    pub fn rules(&self) -> Arc<[Rule]> {
        self.current.load().index.shared_rules()
    }

    /// The current snapshot, for several queries against one consistent view
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Field matcher cache statistics
    pub fn pattern_cache_stats(&self) -> CacheStats {
        self.options.pattern_cache.stats()
    }

    // ========================================
    // Updates
    // ========================================

    /// Build an index over `rules` and install it atomically
    ///
    /// Before-hooks run after the new index is built and before it becomes
    /// visible; after-hooks run once it is installed. On error the current
    /// rules stay in place and no hook runs.
    ///
    /// Hooks must not call `replace_rules` on the same engine: the writer
    /// guard is not reentrant and the call would deadlock.
    pub fn replace_rules(&self, rules: Vec<Rule>) -> Result<()> {
        let _guard = self.write_guard.lock();

        let generation = self.current.load().generation + 1;
        let next = Arc::new(Snapshot::new(RuleIndex::build(rules, &self.options)?, generation));

        self.hooks.run(&UpdateEvent {
            phase: UpdatePhase::Before,
            rules: next.rules(),
            engine: self,
        });

        self.current.store(Arc::clone(&next));
        if let Some(metrics) = &self.metrics {
            metrics.record_swap();
        }
        info!(generation, rules = next.index.len(), "Installed rule snapshot");

        self.options
            .pattern_cache
            .retain_patterns(next.rules().iter().filter_map(Rule::fields));
        debug!(cache = ?self.options.pattern_cache.stats(), "Pruned field matcher cache");

        self.hooks.run(&UpdateEvent {
            phase: UpdatePhase::After,
            rules: next.rules(),
            engine: self,
        });

        Ok(())
    }

    /// Validate definitions and install them
    pub fn replace_definitions(&self, definitions: Vec<RuleDefinition>) -> Result<()> {
        let rules = definitions
            .into_iter()
            .map(RuleDefinition::into_rule)
            .collect::<Result<Vec<_>>>()?;
        self.replace_rules(rules)
    }

    /// Register a hook for one phase of every rule update
    pub fn on_update<F>(&self, phase: UpdatePhase, hook: F) -> HookId
    where
        F: Fn(&UpdateEvent<'_>) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.register(phase, Arc::new(hook))
    }

    /// Unregister a hook; `false` if it was not registered
    pub fn remove_hook(&self, id: HookId) -> bool {
        self.hooks.remove(id)
    }

    // ========================================
    // Metrics
    // ========================================

    /// Counter snapshot, if metrics are enabled
    pub fn metrics(&self) -> Option<EngineMetrics> {
        self.metrics.as_ref().map(MetricsCollector::snapshot)
    }

    pub fn reset_metrics(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.reset();
        }
    }

    // Private helper methods

    fn decide<'i>(
        &self,
        index: &'i RuleIndex,
        action: &str,
        subject: Subject<'_>,
        field: Option<&str>,
    ) -> (DecisionReason, Option<&'i Rule>) {
        if subject.is_null() {
            return (DecisionReason::NullSubject, None);
        }

        // An undetectable type can still match rules on the any-subject type
        let detected = self.subject_type(subject);
        let subject_type = detected.as_deref().unwrap_or(index.any_subject_type());

        match index.lookup(action, subject_type, subject.instance(), field) {
            Some(rule) if rule.is_inverted() => (DecisionReason::Prohibited, Some(rule)),
            Some(rule) => (DecisionReason::Allowed, Some(rule)),
            None => (DecisionReason::NoMatchingRule, None),
        }
    }

    fn subject_type<'s>(&self, subject: Subject<'s>) -> Option<Cow<'s, str>> {
        match subject {
            Subject::Type(name) => Some(Cow::Borrowed(name)),
            Subject::Instance(source) => self.config.type_detector.detect(source).map(Cow::Owned),
            Subject::Null => None,
        }
    }

    fn record(&self, reason: DecisionReason) {
        if let Some(metrics) = &self.metrics {
            metrics.record_decision(reason);
        }
    }
}

impl Default for PermissionEngine {
    fn default() -> Self {
        Self::assemble(RuleIndex::default(), IndexOptions::default(), EngineConfig::default())
    }
}

impl fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.current.load();
        f.debug_struct("PermissionEngine")
            .field("generation", &snapshot.generation)
            .field("rules", &snapshot.index.len())
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
