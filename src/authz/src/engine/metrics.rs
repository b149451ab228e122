//! Decision counters for engine observability
//!
//! Counters are plain atomics so recording never blocks a permission check.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use super::decision::DecisionReason;

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineMetrics {
    /// Total number of permission checks
    pub total_checks: u64,

    /// Number of allowed decisions
    pub allowed_decisions: u64,

    /// Number of denied decisions (all causes)
    pub denied_decisions: u64,

    /// Denials where a prohibition matched
    pub prohibited_decisions: u64,

    /// Denials where no rule matched
    pub no_match_decisions: u64,

    /// Denials for a null subject
    pub null_subject_decisions: u64,

    /// Installed rule sets after the initial one
    pub rule_swaps: u64,
}

impl EngineMetrics {
    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }

    /// Share of denials caused by no matching rule
    pub fn default_deny_rate(&self) -> f64 {
        if self.denied_decisions == 0 {
            0.0
        } else {
            self.no_match_decisions as f64 / self.denied_decisions as f64
        }
    }
}

/// Lock-free metrics collector
#[derive(Debug, Default)]
pub struct MetricsCollector {
    total_checks: AtomicU64,
    allowed: AtomicU64,
    prohibited: AtomicU64,
    no_match: AtomicU64,
    null_subject: AtomicU64,
    rule_swaps: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a permission decision
    pub fn record_decision(&self, reason: DecisionReason) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);

        let counter = match reason {
            DecisionReason::Allowed => &self.allowed,
            DecisionReason::Prohibited => &self.prohibited,
            DecisionReason::NoMatchingRule => &self.no_match,
            DecisionReason::NullSubject => &self.null_subject,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an installed rule set
    pub fn record_swap(&self) {
        self.rule_swaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values
    ///
    /// Each counter is read independently; under concurrent checks the
    /// totals may differ by in-flight decisions.
    pub fn snapshot(&self) -> EngineMetrics {
        let allowed = self.allowed.load(Ordering::Relaxed);
        let prohibited = self.prohibited.load(Ordering::Relaxed);
        let no_match = self.no_match.load(Ordering::Relaxed);
        let null_subject = self.null_subject.load(Ordering::Relaxed);

        EngineMetrics {
            total_checks: self.total_checks.load(Ordering::Relaxed),
            allowed_decisions: allowed,
            denied_decisions: prohibited + no_match + null_subject,
            prohibited_decisions: prohibited,
            no_match_decisions: no_match,
            null_subject_decisions: null_subject,
            rule_swaps: self.rule_swaps.load(Ordering::Relaxed),
        }
    }

    /// Reset every counter to zero
    pub fn reset(&self) {
        for counter in [
            &self.total_checks,
            &self.allowed,
            &self.prohibited,
            &self.no_match,
            &self.null_subject,
            &self.rule_swaps,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
