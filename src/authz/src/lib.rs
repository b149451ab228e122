//! # ABAC Authorization Engine
//!
//! Attribute-based permission rules with last-match-wins precedence.
//!
//! ## Features
//!
//! - **Declarative rules**: grants and prohibitions over actions and subject
//!   types, with optional attribute conditions and field restrictions
//! - **Query-style conditions** (`$eq`, `$in`, `$gt`, `$regex`, `$elemMatch`, ...)
//!   with dot-path traversal and numeric coercion
//! - **Field patterns** with `*` / `**` wildcards
//! - **Action aliases** validated for cycles and reserved-name misuse
//! - **Lock-free checks** against an atomically swapped rule snapshot
//!
//! ## Example
//!
//! ```rust
//! use abac_authz::{PermissionEngine, Record, Rule};
//! use serde_json::json;
//!
//! # fn main() -> abac_authz::Result<()> {
//! let engine = PermissionEngine::with_rules(vec![
//!     Rule::can("read", "Post").build()?,
//!     Rule::can("update", "Post")
//!         .with_conditions(json!({"authorId": 1}))
//!         .build()?,
//!     Rule::cannot("read", "Post")
//!         .with_fields(["internal.**"])
//!         .build()?,
//! ])?;
//!
//! let post = Record::new("Post").with_attribute("authorId", 1);
//!
//! assert!(engine.may("read", &post, None));
//! assert!(engine.may("update", &post, None));
//! assert!(engine.may_not("read", &post, Some("internal.notes")));
//! assert!(engine.may_not("delete", &post, None));
//! # Ok(())
//! # }
//! ```

pub mod alias;
pub mod condition;
pub mod engine;
pub mod error;
pub mod field;
pub mod index;
pub mod rule;
pub mod types;

// Re-export commonly used types
pub use alias::{AliasError, AliasMap, AliasResolver};
pub use engine::{
    Decision, DecisionReason, EngineConfig, EngineMetrics, HookId, MessageFormatter,
    PermissionEngine, Snapshot, UpdateEvent, UpdatePhase,
};
pub use error::{AuthzError, Result};
pub use field::FieldMatcher;
pub use index::{RuleIndex, ANY_ACTION, ANY_SUBJECT_TYPE};
pub use rule::{rules_from_json, rules_to_json, Rule, RuleBuilder, RuleDefinition};
pub use types::{AttributeSource, DeclaredType, FieldType, Record, Subject, SubjectTypeDetector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
