//! Action aliases
//!
//! An alias is an action name that implies one or more other actions, e.g.
//! `modify -> [update, delete]`. Aliases are expanded when rules are indexed,
//! so a rule granting `modify` answers checks for `update` and `delete`.
//!
//! # Validation
//!
//! Alias maps are validated once, when the resolver is built:
//!
//! - **Cycle Detection**: worklist expansion that tracks each action's
//!   ancestor path; `a -> b -> a` is rejected
//! - **Reserved Action**: the any-action name (`manage` by default) can be
//!   neither an alias nor an alias target
//!
//! # Example
//!
//! ```rust
//! use abac_authz::alias::AliasResolver;
//! use std::collections::HashMap;
//!
//! let mut aliases = HashMap::new();
//! aliases.insert("modify".to_string(), vec!["update".to_string(), "delete".to_string()]);
//!
//! let resolver = AliasResolver::new(aliases, "manage").unwrap();
//! assert_eq!(resolver.expand_one("modify"), vec!["modify", "update", "delete"]);
//! ```

mod resolver;

pub use resolver::{AliasError, AliasMap, AliasResolver};
