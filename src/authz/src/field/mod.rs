//! Field-restricted rules
//!
//! Field patterns are dotted paths with optional wildcards:
//!
//! - `author.*` matches `author` and one child segment (`author.name`)
//! - `author.**` matches `author` and any depth below it
//! - `*.name` / `**.name` match one / one-or-more leading segments
//! - `street*` matches `street`, `street1`, `streetCode`
//!
//! # Examples
//!
//! ```
//! use abac_authz::field::FieldMatcher;
//!
//! let matcher = FieldMatcher::compile(&["author.*"]).unwrap();
//! assert!(matcher.matches("author.name"));
//! assert!(!matcher.matches("author.pub.name"));
//! ```

mod cache;
mod pattern;

pub use cache::{CacheStats, PatternCache};
pub use pattern::FieldMatcher;
