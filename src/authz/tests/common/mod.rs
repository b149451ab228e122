//! Shared helpers for the integration tests

#![allow(dead_code)]

use abac_authz::{PermissionEngine, Record, Rule};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn post(author_id: i64) -> Record {
    Record::new("Post")
        .with_attribute("authorId", author_id)
        .with_attribute("published", true)
}

pub fn engine(rules: Vec<Rule>) -> PermissionEngine {
    init_tracing();
    PermissionEngine::with_rules(rules).unwrap()
}
