//! Field wildcard semantics

mod common;

use abac_authz::field::PatternCache;
use abac_authz::{FieldMatcher, Rule};
use common::{engine, post};

fn matches(pattern: &str, field: &str) -> bool {
    FieldMatcher::compile(&[pattern]).unwrap().matches(field)
}

#[test]
fn test_single_level_wildcard() {
    assert!(matches("author.*", "author"));
    assert!(matches("author.*", "author.*"));
    assert!(matches("author.*", "author.name"));
    assert!(!matches("author.*", "author.pub.name"));
}

#[test]
fn test_multi_level_wildcard() {
    for field in ["author", "author.*", "author.name", "author.pub.name"] {
        assert!(matches("author.**", field), "author.** should match {}", field);
    }
    assert!(!matches("author.**", "authors.name"));
}

#[test]
fn test_prefix_wildcard() {
    assert!(matches("street*", "street"));
    assert!(matches("street*", "street1"));
    assert!(matches("street*", "streetCode"));
    assert!(!matches("street*", "state"));
}

#[test]
fn test_leading_and_inner_wildcards() {
    assert!(matches("*.name", "author.name"));
    assert!(!matches("*.name", "author.pub.name"));
    assert!(matches("**.name", "author.pub.name"));
    assert!(!matches("**.name", "name"));

    assert!(matches("a.*.b", "a.x.b"));
    assert!(!matches("a.*.b", "a.x.y.b"));
    assert!(matches("a.**.b", "a.x.y.b"));
    assert!(!matches("a.**.b", "a.b"));
}

#[test]
fn test_literal_metacharacters() {
    assert!(matches("price+tax", "price+tax"));
    assert!(!matches("price+tax", "priceetax"));
    assert!(matches("meta(v1).*", "meta(v1).x"));
}

#[test]
fn test_any_pattern_in_set_matches() {
    let matcher = FieldMatcher::compile(&["title", "author.*", "stats.**"]).unwrap();

    assert!(matcher.matches("title"));
    assert!(matcher.matches("author.id"));
    assert!(matcher.matches("stats.views.daily"));
    assert!(!matcher.matches("body"));
}

#[test]
fn test_rules_share_compiled_patterns() {
    let cache = PatternCache::new();
    let set = vec!["author.*".to_string()];

    let a = cache.get_or_compile(&set).unwrap();
    let b = cache.get_or_compile(&set).unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));

    let engine = engine(vec![
        Rule::can("read", "Post").with_fields(["author.*"]).build().unwrap(),
        Rule::can("update", "Post").with_fields(["author.*"]).build().unwrap(),
    ]);
    let stats = engine.pattern_cache_stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);

    assert!(engine.may("update", &post(1), Some("author.name")));
}

#[test]
fn test_cache_pruned_on_replace() {
    let engine = engine(vec![Rule::can("read", "Post").with_fields(["title"]).build().unwrap()]);
    assert_eq!(engine.pattern_cache_stats().entries, 1);

    engine
        .replace_rules(vec![Rule::can("read", "Post").with_fields(["body.*"]).build().unwrap()])
        .unwrap();
    assert_eq!(engine.pattern_cache_stats().entries, 1);
    assert!(engine.may("read", &post(1), Some("body.html")));
    assert!(engine.may_not("read", &post(1), Some("title")));
}
