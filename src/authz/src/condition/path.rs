//! Dot-path attribute resolution

use serde_json::Value;
use std::borrow::Cow;

use crate::types::AttributeSource;

/// Split a condition key into path segments
pub(crate) fn split(key: &str) -> Vec<String> {
    key.split('.').map(str::to_string).collect()
}

/// Resolve a path against a subject
///
/// The first segment is read from the source itself; later segments walk
/// objects by key and arrays by integer index. Any missing step yields
/// `None`.
pub(crate) fn resolve<'a>(
    source: &'a dyn AttributeSource,
    path: &[String],
) -> Option<Cow<'a, Value>> {
    let (first, rest) = path.split_first()?;
    let root = source.attribute(first)?;

    if rest.is_empty() {
        return Some(root);
    }

    match root {
        Cow::Borrowed(value) => walk(value, rest).map(Cow::Borrowed),
        Cow::Owned(value) => walk(&value, rest).cloned().map(Cow::Owned),
    }
}

fn walk<'v>(mut value: &'v Value, segments: &[String]) -> Option<&'v Value> {
    for segment in segments {
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;
    use serde_json::json;

    #[test]
    fn test_nested_objects() {
        let post = Record::new("Post").with_attribute("author", json!({"id": 7, "tags": ["x", "y"]}));

        assert_eq!(resolve(&post, &split("author.id")).as_deref(), Some(&json!(7)));
        assert_eq!(resolve(&post, &split("author.tags.1")).as_deref(), Some(&json!("y")));
        assert!(resolve(&post, &split("author.tags.9")).is_none());
        assert!(resolve(&post, &split("author.tags.first")).is_none());
        assert!(resolve(&post, &split("author.id.deeper")).is_none());
        assert!(resolve(&post, &split("missing.id")).is_none());
    }

    #[test]
    fn test_single_segment() {
        let value = json!({"published": true});
        assert_eq!(resolve(&value, &split("published")).as_deref(), Some(&json!(true)));
        assert!(resolve(&value, &[]).is_none());
    }
}
