//! Core subject types
//!
//! The engine never inspects host values directly. Anything that can be
//! checked for access implements [`AttributeSource`], and queries name their
//! target through [`Subject`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Named-attribute access to a subject instance
///
/// Implementations must be deterministic: repeated calls on the same value
/// return equal results.
pub trait AttributeSource {
    /// Declared type name of the subject, if it knows one
    fn subject_type(&self) -> Option<Cow<'_, str>>;

    /// Look up a single top-level attribute
    fn attribute(&self, name: &str) -> Option<Cow<'_, Value>>;

    /// All attributes as a map
    ///
    /// Used when a condition compares a whole mapping against this source.
    fn attributes(&self) -> Map<String, Value>;
}

impl AttributeSource for Value {
    fn subject_type(&self) -> Option<Cow<'_, str>> {
        None
    }

    fn attribute(&self, name: &str) -> Option<Cow<'_, Value>> {
        match self {
            Value::Object(map) => map.get(name).map(Cow::Borrowed),
            Value::Array(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .map(Cow::Borrowed),
            _ => None,
        }
    }

    fn attributes(&self) -> Map<String, Value> {
        match self {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }
}

impl AttributeSource for Map<String, Value> {
    fn subject_type(&self) -> Option<Cow<'_, str>> {
        None
    }

    fn attribute(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.get(name).map(Cow::Borrowed)
    }

    fn attributes(&self) -> Map<String, Value> {
        self.clone()
    }
}

impl AttributeSource for HashMap<String, Value> {
    fn subject_type(&self) -> Option<Cow<'_, str>> {
        None
    }

    fn attribute(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.get(name).map(Cow::Borrowed)
    }

    fn attributes(&self) -> Map<String, Value> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Subject instance with an explicit type name
///
/// The simplest adapter for hosts that do not want to implement
/// [`AttributeSource`] on their own types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Subject type (e.g., "Post", "Article")
    #[serde(rename = "type")]
    pub type_name: String,

    /// Attribute values
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Record {
    /// Create a new record of the given type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Map::new(),
        }
    }

    /// Add an attribute to the record
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl AttributeSource for Record {
    fn subject_type(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.type_name))
    }

    fn attribute(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.attributes.get(name).map(Cow::Borrowed)
    }

    fn attributes(&self) -> Map<String, Value> {
        self.attributes.clone()
    }
}

/// Target of a permission query
#[derive(Clone, Copy)]
pub enum Subject<'a> {
    /// A subject type given literally (e.g., "Post")
    Type(&'a str),
    /// A subject instance
    Instance(&'a dyn AttributeSource),
    /// No subject; always denied
    Null,
}

impl<'a> Subject<'a> {
    /// Wrap a subject instance
    pub fn of(source: &'a dyn AttributeSource) -> Self {
        Self::Instance(source)
    }

    /// Whether this is the null subject
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The instance, if this subject is one
    pub fn instance(&self) -> Option<&'a dyn AttributeSource> {
        match self {
            Self::Instance(source) => Some(*source),
            _ => None,
        }
    }
}

impl fmt::Debug for Subject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(name) => f.debug_tuple("Type").field(name).finish(),
            Self::Instance(source) => f
                .debug_tuple("Instance")
                .field(&source.subject_type())
                .finish(),
            Self::Null => f.write_str("Null"),
        }
    }
}

impl<'a> From<&'a str> for Subject<'a> {
    fn from(name: &'a str) -> Self {
        Self::Type(name)
    }
}

impl<'a> From<&'a String> for Subject<'a> {
    fn from(name: &'a String) -> Self {
        Self::Type(name.as_str())
    }
}

impl<'a, T: AttributeSource> From<&'a T> for Subject<'a> {
    fn from(source: &'a T) -> Self {
        Self::Instance(source)
    }
}

impl<'a, T: AttributeSource> From<Option<&'a T>> for Subject<'a> {
    fn from(source: Option<&'a T>) -> Self {
        match source {
            Some(source) => Self::Instance(source),
            None => Self::Null,
        }
    }
}

/// Strategy for naming the type of a subject instance
pub trait SubjectTypeDetector: Send + Sync {
    /// Return the subject type, or `None` when it cannot be determined
    fn detect(&self, source: &dyn AttributeSource) -> Option<String>;
}

/// Uses the type the source declares for itself
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredType;

impl SubjectTypeDetector for DeclaredType {
    fn detect(&self, source: &dyn AttributeSource) -> Option<String> {
        source.subject_type().map(Cow::into_owned)
    }
}

/// Reads the type from a string attribute, falling back to the declared type
#[derive(Debug, Clone)]
pub struct FieldType {
    field: String,
}

impl FieldType {
    /// Detect types from the named attribute (e.g., "kind")
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

impl SubjectTypeDetector for FieldType {
    fn detect(&self, source: &dyn AttributeSource) -> Option<String> {
        match source.attribute(&self.field).as_deref() {
            Some(Value::String(name)) => Some(name.clone()),
            _ => source.subject_type().map(Cow::into_owned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_creation() {
        let record = Record::new("Post")
            .with_attribute("authorId", 1)
            .with_attribute("published", true);

        assert_eq!(record.subject_type().as_deref(), Some("Post"));
        assert_eq!(record.attribute("authorId").as_deref(), Some(&json!(1)));
        assert!(record.attribute("missing").is_none());
        assert_eq!(record.attributes().len(), 2);
    }

    #[test]
    fn test_value_source() {
        let value = json!({"title": "hello", "meta": {"draft": false}});

        assert!(value.subject_type().is_none());
        assert_eq!(value.attribute("title").as_deref(), Some(&json!("hello")));
        assert!(json!("scalar").attribute("title").is_none());
        assert!(json!(42).attributes().is_empty());
    }

    #[test]
    fn test_subject_conversions() {
        let record = Record::new("Post");

        assert!(matches!(Subject::from("Post"), Subject::Type("Post")));
        assert!(Subject::from(&record).instance().is_some());
        assert!(Subject::from(None::<&Record>).is_null());
    }

    #[test]
    fn test_field_type_detector() {
        let detector = FieldType::new("kind");

        assert_eq!(detector.detect(&json!({"kind": "Comment"})), Some("Comment".to_string()));
        assert_eq!(detector.detect(&json!({"kind": 7})), None);
        assert_eq!(detector.detect(&Record::new("Post")), Some("Post".to_string()));
        assert_eq!(DeclaredType.detect(&json!({})), None);
    }
}
