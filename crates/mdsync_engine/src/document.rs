//! Semi-structured master-data documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding a document's primary identity.
pub const ID_FIELD: &str = "id";

/// Field used as the secondary lookup key.
pub const EMAIL_FIELD: &str = "email";

/// Fallback identifier field used only for log lines.
pub const DOCUMENT_FIELD: &str = "document";

/// An opaque mapping of field name to value.
///
/// Documents are read from the master store and written to each target
/// independently; they are never shared mutably across targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a document from a JSON value, rejecting anything but an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Adds a field, returning the document for chaining.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Sets a field.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Gets a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a non-empty string-ish field value.
    ///
    /// Numbers are rendered so that numeric ids still resolve.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The primary identity, if set.
    pub fn id(&self) -> Option<String> {
        self.text(ID_FIELD)
    }

    /// The secondary lookup key, if set.
    pub fn email(&self) -> Option<String> {
        self.text(EMAIL_FIELD)
    }

    /// Best-effort identifier for logs: `id`, else `document`, else `unknown`.
    pub fn display_id(&self) -> String {
        self.id()
            .or_else(|| self.text(DOCUMENT_FIELD))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Returns a copy without the given field.
    pub fn without(&self, field: &str) -> Self {
        let mut map = self.0.clone();
        map.remove(field);
        Self(map)
    }

    /// Keeps only the given fields. An empty projection keeps everything.
    pub fn project(&self, fields: &[String]) -> Self {
        if fields.is_empty() {
            return self.clone();
        }
        Self(
            self.0
                .iter()
                .filter(|(name, _)| fields.iter().any(|f| f == *name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        )
    }

    /// Merges the fields of `other` into this document.
    pub fn merge(&mut self, other: &Document) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_fields() {
        let doc = Document::new().with("id", "doc-1").with("email", "a@x.com");
        assert_eq!(doc.id().as_deref(), Some("doc-1"));
        assert_eq!(doc.email().as_deref(), Some("a@x.com"));

        let numeric = Document::new().with("id", 42);
        assert_eq!(numeric.id().as_deref(), Some("42"));

        let blank = Document::new().with("id", "").with("email", Value::Null);
        assert!(blank.id().is_none());
        assert!(blank.email().is_none());
    }

    #[test]
    fn display_id_fallbacks() {
        assert_eq!(Document::new().with("id", "a").display_id(), "a");
        assert_eq!(
            Document::new().with("document", "123.456.789-00").display_id(),
            "123.456.789-00"
        );
        assert_eq!(Document::new().display_id(), "unknown");
    }

    #[test]
    fn projection_and_removal() {
        let doc = Document::new()
            .with("id", "a")
            .with("email", "a@x.com")
            .with("firstName", "Ana");

        let projected = doc.project(&["id".to_string(), "email".to_string()]);
        assert_eq!(projected.len(), 2);
        assert!(projected.get("firstName").is_none());
        assert_eq!(doc.project(&[]), doc);

        let stripped = doc.without("id");
        assert!(stripped.id().is_none());
        assert_eq!(stripped.len(), 2);
    }

    #[test]
    fn json_shape_is_transparent() {
        let doc: Document = serde_json::from_value(json!({"id": "a", "n": 1})).unwrap();
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({"id": "a", "n": 1}));
        assert!(Document::from_value(json!([1, 2])).is_none());
    }
}
