//! Index schema definitions.
//!
//! A schema is an ordered list of fields. Each field carries the capability
//! flags the backend needs at index-creation time.

use serde::{Deserialize, Serialize};

/// Data type of an index field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Double,
    Boolean,
    DateTime,
}

/// A single field of an index schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name as it appears in documents.
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Included in free-text search.
    pub searchable: bool,
    /// Usable in filter expressions.
    pub filterable: bool,
    /// Usable in `order_by`.
    pub sortable: bool,
    /// Document key. Exactly one field per schema.
    pub key: bool,
}

impl FieldDefinition {
    /// Create a field with all capability flags off.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            searchable: false,
            filterable: false,
            sortable: false,
            key: false,
        }
    }

    /// Create a string field.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Mark this field as the document key.
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }
}

/// Schema of a named index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index name.
    pub name: String,
    /// Ordered field list.
    pub fields: Vec<FieldDefinition>,
}

impl IndexSchema {
    /// Create a schema with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// The key field, if exactly one is marked.
    pub fn key_field(&self) -> Option<&FieldDefinition> {
        let mut keys = self.fields.iter().filter(|f| f.key);
        match (keys.next(), keys.next()) {
            (Some(key), None) => Some(key),
            _ => None,
        }
    }

    /// Names of the searchable fields, in schema order.
    pub fn searchable_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.searchable)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Find a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents_schema() -> IndexSchema {
        IndexSchema::new("contents")
            .with_field(FieldDefinition::string("id").key())
            .with_field(FieldDefinition::string("title").searchable().sortable())
            .with_field(FieldDefinition::string("body").searchable().filterable())
    }

    #[test]
    fn test_key_field() {
        let schema = contents_schema();
        assert_eq!(schema.key_field().map(|f| f.name.as_str()), Some("id"));
    }

    #[test]
    fn test_key_field_ambiguous() {
        let schema = contents_schema().with_field(FieldDefinition::string("other").key());
        assert!(schema.key_field().is_none());
    }

    #[test]
    fn test_searchable_fields_keep_order() {
        assert_eq!(contents_schema().searchable_fields(), vec!["title", "body"]);
    }

    #[test]
    fn test_builder_flags() {
        let field = FieldDefinition::string("title").searchable().sortable();

        assert!(field.searchable);
        assert!(field.sortable);
        assert!(!field.filterable);
        assert!(!field.key);
        assert_eq!(field.field_type, FieldType::String);
    }
}
