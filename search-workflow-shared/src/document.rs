//! The document stored in the content index.

use serde::{Deserialize, Serialize};

/// A single content document.
///
/// `id` is the index key and must be unique within an index. `title` and
/// `body` are full-text searchable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique key of the document.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl Document {
    /// Create a new document.
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        }
    }

    /// Look up a field value by its schema name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(self.id.as_str()),
            "title" => Some(self.title.as_str()),
            "body" => Some(self.body.as_str()),
            _ => None,
        }
    }
}
