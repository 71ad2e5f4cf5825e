//! The fixed scenario run by the workflow binary.

use search_workflow_shared::{Document, FieldDefinition, IndexSchema};

/// Queries issued after loading, in order.
pub const SAMPLE_QUERIES: [&str; 2] = ["Khan", "JK"];

/// Schema of the contents index: a string key plus searchable title and body.
pub fn contents_schema(index_name: &str) -> IndexSchema {
    IndexSchema::new(index_name)
        .with_field(FieldDefinition::string("id").key())
        .with_field(FieldDefinition::string("title").searchable().sortable())
        .with_field(FieldDefinition::string("body").searchable().filterable())
}

/// Documents uploaded by the workflow.
pub fn sample_documents() -> Vec<Document> {
    vec![
        Document::new("1", "Mohsin JK", "bla bla"),
        Document::new("2", "Mohsin Javed Khan", "bla bla"),
        Document::new("3", "Mohsin Khan", "bla bla"),
    ]
}
