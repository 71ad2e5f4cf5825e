//! OpenSearch index settings and mappings.
//!
//! This module turns an `IndexSchema` into the body of a create-index request.

use serde_json::{json, Map, Value};

use search_workflow_shared::{FieldDefinition, FieldType, IndexSchema};

/// Name of the keyword sub-field used for exact matching and sorting on text fields.
pub const RAW_SUBFIELD: &str = "raw";

/// Key under `mappings._meta` that stores the serialized schema.
pub const SCHEMA_META_KEY: &str = "schema";

/// Build the create-index body for a schema.
///
/// The configuration includes:
/// - **text** fields for searchable strings, with a `raw` keyword sub-field
///   when the field is also the key, filterable or sortable
/// - **keyword** fields for other strings; not indexed when no flag needs it
/// - numeric, boolean and date fields, indexed only when filterable or sortable
/// - `dynamic: strict` so documents cannot add fields outside the schema
/// - the schema itself under `_meta`, so query translation can recover it later
///
/// # Sharding Configuration
///
/// - 1 primary shard
/// - 1 replica for redundancy
pub fn get_index_settings(schema: &IndexSchema) -> Value {
    let mut properties = Map::new();
    for field in &schema.fields {
        properties.insert(field.name.clone(), field_mapping(field));
    }

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "dynamic": "strict",
            "_meta": {
                SCHEMA_META_KEY: schema
            },
            "properties": properties
        }
    })
}

/// Mapping for a single field.
fn field_mapping(field: &FieldDefinition) -> Value {
    let exact = field.key || field.filterable || field.sortable;

    match field.field_type {
        FieldType::String if field.searchable => {
            if exact {
                json!({
                    "type": "text",
                    "fields": {
                        RAW_SUBFIELD: {
                            "type": "keyword"
                        }
                    }
                })
            } else {
                json!({ "type": "text" })
            }
        }
        FieldType::String => {
            if exact {
                json!({ "type": "keyword" })
            } else {
                json!({ "type": "keyword", "index": false })
            }
        }
        other => {
            let kind = match other {
                FieldType::Integer => "long",
                FieldType::Double => "double",
                FieldType::Boolean => "boolean",
                FieldType::DateTime => "date",
                FieldType::String => "keyword",
            };
            if exact {
                json!({ "type": kind })
            } else {
                json!({ "type": kind, "index": false })
            }
        }
    }
}

/// The field name to target for exact-match filters and sorting.
pub fn exact_field(field: &FieldDefinition) -> String {
    if field.field_type == FieldType::String && field.searchable {
        format!("{}.{}", field.name, RAW_SUBFIELD)
    } else {
        field.name.clone()
    }
}

/// Recover the schema stored under `_meta` from a get-mapping response.
pub fn schema_from_mapping(index: &str, mapping: &Value) -> Option<IndexSchema> {
    let meta = mapping
        .get(index)
        .and_then(|idx| idx.get("mappings"))
        .and_then(|m| m.get("_meta"))
        .and_then(|meta| meta.get(SCHEMA_META_KEY))?;
    serde_json::from_value(meta.clone()).ok()
}
