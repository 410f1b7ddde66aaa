//! JSON Schema export functionality.
//!
//! Converts inferred schemas to JSON Schema format so clients can validate
//! responses against what the monitor last observed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::{FieldSchema, SchemaKind};

/// Simplified JSON Schema representation.
/// This is a subset of JSON Schema that captures what we can infer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JsonSchema {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<JsonSchemaType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Nullable positions are expressed as `oneOf [T, null]`.
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<JsonSchema>>,
}

/// JSON Schema type values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JsonSchemaType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonSchema {
    /// Create a new JSON Schema with the standard schema URI.
    pub fn new() -> Self {
        Self {
            schema_uri: Some(
                "https://json-schema.org/draft/2020-12/schema".to_string(),
            ),
            ..Default::default()
        }
    }

    /// Create a type-only schema.
    pub fn typed(t: JsonSchemaType) -> Self {
        Self {
            schema_type: Some(t),
            ..Default::default()
        }
    }
}

/// Convert an inferred schema to JSON Schema.
pub fn to_json_schema(schema: &FieldSchema) -> JsonSchema {
    let mut js = convert(schema);
    js.schema_uri = JsonSchema::new().schema_uri;
    js
}

fn convert(schema: &FieldSchema) -> JsonSchema {
    let inner = convert_kind(&schema.kind);
    let wrap = schema.nullable
        && !matches!(
            schema.kind,
            SchemaKind::Null | SchemaKind::Mixed | SchemaKind::Unknown
        );

    if wrap {
        JsonSchema {
            one_of: Some(vec![inner, JsonSchema::typed(JsonSchemaType::Null)]),
            ..Default::default()
        }
    } else {
        inner
    }
}

fn convert_kind(kind: &SchemaKind) -> JsonSchema {
    match kind {
        SchemaKind::Null => JsonSchema::typed(JsonSchemaType::Null),
        SchemaKind::Boolean => JsonSchema::typed(JsonSchemaType::Boolean),
        SchemaKind::Integer => JsonSchema::typed(JsonSchemaType::Integer),
        SchemaKind::Float => JsonSchema::typed(JsonSchemaType::Number),
        SchemaKind::String => JsonSchema::typed(JsonSchemaType::String),

        // any value is accepted
        SchemaKind::Mixed => JsonSchema {
            description: Some("Mixed types observed".to_string()),
            ..Default::default()
        },
        SchemaKind::Unknown => JsonSchema {
            description: Some("No elements observed".to_string()),
            ..Default::default()
        },

        SchemaKind::Array { items } => JsonSchema {
            schema_type: Some(JsonSchemaType::Array),
            items: Some(Box::new(convert(items))),
            ..Default::default()
        },

        SchemaKind::Object { fields } => {
            let mut target = JsonSchema::typed(JsonSchemaType::Object);

            let props: IndexMap<String, JsonSchema> = fields
                .iter()
                .map(|(name, field)| (name.clone(), convert(field)))
                .collect();
            // If field is never null or missing, it's required
            let required: Vec<String> = fields
                .iter()
                .filter(|(_, field)| !field.nullable)
                .map(|(name, _)| name.clone())
                .collect();

            if !props.is_empty() {
                target.properties = Some(props);
            }
            if !required.is_empty() {
                target.required = Some(required);
            }
            target
        }
    }
}
