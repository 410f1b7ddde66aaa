//! Human/LLM facing views of schemas and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{FieldSchema, SchemaKind, TypeTag};

/// One flattened schema position, e.g. `seasons[].rank.tier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPath {
    pub path: String,
    pub type_tag: TypeTag,
    pub nullable: bool,
}

/// Flatten a schema into dotted paths, depth first, in display order.
///
/// Array elements are addressed with `[]`. The root itself is not listed
/// unless it is a leaf.
pub fn field_paths(schema: &FieldSchema) -> Vec<FieldPath> {
    let mut out = Vec::new();
    match &schema.kind {
        SchemaKind::Object { .. } | SchemaKind::Array { .. } => {
            walk_children(schema, "", &mut out)
        }
        _ => out.push(FieldPath {
            path: String::new(),
            type_tag: schema.type_tag(),
            nullable: schema.nullable,
        }),
    }
    out
}

fn walk_children(schema: &FieldSchema, prefix: &str, out: &mut Vec<FieldPath>) {
    match &schema.kind {
        SchemaKind::Object { fields } => {
            for (name, field) in fields {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                push_and_descend(field, path, out);
            }
        }
        SchemaKind::Array { items } => {
            if items.is_unknown() {
                return;
            }
            push_and_descend(items, format!("{prefix}[]"), out);
        }
        _ => {}
    }
}

fn push_and_descend(field: &FieldSchema, path: String, out: &mut Vec<FieldPath>) {
    out.push(FieldPath {
        path: path.clone(),
        type_tag: field.type_tag(),
        nullable: field.nullable,
    });
    walk_children(field, &path, out);
}

fn type_label(schema: &FieldSchema) -> String {
    match &schema.kind {
        SchemaKind::Array { items } if items.is_unknown() => {
            "array<unknown>".to_string()
        }
        SchemaKind::Array { items } => format!("array<{}>", items.type_tag()),
        _ => schema.type_tag().to_string(),
    }
}

/// Multiline description of a schema, one line per field path.
pub fn describe(schema: &FieldSchema) -> String {
    let mut lines = vec![format!("Root: {}", type_label(schema))];
    let paths = field_paths(schema);
    if paths.is_empty() || paths.iter().all(|p| p.path.is_empty()) {
        return lines.join("\n");
    }

    lines.push(String::new());
    lines.push("Fields:".to_string());
    describe_into(schema, "", &mut lines);
    lines.join("\n")
}

fn describe_into(schema: &FieldSchema, prefix: &str, lines: &mut Vec<String>) {
    match &schema.kind {
        SchemaKind::Object { fields } => {
            for (name, field) in fields {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                lines.push(field_line(&path, field));
                describe_into(field, &path, lines);
            }
        }
        SchemaKind::Array { items } if !items.is_unknown() => {
            let path = format!("{prefix}[]");
            if matches!(items.kind, SchemaKind::Object { .. }) {
                describe_into(items, &path, lines);
            } else if matches!(items.kind, SchemaKind::Array { .. }) {
                lines.push(field_line(&path, items));
                describe_into(items, &path, lines);
            }
        }
        _ => {}
    }
}

fn field_line(path: &str, field: &FieldSchema) -> String {
    let nullable = if field.nullable { " (nullable)" } else { "" };
    format!("  - {path}: {}{nullable}", type_label(field))
}

const PREVIEW_MAX_KEYS: usize = 10;
const PREVIEW_MAX_STRING: usize = 100;

/// Truncated preview of a response body for LLM context.
///
/// Objects keep their first 10 keys, arrays their first element plus a
/// count marker, long strings are cut at 100 chars, and containers below
/// `max_depth` collapse to `<object with N items>`.
pub fn summarize_value(value: &Value, max_depth: usize) -> Value {
    if max_depth == 0 {
        return match value {
            Value::Object(map) => {
                Value::String(format!("<object with {} items>", map.len()))
            }
            Value::Array(items) => {
                Value::String(format!("<array with {} items>", items.len()))
            }
            other => truncate_string(other),
        };
    }

    match value {
        Value::Object(map) => {
            let preview: Map<String, Value> = map
                .iter()
                .take(PREVIEW_MAX_KEYS)
                .map(|(k, v)| (k.clone(), summarize_value(v, max_depth - 1)))
                .collect();
            Value::Object(preview)
        }
        Value::Array(items) => match items.split_first() {
            None => Value::Array(Vec::new()),
            Some((first, rest)) => {
                let mut preview = vec![summarize_value(first, max_depth - 1)];
                if !rest.is_empty() {
                    preview.push(Value::String(format!(
                        "... and {} more items",
                        rest.len()
                    )));
                }
                Value::Array(preview)
            }
        },
        other => truncate_string(other),
    }
}

fn truncate_string(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > PREVIEW_MAX_STRING => {
            let cut: String = s.chars().take(PREVIEW_MAX_STRING).collect();
            Value::String(format!("{cut}..."))
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::infer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn flattens_nested_paths() {
        let schema = infer(&json!({
            "id": "u1",
            "stats": {"level": 5, "xp": null},
            "games": [{"token": "a", "score": 1.5}]
        }));

        let paths: Vec<(String, TypeTag, bool)> = field_paths(&schema)
            .into_iter()
            .map(|p| (p.path, p.type_tag, p.nullable))
            .collect();

        assert_eq!(
            paths,
            vec![
                ("id".into(), TypeTag::String, false),
                ("stats".into(), TypeTag::Object, false),
                ("stats.level".into(), TypeTag::Integer, false),
                ("stats.xp".into(), TypeTag::Null, true),
                ("games".into(), TypeTag::Array, false),
                ("games[]".into(), TypeTag::Object, false),
                ("games[].token".into(), TypeTag::String, false),
                ("games[].score".into(), TypeTag::Float, false),
            ]
        );
    }

    #[test]
    fn root_array_paths() {
        let schema = infer(&json!([{"id": 1}]));
        let paths: Vec<String> =
            field_paths(&schema).into_iter().map(|p| p.path).collect();
        assert_eq!(paths, vec!["[]", "[].id"]);

        assert!(field_paths(&infer(&json!([]))).is_empty());
    }

    #[test]
    fn describes_fields_with_nullability() {
        let schema = infer(&json!({"id": "u1", "xp": null, "tags": ["a"]}));
        let text = describe(&schema);
        assert_eq!(
            text,
            "Root: object\n\nFields:\n  - id: string\n  - xp: null (nullable)\n  - tags: array<string>"
        );
    }

    #[test]
    fn describes_empty_object() {
        assert_eq!(describe(&infer(&json!({}))), "Root: object");
        assert_eq!(describe(&infer(&json!([]))), "Root: array<unknown>");
    }

    #[test]
    fn summarizes_with_depth_and_truncation() {
        let long = "x".repeat(150);
        let value = json!({
            "name": long,
            "items": [1, 2, 3],
            "nested": {"deep": {"deeper": 1}}
        });

        let preview = summarize_value(&value, 2);
        assert_eq!(preview["name"].as_str().unwrap().len(), 103);
        assert_eq!(preview["items"], json!([1, "... and 2 more items"]));
        assert_eq!(preview["nested"]["deep"], json!("<object with 1 items>"));
    }

    #[test]
    fn summarize_caps_object_keys() {
        let map: Map<String, Value> =
            (0..20).map(|i| (format!("k{i:02}"), json!(i))).collect();
        let preview = summarize_value(&Value::Object(map), 1);
        assert_eq!(preview.as_object().unwrap().len(), 10);
    }
}
