//! Type inference and schema unification.
//!
//! [`infer`] derives a schema from a single JSON value. [`unify`] merges two
//! schemas observed for the same logical value. Unification only ever
//! loosens a schema (more nullable, more `mixed`), so folding in more
//! samples can never hide a change.

use indexmap::IndexMap;
use serde_json::Value;

use crate::schema::{FieldSchema, SchemaKind};

/// Infer the structural schema of a JSON value.
///
/// Total and deterministic: every JSON value, including empty containers and
/// `null`, yields a schema.
pub fn infer(value: &Value) -> FieldSchema {
    match value {
        Value::Null => FieldSchema::null(),
        Value::Bool(_) => FieldSchema::new(SchemaKind::Boolean),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                FieldSchema::new(SchemaKind::Integer)
            } else {
                FieldSchema::new(SchemaKind::Float)
            }
        }
        Value::String(_) => FieldSchema::new(SchemaKind::String),
        Value::Array(items) => {
            let element = items
                .iter()
                .map(infer)
                .reduce(|acc, next| unify(&acc, &next))
                .unwrap_or_else(FieldSchema::unknown);
            FieldSchema::array(element)
        }
        Value::Object(map) => {
            let fields: IndexMap<String, FieldSchema> =
                map.iter().map(|(k, v)| (k.clone(), infer(v))).collect();
            FieldSchema::object(fields)
        }
    }
}

/// Merge two schemas into one that is consistent with both.
///
/// - `Unknown` (no samples) is the identity.
/// - a `null`-only side adopts the other side's shape as nullable.
/// - equal tags merge recursively; object fields present on one side only
///   become nullable.
/// - any other tag conflict yields `mixed`, dropping children.
pub fn unify(a: &FieldSchema, b: &FieldSchema) -> FieldSchema {
    let nullable = a.nullable || b.nullable;

    match (&a.kind, &b.kind) {
        (SchemaKind::Unknown, _) => b.clone().with_nullable(nullable),
        (_, SchemaKind::Unknown) => a.clone().with_nullable(nullable),

        (SchemaKind::Null, _) => b.clone().with_nullable(true),
        (_, SchemaKind::Null) => a.clone().with_nullable(true),

        (SchemaKind::Boolean, SchemaKind::Boolean)
        | (SchemaKind::Integer, SchemaKind::Integer)
        | (SchemaKind::Float, SchemaKind::Float)
        | (SchemaKind::String, SchemaKind::String)
        | (SchemaKind::Mixed, SchemaKind::Mixed) => {
            a.clone().with_nullable(nullable)
        }

        (SchemaKind::Array { items: ia }, SchemaKind::Array { items: ib }) => {
            FieldSchema::array(unify(ia, ib)).with_nullable(nullable)
        }

        (
            SchemaKind::Object { fields: fa },
            SchemaKind::Object { fields: fb },
        ) => FieldSchema::object(unify_fields(fa, fb)).with_nullable(nullable),

        _ => FieldSchema::mixed(nullable),
    }
}

/// Field-wise merge. Keeps `a`'s order and appends fields new in `b`.
fn unify_fields(
    a: &IndexMap<String, FieldSchema>,
    b: &IndexMap<String, FieldSchema>,
) -> IndexMap<String, FieldSchema> {
    let mut merged = IndexMap::with_capacity(a.len().max(b.len()));

    for (name, left) in a {
        let field = match b.get(name) {
            Some(right) => unify(left, right),
            // absent in the other sample
            None => left.clone().with_nullable(true),
        };
        merged.insert(name.clone(), field);
    }

    for (name, right) in b {
        if !a.contains_key(name) {
            merged.insert(name.clone(), right.clone().with_nullable(true));
        }
    }

    merged
}
