//! Schema fingerprint generation.
//!
//! Generates stable SHA-256 fingerprints from inferred schemas for change
//! detection. The canonical form visits object fields in lexicographic
//! order, so the fingerprint does not depend on the key order of the JSON
//! the schema was inferred from.

use sha2::{Digest, Sha256};

use crate::schema::{FieldSchema, SchemaKind};

/// Compute a stable fingerprint for a schema's structure.
///
/// The fingerprint is the hex encoding of the first 8 bytes (16 hex chars)
/// of a SHA-256 over the canonical structure: type tags, nullability and
/// field names.
pub fn compute_fingerprint(schema: &FieldSchema) -> String {
    let mut hasher = Sha256::new();
    hash_structure(schema, &mut hasher);
    let result = hasher.finalize();

    hex::encode(&result[..8])
}

/// Recursively hash the canonical structure of a schema.
fn hash_structure(schema: &FieldSchema, hasher: &mut Sha256) {
    hasher.update([u8::from(schema.nullable)]);

    match &schema.kind {
        SchemaKind::Null => hasher.update(b"null"),
        SchemaKind::Boolean => hasher.update(b"bool"),
        SchemaKind::Integer => hasher.update(b"int"),
        SchemaKind::Float => hasher.update(b"float"),
        SchemaKind::String => hasher.update(b"string"),
        SchemaKind::Mixed => hasher.update(b"mixed"),
        SchemaKind::Unknown => hasher.update(b"?"),
        SchemaKind::Array { items } => {
            hasher.update(b"seq[");
            hash_structure(items, hasher);
            hasher.update(b"]");
        }
        SchemaKind::Object { fields } => {
            hasher.update(b"struct{");
            let mut sorted: Vec<_> = fields.iter().collect();
            sorted.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            for (name, field) in sorted {
                // length-prefixed so names cannot run into each other
                hasher.update((name.len() as u64).to_le_bytes());
                hasher.update(name.as_bytes());
                hash_structure(field, hasher);
            }
            hasher.update(b"}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::{infer, unify};
    use serde_json::json;

    fn fp(value: serde_json::Value) -> String {
        compute_fingerprint(&infer(&value))
    }

    #[test]
    fn test_fingerprint_stability() {
        let schema = infer(&json!({"id": 1, "name": "test"}));
        assert_eq!(compute_fingerprint(&schema), compute_fingerprint(&schema));
    }

    #[test]
    fn test_fingerprint_same_structure_different_values() {
        assert_eq!(
            fp(json!({"id": 1, "name": "Alice"})),
            fp(json!({"id": 999, "name": "Bob"})),
            "Same structure should have same fingerprint"
        );
    }

    #[test]
    fn test_fingerprint_key_order_independent() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"a":1,"b":"x"}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"b":"x","a":1}"#).unwrap();
        assert_eq!(fp(a), fp(b));
    }

    #[test]
    fn test_fingerprint_nested_key_order_independent() {
        let a: serde_json::Value = serde_json::from_str(
            r#"{"outer":{"z":[{"q":1,"p":null}],"y":true},"k":"v"}"#,
        )
        .unwrap();
        let b: serde_json::Value = serde_json::from_str(
            r#"{"k":"v","outer":{"y":false,"z":[{"p":null,"q":2}]}}"#,
        )
        .unwrap();
        assert_eq!(fp(a), fp(b));
    }

    #[test]
    fn test_fingerprint_unification_order_independent() {
        let x = infer(&json!({"id": 1}));
        let y = infer(&json!({"name": "n", "id": 2}));
        assert_eq!(
            compute_fingerprint(&unify(&x, &y)),
            compute_fingerprint(&unify(&y, &x))
        );
    }

    #[test]
    fn test_fingerprint_uniqueness() {
        assert_ne!(fp(json!({"id": 1})), fp(json!({"name": "test"})));
    }

    #[test]
    fn test_fingerprint_different_types() {
        assert_ne!(
            fp(json!({"value": 123})),
            fp(json!({"value": "text"})),
            "Different types should have different fingerprint"
        );
    }

    #[test]
    fn test_fingerprint_nullability_matters() {
        let strict = infer(&json!({"xp": 1}));
        let loose = unify(&strict, &infer(&json!({"xp": null})));
        assert_ne!(compute_fingerprint(&strict), compute_fingerprint(&loose));
    }

    #[test]
    fn test_fingerprint_unknown_differs_from_null() {
        assert_ne!(fp(json!([])), fp(json!([null])));
    }

    #[test]
    fn test_fingerprint_field_names_do_not_collide() {
        assert_ne!(fp(json!({"ab": 1, "c": 1})), fp(json!({"a": 1, "bc": 1})));
    }

    #[test]
    fn test_fingerprint_length() {
        assert_eq!(fp(json!({"test": true})).len(), 16);
    }
}
